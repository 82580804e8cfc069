use festokes::config::{Extras, MeshFamily};
use festokes::element::{reference_edge_point, reference_vertices, LagrangeBasis};
use festokes::geometry::{project_to_circle, ElementGeometry, CURVING_DEGREE};
use festokes::mesh::builder::MeshBuilder;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{Matrix2, Point2, Vector2};
use std::f64::consts::PI;

#[test]
fn affine_geometry_of_physical_triangle() {
    let basis = LagrangeBasis::new(CURVING_DEGREE);
    let geometry = ElementGeometry::Affine {
        vertices: [Point2::new(1.0, 1.0), Point2::new(3.0, 1.0), Point2::new(1.0, 2.0)],
    };
    let point = geometry.evaluate(&Point2::new(0.5, 0.5), &basis);
    assert_matrix_eq!(point.point.coords, Vector2::new(2.0, 1.5), comp = abs, tol = 1e-14);
    assert_matrix_eq!(point.jacobian, Matrix2::new(2.0, 0.0, 0.0, 1.0), comp = abs, tol = 1e-14);
    assert_scalar_eq!(point.jacobian_determinant, 2.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(point.physical_weight(0.5), 1.0, comp = abs, tol = 1e-14);

    // The gradient of xi = (x - 1) / 2 in physical coordinates
    let gradient = point.physical_gradient(&Vector2::new(1.0, 0.0));
    assert_matrix_eq!(gradient, Vector2::new(0.5, 0.0), comp = abs, tol = 1e-14);
    assert_eq!(point.jacobian_derivatives, [Matrix2::zeros(); 2]);
}

#[test]
fn projection_onto_circle() {
    let projected = project_to_circle(&Point2::new(3.0, 4.0), 2.0);
    assert_matrix_eq!(projected.coords, Vector2::new(1.2, 1.6), comp = abs, tol = 1e-14);
    assert_eq!(project_to_circle(&Point2::origin(), 1.0), Point2::origin());
}

#[test]
fn curved_disk_mesh_approximates_disk_area() {
    let level = MeshBuilder.build_mesh(MeshFamily::Curved, &Extras::new(), 0);
    assert!(level.is_curved());
    // The straight hexagon only covers 3 sqrt(3) / 2 of the disk
    let hexagon_area = 1.5 * 3f64.sqrt();
    assert!((level.area() - PI).abs() < 1e-3);
    assert!((hexagon_area - PI).abs() > 0.1);

    let finer = MeshBuilder.build_mesh(MeshFamily::Curved, &Extras::new(), 2);
    assert!((finer.area() - PI).abs() < 1e-6);
}

#[test]
fn curved_boundary_edges_follow_circle() {
    let level = MeshBuilder.build_mesh(MeshFamily::Curved, &Extras::new(), 1);
    let topology = level.topology();
    let mut num_boundary_faces = 0;
    for element in 0..level.num_elements() {
        for local_edge in 0..3 {
            if !topology.is_boundary_edge(topology.element_edges()[element][local_edge]) {
                continue;
            }
            num_boundary_faces += 1;
            // Interpolation nodes of the element map lie exactly on the circle
            for t in [0.0, 0.2, 0.4, 0.6, 0.8, 1.0] {
                let x = level.map(element, &reference_edge_point(local_edge, t));
                assert_scalar_eq!(x.coords.norm(), 1.0, comp = abs, tol = 1e-12);
            }
            // and the map stays close to the circle in between
            let x = level.map(element, &reference_edge_point(local_edge, 0.33));
            assert_scalar_eq!(x.coords.norm(), 1.0, comp = abs, tol = 1e-6);
        }
    }
    assert_eq!(num_boundary_faces, 12);
}

#[test]
fn curved_maps_interpolate_mesh_vertices() {
    let level = MeshBuilder.build_mesh(MeshFamily::Curved, &Extras::new(), 1);
    for element in 0..level.num_elements() {
        let vertices = level.mesh().element_vertices(element);
        for (xi, x) in reference_vertices().iter().zip(&vertices) {
            let mapped = level.map(element, xi);
            assert_scalar_eq!((mapped - x).norm(), 0.0, comp = abs, tol = 1e-12);
        }
        let point = level.geometry_point(element, &Point2::new(0.25, 0.25));
        assert!(point.jacobian_determinant > 0.0);
    }
}

#[test]
fn interior_elements_remain_affine() {
    let level = MeshBuilder.build_mesh(MeshFamily::Curved, &Extras::new(), 1);
    let topology = level.topology();
    for element in 0..level.num_elements() {
        let touches_boundary = topology.element_edges()[element]
            .iter()
            .any(|&edge| topology.is_boundary_edge(edge));
        assert_eq!(level.element_geometry(element).is_curved(), touches_boundary);
    }
}

#[test]
fn curved_jacobian_derivatives_match_finite_differences() {
    let level = MeshBuilder.build_mesh(MeshFamily::Curved, &Extras::new(), 0);
    let xi = Point2::new(0.3, 0.4);
    let h = 1e-6;
    let point = level.geometry_point(0, &xi);
    for d in 0..2 {
        let mut offset = Vector2::zeros();
        offset[d] = h;
        let plus = level.geometry_point(0, &(xi + offset));
        let minus = level.geometry_point(0, &(xi - offset));
        let fd = (plus.jacobian - minus.jacobian) / (2.0 * h);
        assert_matrix_eq!(point.jacobian_derivatives[d], fd, comp = abs, tol = 1e-6);
    }
}

#[test]
fn curved_deviation_decays_with_edge_bubble() {
    // At the nodes of the curving basis the map equals the blend exactly. Along the median of the
    // boundary edge the arc deviation is scaled by the square of the distance parameter.
    let level = MeshBuilder.build_mesh(MeshFamily::Curved, &Extras::new(), 0);
    let topology = level.topology();
    for element in 0..level.num_elements() {
        let vertices = level.mesh().element_vertices(element);
        let e = (0..3)
            .find(|&e| topology.is_boundary_edge(topology.element_edges()[element][e]))
            .unwrap();
        let (start, end) = (vertices[e], vertices[(e + 1) % 3]);
        let chord_midpoint = (start.coords + end.coords) / 2.0;
        let arc_midpoint = chord_midpoint.normalize();

        for s in [0.8, 0.4] {
            let mut lambda = [1.0 - s; 3];
            lambda[e] = s / 2.0;
            lambda[(e + 1) % 3] = s / 2.0;
            let xi = Point2::new(lambda[1], lambda[2]);
            let [a, b, c] = vertices;
            let affine = a + (b - a) * xi.x + (c - a) * xi.y;
            let expected = affine + (arc_midpoint - chord_midpoint) * (s * s);
            assert_matrix_eq!(level.map(element, &xi).coords, expected.coords, comp = abs, tol = 1e-12);
        }
    }
}

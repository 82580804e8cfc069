use festokes::config::{Discretization, Extra, Extras, MeshFamily, PressureElement, VelocityElement};
use festokes::element::VectorBasisValues;
use festokes::mesh::builder::MeshBuilder;
use festokes::mesh::MeshLevel;
use festokes::quadrature::segment_quadrature;
use festokes::space::{ScalarSpace, SpacePair, SpacePairBuilder, VectorElement, VectorSpace};
use matrixcompare::assert_scalar_eq;
use nalgebra::{Point2, Vector2};

/// The unit square split into 2x2 cells, with 9 vertices, 16 edges and 8 triangles.
fn type_one_level(extras: &Extras) -> MeshLevel {
    MeshBuilder.build_mesh(MeshFamily::TypeOne, extras, 0)
}

fn build(velocity: VelocityElement, pressure: PressureElement, extras: impl Into<Extras>) -> (MeshLevel, SpacePair) {
    let extras = extras.into();
    let level = type_one_level(&extras);
    let discretization = Discretization::new(MeshFamily::TypeOne, velocity, pressure, extras);
    let space = SpacePairBuilder.build(&level, &discretization);
    (level, space)
}

#[test]
fn type_one_base_mesh_has_expected_entities() {
    let level = type_one_level(&Extras::new());
    assert_eq!(level.mesh().num_vertices(), 9);
    assert_eq!(level.topology().num_edges(), 16);
    assert_eq!(level.num_elements(), 8);
}

#[test]
fn vector_space_dimensions() {
    let level = type_one_level(&Extras::new());
    assert_eq!(VectorSpace::lagrange(&level, 1, true).num_dofs(), 18);
    assert_eq!(VectorSpace::lagrange(&level, 2, true).num_dofs(), 50);
    assert_eq!(VectorSpace::lagrange(&level, 3, true).num_dofs(), 98);
    assert_eq!(VectorSpace::lagrange(&level, 2, false).num_dofs(), 96);
    assert_eq!(VectorSpace::crouzeix_raviart(&level).num_dofs(), 32);
    assert_eq!(VectorSpace::bdm(&level, 1).num_dofs(), 32);
    assert_eq!(VectorSpace::bdm(&level, 2).num_dofs(), 72);
    assert_eq!(VectorSpace::bubble(&level).num_dofs(), 16);
}

#[test]
fn scalar_space_dimensions() {
    let level = type_one_level(&Extras::new());
    assert_eq!(ScalarSpace::lagrange(&level, 0, false).num_dofs(), 8);
    assert_eq!(ScalarSpace::lagrange(&level, 1, true).num_dofs(), 9);
    assert_eq!(ScalarSpace::lagrange(&level, 1, false).num_dofs(), 24);
    assert_eq!(ScalarSpace::lagrange(&level, 2, true).num_dofs(), 25);
    // Piecewise constants are always discontinuous
    assert!(!ScalarSpace::lagrange(&level, 0, true).is_continuous());
}

#[test]
fn dirichlet_dofs_lie_on_boundary() {
    let level = type_one_level(&Extras::new());
    let count = |space: &VectorSpace| space.dirichlet_dofs().iter().filter(|&&d| d).count();
    assert_eq!(count(&VectorSpace::lagrange(&level, 2, true)), 32);
    assert_eq!(count(&VectorSpace::lagrange(&level, 2, false)), 0);
    assert_eq!(count(&VectorSpace::crouzeix_raviart(&level)), 16);
    assert_eq!(count(&VectorSpace::bdm(&level, 2)), 24);
    assert_eq!(count(&VectorSpace::bubble(&level)), 0);
}

#[test]
fn global_layout_orders_velocity_bubble_pressure() {
    let (_, space) = build(VelocityElement::P2, PressureElement::P1Star, [Extra::P3Bubble]);
    assert_eq!(space.bubble_offset(), 50);
    assert_eq!(space.pressure_offset(), 66);
    assert_eq!(space.num_dofs(), 90);
    assert_eq!(space.velocity_order(), 2);
    assert_eq!(space.pressure_order(), 1);

    let dofs = space.element_dofs(3);
    assert_eq!(dofs.len(), 12 + 2 + 3);
    assert_eq!(&dofs[12..14], &[50 + 6, 50 + 7]);
    assert_eq!(&dofs[14..], &[66 + 9, 66 + 10, 66 + 11]);

    let dirichlet = space.dirichlet_dofs();
    assert_eq!(dirichlet.len(), space.num_dofs());
    assert!(dirichlet[50..].iter().all(|&d| !d));
}

#[test]
fn builder_adds_bubble_only_below_cubic_velocity() {
    let (_, space) = build(VelocityElement::P1, PressureElement::P1, [Extra::P3Bubble]);
    assert!(space.bubble().is_some());
    let (_, space) = build(VelocityElement::P3, PressureElement::P2, [Extra::P3Bubble]);
    assert!(space.bubble().is_none());
    let (_, space) = build(VelocityElement::P2, PressureElement::P1, Extras::new());
    assert!(space.bubble().is_none());
}

#[test]
fn builder_enables_dg_jumps_for_face_terms() {
    let (_, space) = build(VelocityElement::P2Star, PressureElement::P1Star, [Extra::InteriorPenalty]);
    assert!(space.has_dg_jumps());
    assert!(!space.velocity().is_continuous());
    let (_, space) = build(VelocityElement::P2, PressureElement::P1, [Extra::BrezziPitkaranta]);
    assert!(!space.has_dg_jumps());
}

#[test]
fn builder_uses_requested_velocity_elements() {
    let (_, space) = build(VelocityElement::Bdm3, PressureElement::P2Star, [Extra::InteriorPenalty]);
    assert_eq!(space.velocity().num_dofs(), 16 * 4 + 8 * 8);
    assert_eq!(space.velocity_order(), 3);
    let (_, space) = build(VelocityElement::CrouzeixRaviart, PressureElement::P0, Extras::new());
    assert_eq!(space.velocity().num_dofs(), 32);
    assert_eq!(space.pressure().num_dofs(), 8);
    assert_eq!(space.quadrature_strength(), 6);
}

#[test]
fn shared_lagrange_dofs_have_consistent_locations() {
    // Every element must map its local nodes onto the same global node positions, which
    // requires consistent numbering of edge nodes between elements with opposite orientation
    let level = MeshBuilder.build_mesh(MeshFamily::Unstructured, &Extras::new(), 0);
    for (velocity, pressure) in [
        (VelocityElement::P3, PressureElement::P2),
        (VelocityElement::P4, PressureElement::P3),
    ] {
        let discretization = Discretization::new(MeshFamily::Unstructured, velocity, pressure, Extras::new());
        let space = SpacePairBuilder.build(&level, &discretization);
        let locations = space.dof_locations(&level);
        let velocity_basis = match space.velocity().element() {
            VectorElement::Lagrange(basis) => basis.scalar_basis(),
            _ => unreachable!(),
        };
        for element in 0..level.num_elements() {
            let dofs = space.element_dofs(element);
            for node in 0..velocity_basis.len() {
                let x = level.map(element, &velocity_basis.reference_node(node));
                for c in 0..2 {
                    let dof = dofs[2 * node + c];
                    assert_scalar_eq!((locations[dof] - x).norm(), 0.0, comp = abs, tol = 1e-14);
                }
            }
            let offset = space.pressure_offset();
            let pressure_basis = space.pressure().basis();
            for node in 0..pressure_basis.len() {
                let x = level.map(element, &pressure_basis.reference_node(node));
                let dof = space.pressure().element_dofs(element)[node] + offset;
                assert_scalar_eq!((locations[dof] - x).norm(), 0.0, comp = abs, tol = 1e-14);
            }
        }
    }
}

#[test]
fn bdm_functions_have_continuous_normal_components() {
    let level = MeshBuilder.build_mesh(MeshFamily::Unstructured, &Extras::new(), 0);
    let topology = level.topology();
    let rule = segment_quadrature(4);
    for degree in 1..=3 {
        let space = VectorSpace::bdm(&level, degree);
        let mut owner_values = VectorBasisValues::default();
        let mut neighbor_values = VectorBasisValues::default();
        for edge in topology.interior_edges() {
            let (owner, neighbor) = topology.edge_elements(edge);
            let neighbor = neighbor.unwrap();
            let owner_dofs = space.element_dofs(owner.element);
            let neighbor_dofs = space.element_dofs(neighbor.element);
            for point in level.face_quadrature(edge, &rule) {
                let xi_neighbor = point.xi_neighbor.unwrap();
                let g_owner = level.geometry_point(owner.element, &point.xi_owner);
                let g_neighbor = level.geometry_point(neighbor.element, &xi_neighbor);
                space.populate(owner.element, &point.xi_owner, &g_owner, &mut owner_values);
                space.populate(neighbor.element, &xi_neighbor, &g_neighbor, &mut neighbor_values);

                for (i, dof) in owner_dofs.iter().enumerate() {
                    let flux_owner = owner_values.values[i].dot(&point.normal);
                    let flux_neighbor = neighbor_dofs
                        .iter()
                        .position(|d| d == dof)
                        .map(|j| neighbor_values.values[j].dot(&point.normal))
                        .unwrap_or(0.0);
                    assert_scalar_eq!(flux_owner, flux_neighbor, comp = abs, tol = 1e-10);
                }
            }
        }
    }
}

#[test]
fn continuous_boundary_interpolation_reproduces_linear_data() {
    let (level, space) = build(VelocityElement::P2, PressureElement::P1, Extras::new());
    let g = |x: &Point2<f64>| Vector2::new(1.0 + 2.0 * x.x, x.y - 3.0 * x.x);
    let mut coefficients = vec![f64::NAN; space.num_dofs()];
    space.interpolate_boundary(&level, g, &mut coefficients);

    let locations = space.dof_locations(&level);
    let dirichlet = space.dirichlet_dofs();
    for dof in 0..space.num_dofs() {
        if dirichlet[dof] {
            let expected = g(&locations[dof])[dof % 2];
            assert_scalar_eq!(coefficients[dof], expected, comp = abs, tol = 1e-14);
        } else {
            assert!(coefficients[dof].is_nan());
        }
    }
}

#[test]
fn crouzeix_raviart_boundary_interpolation_takes_edge_means() {
    let (level, space) = build(VelocityElement::CrouzeixRaviart, PressureElement::P0, Extras::new());
    // For linear data, the edge mean is the midpoint value
    let g = |x: &Point2<f64>| Vector2::new(x.x * 4.0, 1.0 - x.y);
    let mut coefficients = vec![0.0; space.num_dofs()];
    space.interpolate_boundary(&level, g, &mut coefficients);
    let topology = level.topology();
    for edge in topology.boundary_edges() {
        let [a, b] = topology.edges()[edge];
        let midpoint = nalgebra::center(&level.mesh().vertices()[a], &level.mesh().vertices()[b]);
        let expected = g(&midpoint);
        assert_scalar_eq!(coefficients[2 * edge], expected.x, comp = abs, tol = 1e-14);
        assert_scalar_eq!(coefficients[2 * edge + 1], expected.y, comp = abs, tol = 1e-14);
    }
}

#[test]
fn bdm_boundary_interpolation_of_constant_flow() {
    // The BDM interpolant of a constant field reproduces it, so each boundary edge carries only
    // the total flux in its zeroth moment
    let (level, space) = build(VelocityElement::Bdm2, PressureElement::P1Star, [Extra::InteriorPenalty]);
    let g = |_: &Point2<f64>| Vector2::new(1.0, 0.5);
    let mut coefficients = vec![0.0; space.num_dofs()];
    space.interpolate_boundary(&level, g, &mut coefficients);
    let topology = level.topology();
    for edge in topology.boundary_edges() {
        let [a, b] = topology.edges()[edge];
        let (x_a, x_b) = (level.mesh().vertices()[a], level.mesh().vertices()[b]);
        // Normal to the right of the direction from the lower to the higher vertex index
        let tangent = x_b - x_a;
        let normal = Vector2::new(tangent.y, -tangent.x);
        assert_scalar_eq!(coefficients[3 * edge], g(&x_a).dot(&normal), comp = abs, tol = 1e-13);
        assert_scalar_eq!(coefficients[3 * edge + 1], 0.0, comp = abs, tol = 1e-13);
        assert_scalar_eq!(coefficients[3 * edge + 2], 0.0, comp = abs, tol = 1e-13);
    }
}

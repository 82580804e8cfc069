//! Procedural generation of the base meshes of the built-in mesh families.
use crate::mesh::TriangleMesh2d;
use nalgebra::{Point2, Vector2};
use std::f64::consts::PI;

/// Relative magnitude of the vertex perturbation in [`create_perturbed_unit_square_mesh_2d`].
const PERTURBATION: f64 = 0.15;

fn grid_vertices(cells_per_dim: usize) -> Vec<Point2<f64>> {
    let n = cells_per_dim;
    let h = 1.0 / n as f64;
    (0..=n)
        .flat_map(|j| (0..=n).map(move |i| Point2::new(i as f64 * h, j as f64 * h)))
        .collect()
}

/// Vertex indices `[p00, p10, p11, p01]` of the grid cell `(i, j)`, counter-clockwise.
fn cell_vertices(cells_per_dim: usize, i: usize, j: usize) -> [usize; 4] {
    let row = cells_per_dim + 1;
    let p00 = j * row + i;
    [p00, p00 + 1, p00 + row + 1, p00 + row]
}

/// Unit square with `cells_per_dim` cells per side, each cell split into two triangles along
/// the diagonal from its lower left to its upper right corner.
pub fn create_unit_square_uniform_tri_mesh_2d(cells_per_dim: usize) -> TriangleMesh2d {
    let n = cells_per_dim;
    let mut connectivity = Vec::with_capacity(2 * n * n);
    for j in 0..n {
        for i in 0..n {
            let [p00, p10, p11, p01] = cell_vertices(n, i, j);
            connectivity.push([p00, p10, p11]);
            connectivity.push([p00, p11, p01]);
        }
    }
    TriangleMesh2d::from_vertices_and_connectivity(grid_vertices(n), connectivity)
}

/// Unit square with `cells_per_dim` quadrilateral cells per side, each cell split by both of
/// its diagonals into four triangles.
///
/// The cell centers have valence four with all incident edges on two straight lines, which
/// makes them singular vertices.
pub fn create_unit_square_criss_cross_mesh_2d(cells_per_dim: usize) -> TriangleMesh2d {
    let n = cells_per_dim;
    let mut vertices = grid_vertices(n);
    let mut connectivity = Vec::with_capacity(4 * n * n);
    for j in 0..n {
        for i in 0..n {
            let corners = cell_vertices(n, i, j);
            let center = nalgebra::center(&vertices[corners[0]], &vertices[corners[2]]);
            let c = vertices.len();
            vertices.push(center);
            for k in 0..4 {
                connectivity.push([corners[k], corners[(k + 1) % 4], c]);
            }
        }
    }
    TriangleMesh2d::from_vertices_and_connectivity(vertices, connectivity)
}

/// An unstructured mesh of the unit square.
///
/// Interior vertices of a uniform grid are moved by a deterministic perturbation. Each cell is
/// split along its shorter diagonal, except for the corner cells, which are split along the
/// diagonal through the domain corner so that no triangle has two boundary edges.
pub fn create_perturbed_unit_square_mesh_2d(cells_per_dim: usize) -> TriangleMesh2d {
    let n = cells_per_dim;
    let h = 1.0 / n as f64;
    let mut vertices = grid_vertices(n);
    for j in 1..n {
        for i in 1..n {
            let (s, t) = (i as f64, j as f64);
            let dx = (2.3 * s + 1.7 * t + 0.5).sin();
            let dy = (1.3 * s - 2.9 * t + 1.1).cos();
            vertices[j * (n + 1) + i] += Vector2::new(dx, dy) * (PERTURBATION * h);
        }
    }

    let mut connectivity = Vec::with_capacity(2 * n * n);
    for j in 0..n {
        for i in 0..n {
            let [p00, p10, p11, p01] = cell_vertices(n, i, j);
            let is_corner = (i == 0 || i + 1 == n) && (j == 0 || j + 1 == n);
            let split_through_p00 = if is_corner && n > 1 {
                // The lower left and upper right corner cells contain the domain corner in p00 or p11
                (i == 0) == (j == 0)
            } else {
                (vertices[p11] - vertices[p00]).norm() <= (vertices[p01] - vertices[p10]).norm()
            };
            if split_through_p00 {
                connectivity.push([p00, p10, p11]);
                connectivity.push([p00, p11, p01]);
            } else {
                connectivity.push([p00, p10, p01]);
                connectivity.push([p10, p11, p01]);
            }
        }
    }
    TriangleMesh2d::from_vertices_and_connectivity(vertices, connectivity)
}

/// A regular hexagon inscribed in the circle of the given radius around the origin, split into
/// six triangles around its center.
pub fn create_hexagon_disk_mesh_2d(radius: f64) -> TriangleMesh2d {
    let mut vertices = vec![Point2::origin()];
    vertices.extend((0..6).map(|k| {
        let theta = k as f64 * PI / 3.0;
        Point2::new(radius * theta.cos(), radius * theta.sin())
    }));
    let connectivity = (0..6).map(|k| [0, 1 + k, 1 + (k + 1) % 6]).collect();
    TriangleMesh2d::from_vertices_and_connectivity(vertices, connectivity)
}

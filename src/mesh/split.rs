//! Simplicial splits of triangle meshes into macro elements.
use crate::mesh::{Boundary, MeshTopology, TriangleMesh2d};
use nalgebra::{Matrix2, Point2};

/// Splits every triangle into three by connecting its vertices with its barycenter.
pub fn alfeld_split(mesh: &TriangleMesh2d) -> TriangleMesh2d {
    let mut vertices = mesh.vertices().to_vec();
    let mut connectivity = Vec::with_capacity(3 * mesh.num_elements());
    for (element, &[a, b, c]) in mesh.connectivity().iter().enumerate() {
        let [x_a, x_b, x_c] = mesh.element_vertices(element);
        let center = vertices.len();
        vertices.push(Point2::from((x_a.coords + x_b.coords + x_c.coords) / 3.0));
        connectivity.extend([[a, b, center], [b, c, center], [c, a, center]]);
    }
    TriangleMesh2d::from_vertices_and_connectivity(vertices, connectivity)
}

/// The center of the inscribed circle of a triangle.
pub fn incenter(vertices: &[Point2<f64>; 3]) -> Point2<f64> {
    let [a, b, c] = vertices;
    // Each vertex is weighted by the length of the opposite edge
    let (w_a, w_b, w_c) = ((c - b).norm(), (a - c).norm(), (b - a).norm());
    Point2::from((a.coords * w_a + b.coords * w_b + c.coords * w_c) / (w_a + w_b + w_c))
}

/// Parameter `r` of the point `a + r (b - a)` where the line through `a` and `b` meets the line
/// through `p` and `q`.
fn line_intersection(p: &Point2<f64>, q: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> Option<f64> {
    // Solve a + r (b - a) = p + s (q - p) for (r, s)
    let system = Matrix2::from_columns(&[b - a, p - q]);
    let solution = system.try_inverse()? * (p - a);
    Some(solution.x)
}

/// Splits every triangle into six around its incenter.
///
/// The split point of an interior edge is the intersection of the edge with the segment joining
/// the incenters of its two elements, so that split points and incenters of neighboring
/// elements are collinear. Boundary edges are split at their midpoint, projected onto the
/// boundary.
pub fn powell_sabin_split(mesh: &TriangleMesh2d, boundary: Boundary) -> TriangleMesh2d {
    let topology = MeshTopology::from_mesh(mesh);
    let incenters: Vec<_> = (0..mesh.num_elements())
        .map(|element| incenter(&mesh.element_vertices(element)))
        .collect();

    let mut vertices = mesh.vertices().to_vec();
    let edge_offset = vertices.len();
    for (edge, &[a, b]) in topology.edges().iter().enumerate() {
        let (x_a, x_b) = (&mesh.vertices()[a], &mesh.vertices()[b]);
        let midpoint = nalgebra::center(x_a, x_b);
        let split_point = match topology.edge_elements(edge) {
            (_, None) => boundary.project(&midpoint),
            (owner, Some(neighbor)) => {
                let (p, q) = (&incenters[owner.element], &incenters[neighbor.element]);
                // Keep split points away from the edge end points to avoid degenerate triangles
                line_intersection(p, q, x_a, x_b)
                    .map(|r| x_a + (x_b - x_a) * r.clamp(0.05, 0.95))
                    .unwrap_or(midpoint)
            }
        };
        vertices.push(split_point);
    }
    let incenter_offset = vertices.len();
    vertices.extend_from_slice(&incenters);

    let mut connectivity = Vec::with_capacity(6 * mesh.num_elements());
    for (element, conn) in mesh.connectivity().iter().enumerate() {
        let center = incenter_offset + element;
        let edges = topology.element_edges()[element];
        for local_edge in 0..3 {
            let split_point = edge_offset + edges[local_edge];
            let (start, end) = (conn[local_edge], conn[(local_edge + 1) % 3]);
            connectivity.push([start, split_point, center]);
            connectivity.push([split_point, end, center]);
        }
    }
    TriangleMesh2d::from_vertices_and_connectivity(vertices, connectivity)
}

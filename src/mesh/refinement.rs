//! Uniform refinement of triangle meshes.
//!
//! Each triangle is split into four congruent triangles by connecting its edge midpoints.
//! Midpoints of boundary edges are projected onto the domain boundary.
use crate::mesh::{Boundary, MeshTopology, TriangleMesh2d};
use fxhash::{FxHashMap, FxHashSet};
use nalgebra::Point2;
use std::hash::{Hash, Hasher};

/// Globally consistent label of a vertex in a refined mesh.
#[derive(Debug, Copy, Clone, Eq)]
pub enum VertexLabel {
    Vertex(usize),
    EdgeMidpoint([usize; 2]),
}

impl VertexLabel {
    fn canonical(&self) -> (usize, usize) {
        match *self {
            Self::Vertex(v) => (v, usize::MAX),
            Self::EdgeMidpoint([a, b]) => (a.min(b), a.max(b)),
        }
    }

    fn construct_vertex(&self, vertices: &[Point2<f64>]) -> Point2<f64> {
        match *self {
            Self::Vertex(v) => vertices[v],
            Self::EdgeMidpoint([a, b]) => nalgebra::center(&vertices[a], &vertices[b]),
        }
    }
}

impl PartialEq for VertexLabel {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Hash for VertexLabel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state)
    }
}

/// Labels of the four children of a triangle.
fn refined_connectivity(connectivity: &[usize; 3]) -> [[VertexLabel; 3]; 4] {
    use VertexLabel::{EdgeMidpoint, Vertex};
    let [a, b, c] = *connectivity;
    let (ab, bc, ca) = (EdgeMidpoint([a, b]), EdgeMidpoint([b, c]), EdgeMidpoint([c, a]));
    [
        [Vertex(a), ab, ca],
        [ab, Vertex(b), bc],
        [ca, bc, Vertex(c)],
        [ab, bc, ca],
    ]
}

/// Apply one round of uniform refinement.
pub fn refine_uniformly(mesh: &TriangleMesh2d, boundary: Boundary) -> TriangleMesh2d {
    let topology = MeshTopology::from_mesh(mesh);
    let boundary_edges: FxHashSet<[usize; 2]> = topology
        .boundary_edges()
        .map(|edge| topology.edges()[edge])
        .collect();

    let mut label_to_idx_map = FxHashMap::default();
    let mut labels = Vec::new();
    let mut new_connectivity = Vec::with_capacity(4 * mesh.num_elements());
    for connectivity in mesh.connectivity() {
        for child in refined_connectivity(connectivity) {
            let child_connectivity = child.map(|label| {
                *label_to_idx_map.entry(label).or_insert_with(|| {
                    labels.push(label);
                    labels.len() - 1
                })
            });
            new_connectivity.push(child_connectivity);
        }
    }

    let new_vertices = labels
        .iter()
        .map(|label| {
            let vertex = label.construct_vertex(mesh.vertices());
            match label.canonical() {
                (a, b) if b != usize::MAX && boundary_edges.contains(&[a, b]) => boundary.project(&vertex),
                _ => vertex,
            }
        })
        .collect();
    TriangleMesh2d::from_vertices_and_connectivity(new_vertices, new_connectivity)
}

/// Repeatedly applies uniform refinement to the given mesh.
pub fn refine_uniformly_repeat(mesh: &TriangleMesh2d, boundary: Boundary, repeat_times: usize) -> TriangleMesh2d {
    let mut mesh = mesh.clone();
    for _ in 0..repeat_times {
        mesh = refine_uniformly(&mesh, boundary);
    }
    mesh
}

//! Triangle meshes, their edge topology and refinement-indexed mesh levels.
use crate::element::{reference_edge_point, reference_edge_tangent, LagrangeBasis};
use crate::geometry::{project_to_circle, ElementGeometry, GeometryPoint, CURVING_DEGREE};
use crate::quadrature::{triangle_quadrature, SegmentQuadrature};
use fxhash::FxHashMap;
use nalgebra::{Point2, Vector2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub mod builder;
pub mod procedural;
pub mod refinement;
pub mod split;

/// Index-based triangle mesh with counter-clockwise oriented triangles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh2d {
    vertices: Vec<Point2<f64>>,
    connectivity: Vec<[usize; 3]>,
}

impl TriangleMesh2d {
    /// Construct a mesh from vertices and connectivity.
    ///
    /// Panics if the connectivity references vertices out of bounds.
    pub fn from_vertices_and_connectivity(vertices: Vec<Point2<f64>>, connectivity: Vec<[usize; 3]>) -> Self {
        assert!(
            connectivity.iter().flatten().all(|&v| v < vertices.len()),
            "Connectivity references vertices out of bounds."
        );
        Self { vertices, connectivity }
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices
    }

    pub fn connectivity(&self) -> &[[usize; 3]] {
        &self.connectivity
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_elements(&self) -> usize {
        self.connectivity.len()
    }

    pub fn element_vertices(&self, element: usize) -> [Point2<f64>; 3] {
        self.connectivity[element].map(|v| self.vertices[v])
    }

    /// Signed area of an element, positive for counter-clockwise orientation.
    pub fn signed_area(&self, element: usize) -> f64 {
        let [a, b, c] = self.element_vertices(element);
        0.5 * (b - a).perp(&(c - a))
    }

    pub fn is_counter_clockwise(&self) -> bool {
        (0..self.num_elements()).all(|e| self.signed_area(e) > 0.0)
    }
}

/// The boundary of the domain a mesh discretizes.
///
/// New vertices on boundary edges, as created by refinement and splitting, are projected onto
/// the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Boundary {
    Polygonal,
    Circle { radius: f64 },
}

impl Boundary {
    pub fn project(&self, x: &Point2<f64>) -> Point2<f64> {
        match self {
            Self::Polygonal => *x,
            Self::Circle { radius } => project_to_circle(x, *radius),
        }
    }
}

/// A local edge of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementFace {
    pub element: usize,
    pub local_edge: usize,
}

/// Edges of a triangle mesh and their adjacency to elements.
///
/// Global edges are stored with their vertex indices in increasing order. The first element
/// encountered for an edge is its owner, whose outward normal defines the orientation of
/// jumps across the edge.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshTopology {
    edges: Vec<[usize; 2]>,
    element_edges: Vec<[usize; 3]>,
    edge_elements: Vec<(ElementFace, Option<ElementFace>)>,
}

impl MeshTopology {
    pub fn from_mesh(mesh: &TriangleMesh2d) -> Self {
        let mut edge_indices = FxHashMap::default();
        let mut edges = Vec::new();
        let mut edge_elements: Vec<(ElementFace, Option<ElementFace>)> = Vec::new();
        let mut element_edges = Vec::with_capacity(mesh.num_elements());

        for (element, conn) in mesh.connectivity().iter().enumerate() {
            let mut local_edges = [0; 3];
            for local_edge in 0..3 {
                let (a, b) = (conn[local_edge], conn[(local_edge + 1) % 3]);
                let key = [a.min(b), a.max(b)];
                let face = ElementFace { element, local_edge };
                let edge = *edge_indices.entry(key).or_insert_with(|| {
                    edges.push(key);
                    edge_elements.push((face, None));
                    edges.len() - 1
                });
                if edge_elements[edge].0 != face {
                    assert!(
                        edge_elements[edge].1.is_none(),
                        "Edge shared by more than two elements: mesh is not a manifold."
                    );
                    edge_elements[edge].1 = Some(face);
                }
                local_edges[local_edge] = edge;
            }
            element_edges.push(local_edges);
        }

        Self {
            edges,
            element_edges,
            edge_elements,
        }
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[[usize; 2]] {
        &self.edges
    }

    /// Global edge indices of the local edges of each element.
    pub fn element_edges(&self) -> &[[usize; 3]] {
        &self.element_edges
    }

    pub fn edge_elements(&self, edge: usize) -> (ElementFace, Option<ElementFace>) {
        self.edge_elements[edge]
    }

    pub fn is_boundary_edge(&self, edge: usize) -> bool {
        self.edge_elements[edge].1.is_none()
    }

    pub fn boundary_edges(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_edges()).filter(|&edge| self.is_boundary_edge(edge))
    }

    pub fn interior_edges(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_edges()).filter(|&edge| !self.is_boundary_edge(edge))
    }

    /// Flags for each vertex of the mesh that lies on a boundary edge.
    pub fn boundary_vertices(&self, num_vertices: usize) -> Vec<bool> {
        let mut flags = vec![false; num_vertices];
        for edge in self.boundary_edges() {
            for v in self.edges[edge] {
                flags[v] = true;
            }
        }
        flags
    }
}

/// Returns `true` if the local edge of the element runs from the higher to the lower global
/// vertex index.
pub fn is_reversed(connectivity: &[usize; 3], local_edge: usize) -> bool {
    connectivity[local_edge] > connectivity[(local_edge + 1) % 3]
}

/// A quadrature point on a mesh edge, seen from the owner and (if present) the neighbor
/// element.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceQuadraturePoint {
    /// Quadrature weight including the length element.
    pub weight: f64,
    pub point: Point2<f64>,
    /// Unit normal pointing out of the owner element.
    pub normal: Vector2<f64>,
    pub xi_owner: Point2<f64>,
    pub xi_neighbor: Option<Point2<f64>>,
}

/// A discretized domain at a given refinement index.
#[derive(Debug, Clone)]
pub struct MeshLevel {
    mesh: TriangleMesh2d,
    topology: MeshTopology,
    boundary: Boundary,
    geometry: Vec<ElementGeometry>,
    curving_basis: LagrangeBasis,
    refinement_level: usize,
}

impl MeshLevel {
    /// A mesh level with affine element maps.
    pub fn new(mesh: TriangleMesh2d, boundary: Boundary, refinement_level: usize) -> Self {
        let topology = MeshTopology::from_mesh(&mesh);
        let geometry = (0..mesh.num_elements())
            .map(|element| ElementGeometry::Affine {
                vertices: mesh.element_vertices(element),
            })
            .collect();
        Self {
            mesh,
            topology,
            boundary,
            geometry,
            curving_basis: LagrangeBasis::new(CURVING_DEGREE),
            refinement_level,
        }
    }

    /// Replaces the element maps, e.g. by curved maps.
    pub fn with_geometry(mut self, geometry: Vec<ElementGeometry>) -> Self {
        assert_eq!(geometry.len(), self.mesh.num_elements());
        self.geometry = geometry;
        self
    }

    pub fn mesh(&self) -> &TriangleMesh2d {
        &self.mesh
    }

    pub fn topology(&self) -> &MeshTopology {
        &self.topology
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    pub fn element_geometry(&self, element: usize) -> &ElementGeometry {
        &self.geometry[element]
    }

    pub fn refinement_level(&self) -> usize {
        self.refinement_level
    }

    pub fn num_elements(&self) -> usize {
        self.mesh.num_elements()
    }

    pub fn is_curved(&self) -> bool {
        self.geometry.iter().any(ElementGeometry::is_curved)
    }

    pub fn geometry_point(&self, element: usize, xi: &Point2<f64>) -> GeometryPoint {
        self.geometry[element].evaluate(xi, &self.curving_basis)
    }

    pub fn map(&self, element: usize, xi: &Point2<f64>) -> Point2<f64> {
        self.geometry[element].map(xi, &self.curving_basis)
    }

    /// The longest edge of an element.
    pub fn element_diameter(&self, element: usize) -> f64 {
        let v = self.mesh.element_vertices(element);
        (0..3)
            .map(|e| (v[(e + 1) % 3] - v[e]).norm())
            .fold(0.0, f64::max)
    }

    /// The distance between the end points of an edge.
    pub fn face_length(&self, edge: usize) -> f64 {
        let [a, b] = self.topology.edges()[edge];
        (self.mesh.vertices()[b] - self.mesh.vertices()[a]).norm()
    }

    /// Maps a rule on the unit interval to the given edge.
    ///
    /// The edge is parametrized along the owner's local edge. The neighbor traverses the shared
    /// edge in the opposite direction.
    pub fn face_quadrature(&self, edge: usize, rule: &SegmentQuadrature) -> Vec<FaceQuadraturePoint> {
        let (owner, neighbor) = self.topology.edge_elements(edge);
        let tangent_ref = reference_edge_tangent(owner.local_edge);
        rule.iter()
            .map(|(w, t)| {
                let xi_owner = reference_edge_point(owner.local_edge, t);
                let geometry = self.geometry_point(owner.element, &xi_owner);
                let tangent = geometry.jacobian * tangent_ref;
                let length = tangent.norm();
                FaceQuadraturePoint {
                    weight: w * length,
                    point: geometry.point,
                    normal: Vector2::new(tangent.y, -tangent.x) / length,
                    xi_owner,
                    xi_neighbor: neighbor.map(|face| reference_edge_point(face.local_edge, 1.0 - t)),
                }
            })
            .collect()
    }

    /// Integrates a function over the domain with a rule of the given strength on each element.
    ///
    /// The integrand receives the element index, the reference point and the element map at
    /// that point. Elements are processed in parallel.
    pub fn integrate<F, const N: usize>(&self, strength: usize, f: F) -> [f64; N]
    where
        F: Fn(usize, &Point2<f64>, &GeometryPoint) -> [f64; N] + Sync,
    {
        let quadrature = triangle_quadrature(strength);
        (0..self.num_elements())
            .into_par_iter()
            .map(|element| {
                let mut sum = [0.0; N];
                for (w, xi) in quadrature.iter() {
                    let geometry = self.geometry_point(element, xi);
                    let weight = geometry.physical_weight(w);
                    for (s, value) in sum.iter_mut().zip(f(element, xi, &geometry)) {
                        *s += weight * value;
                    }
                }
                sum
            })
            .reduce(
                || [0.0; N],
                |mut a, b| {
                    a.iter_mut().zip(b).for_each(|(a, b)| *a += b);
                    a
                },
            )
    }

    pub fn area(&self) -> f64 {
        let strength = if self.is_curved() { 2 * CURVING_DEGREE } else { 1 };
        let [area] = self.integrate(strength, |_, _, _| [1.0]);
        area
    }
}


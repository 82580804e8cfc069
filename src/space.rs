//! Discrete velocity and pressure spaces on a mesh level.
//!
//! Global degrees of freedom of a [`SpacePair`] are laid out as
//! `[velocity | bubble | pressure]`. Within an element, local degrees of freedom follow the same
//! order, and [`LocalBasisValues`] holds the velocity and bubble functions as one list of vector
//! basis functions.
use crate::config::{Discretization, Extra, VelocityElement};
use crate::element::{
    populate_scalar, reference_edge_point, shifted_legendre, BdmBasis, BubbleBasis, CrouzeixRaviartBasis,
    LagrangeBasis, ScalarBasisValues, VectorBasis, VectorBasisValues, VectorLagrangeBasis,
};
use crate::geometry::GeometryPoint;
use crate::mesh::{is_reversed, MeshLevel};
use crate::quadrature::{segment_quadrature, SegmentQuadrature};
use log::debug;
use nalgebra::{Point2, Vector2};

const CENTROID: [f64; 2] = [1.0 / 3.0, 1.0 / 3.0];

fn centroid() -> Point2<f64> {
    Point2::from(CENTROID)
}

/// Global numbering of the nodes of a Lagrange basis.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NodeNumbering {
    num_nodes: usize,
    element_nodes: Vec<Vec<usize>>,
    boundary_nodes: Vec<bool>,
}

/// Numbers Lagrange nodes either continuously (vertices, then edges, then element interiors)
/// or element by element.
///
/// Continuous edge nodes are numbered from the lower to the higher vertex index of the edge.
fn number_lagrange_nodes(level: &MeshLevel, basis: &LagrangeBasis, continuous: bool) -> NodeNumbering {
    let mesh = level.mesh();
    let topology = level.topology();
    let nodes_per_element = basis.len();

    if !continuous || basis.degree() == 0 {
        let num_nodes = mesh.num_elements() * nodes_per_element;
        let element_nodes = (0..mesh.num_elements())
            .map(|element| (0..nodes_per_element).map(|i| element * nodes_per_element + i).collect())
            .collect();
        return NodeNumbering {
            num_nodes,
            element_nodes,
            boundary_nodes: vec![false; num_nodes],
        };
    }

    let k = basis.degree();
    let num_vertices = mesh.num_vertices();
    let per_edge = basis.nodes_per_edge();
    let per_interior = basis.interior_nodes();
    let interior_offset = num_vertices + topology.num_edges() * per_edge;
    let num_nodes = interior_offset + mesh.num_elements() * per_interior;

    let mut element_nodes = Vec::with_capacity(mesh.num_elements());
    for (element, conn) in mesh.connectivity().iter().enumerate() {
        let mut nodes = vec![usize::MAX; nodes_per_element];
        nodes[..3].copy_from_slice(conn);
        for (local_edge, &edge) in topology.element_edges()[element].iter().enumerate() {
            for t in 1..k {
                let s = if is_reversed(conn, local_edge) { k - 1 - t } else { t - 1 };
                nodes[basis.edge_node(local_edge, t)] = num_vertices + edge * per_edge + s;
            }
        }
        for m in 0..per_interior {
            nodes[basis.first_interior_node() + m] = interior_offset + element * per_interior + m;
        }
        element_nodes.push(nodes);
    }

    let mut boundary_nodes = vec![false; num_nodes];
    for edge in topology.boundary_edges() {
        for v in topology.edges()[edge] {
            boundary_nodes[v] = true;
        }
        for s in 0..per_edge {
            boundary_nodes[num_vertices + edge * per_edge + s] = true;
        }
    }

    NodeNumbering {
        num_nodes,
        element_nodes,
        boundary_nodes,
    }
}

/// The finite element underlying a vector-valued space.
#[derive(Debug, Clone)]
pub enum VectorElement {
    Lagrange(VectorLagrangeBasis),
    CrouzeixRaviart(CrouzeixRaviartBasis),
    Bdm(BdmBasis),
    Bubble(BubbleBasis),
}

impl VectorElement {
    pub fn basis(&self) -> &dyn VectorBasis {
        match self {
            Self::Lagrange(basis) => basis,
            Self::CrouzeixRaviart(basis) => basis,
            Self::Bdm(basis) => basis,
            Self::Bubble(basis) => basis,
        }
    }

    /// A reference point associated with a local degree of freedom.
    fn dof_reference_location(&self, local_dof: usize) -> Point2<f64> {
        match self {
            Self::Lagrange(basis) => basis.scalar_basis().reference_node(local_dof / 2),
            Self::CrouzeixRaviart(_) => reference_edge_point(local_dof / 2, 0.5),
            Self::Bdm(basis) if local_dof < basis.num_edge_dofs() => {
                reference_edge_point(local_dof / (basis.degree() + 1), 0.5)
            }
            Self::Bdm(_) | Self::Bubble(_) => centroid(),
        }
    }
}

/// A vector-valued finite element space.
#[derive(Debug, Clone)]
pub struct VectorSpace {
    element: VectorElement,
    order: usize,
    continuous: bool,
    num_dofs: usize,
    element_dofs: Vec<Vec<usize>>,
    /// Orientation signs of local basis functions, if the element has oriented degrees of freedom.
    element_signs: Option<Vec<Vec<f64>>>,
    dirichlet_dofs: Vec<bool>,
}

impl VectorSpace {
    /// Vector Lagrange elements with `2 * node + component` numbering.
    ///
    /// The continuous space has Dirichlet degrees of freedom on all boundary nodes.
    pub fn lagrange(level: &MeshLevel, degree: usize, continuous: bool) -> Self {
        let basis = VectorLagrangeBasis::new(degree);
        let nodes = number_lagrange_nodes(level, basis.scalar_basis(), continuous);
        let element_dofs = nodes
            .element_nodes
            .iter()
            .map(|element_nodes| {
                element_nodes
                    .iter()
                    .flat_map(|node| [2 * node, 2 * node + 1])
                    .collect()
            })
            .collect();
        let dirichlet_dofs = nodes
            .boundary_nodes
            .iter()
            .flat_map(|&flag| [flag, flag])
            .collect();
        Self {
            element: VectorElement::Lagrange(basis),
            order: degree,
            continuous,
            num_dofs: 2 * nodes.num_nodes,
            element_dofs,
            element_signs: None,
            dirichlet_dofs,
        }
    }

    /// The Crouzeix–Raviart space with degree of freedom `2 * edge + component`.
    pub fn crouzeix_raviart(level: &MeshLevel) -> Self {
        let topology = level.topology();
        let element_dofs = topology
            .element_edges()
            .iter()
            .map(|edges| edges.iter().flat_map(|edge| [2 * edge, 2 * edge + 1]).collect())
            .collect();
        let mut dirichlet_dofs = vec![false; 2 * topology.num_edges()];
        for edge in topology.boundary_edges() {
            dirichlet_dofs[2 * edge] = true;
            dirichlet_dofs[2 * edge + 1] = true;
        }
        Self {
            element: VectorElement::CrouzeixRaviart(CrouzeixRaviartBasis),
            order: 1,
            continuous: false,
            num_dofs: 2 * topology.num_edges(),
            element_dofs,
            element_signs: None,
            dirichlet_dofs,
        }
    }

    /// The Brezzi–Douglas–Marini space of the given degree.
    ///
    /// Edge degrees of freedom `edge * (degree + 1) + j` are normal moments against the shifted
    /// Legendre polynomial of degree `j`, taken with respect to the normal and parametrization
    /// induced by running from the lower to the higher vertex index. Interior degrees of freedom
    /// follow per element.
    pub fn bdm(level: &MeshLevel, degree: usize) -> Self {
        let basis = BdmBasis::new(degree);
        let mesh = level.mesh();
        let topology = level.topology();
        let per_edge = degree + 1;
        let per_interior = basis.num_interior_dofs();
        let interior_offset = topology.num_edges() * per_edge;

        let mut element_dofs = Vec::with_capacity(mesh.num_elements());
        let mut element_signs = Vec::with_capacity(mesh.num_elements());
        for (element, conn) in mesh.connectivity().iter().enumerate() {
            let mut dofs = Vec::with_capacity(basis.num_local_dofs());
            let mut signs = Vec::with_capacity(basis.num_local_dofs());
            for (local_edge, &edge) in topology.element_edges()[element].iter().enumerate() {
                for j in 0..per_edge {
                    dofs.push(edge * per_edge + j);
                    // Reversal flips the normal and maps L_j(t) to (-1)^j L_j(t)
                    let sign = if is_reversed(conn, local_edge) && j % 2 == 0 { -1.0 } else { 1.0 };
                    signs.push(sign);
                }
            }
            dofs.extend((0..per_interior).map(|m| interior_offset + element * per_interior + m));
            signs.extend((0..per_interior).map(|_| 1.0));
            element_dofs.push(dofs);
            element_signs.push(signs);
        }

        let num_dofs = interior_offset + mesh.num_elements() * per_interior;
        let mut dirichlet_dofs = vec![false; num_dofs];
        for edge in topology.boundary_edges() {
            dirichlet_dofs[edge * per_edge..(edge + 1) * per_edge].fill(true);
        }

        Self {
            element: VectorElement::Bdm(basis),
            order: degree,
            continuous: false,
            num_dofs,
            element_dofs,
            element_signs: Some(element_signs),
            dirichlet_dofs,
        }
    }

    /// The cubic bubble of each element for both velocity components, numbered
    /// `2 * element + component`.
    pub fn bubble(level: &MeshLevel) -> Self {
        let n = level.num_elements();
        Self {
            element: VectorElement::Bubble(BubbleBasis),
            order: 3,
            continuous: true,
            num_dofs: 2 * n,
            element_dofs: (0..n).map(|element| vec![2 * element, 2 * element + 1]).collect(),
            element_signs: None,
            dirichlet_dofs: vec![false; 2 * n],
        }
    }

    pub fn element(&self) -> &VectorElement {
        &self.element
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Whether the space is a subspace of $H^1$.
    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    pub fn element_dofs(&self, element: usize) -> &[usize] {
        &self.element_dofs[element]
    }

    pub fn dirichlet_dofs(&self) -> &[bool] {
        &self.dirichlet_dofs
    }

    /// Evaluates the global basis functions supported on an element.
    pub fn populate(&self, element: usize, xi: &Point2<f64>, geometry: &GeometryPoint, output: &mut VectorBasisValues) {
        self.element.basis().populate(xi, geometry, output);
        if let Some(signs) = &self.element_signs {
            for (i, &sign) in signs[element].iter().enumerate() {
                output.values[i] *= sign;
                output.gradients[i] *= sign;
                output.divergences[i] *= sign;
            }
        }
    }

    /// Writes the interpolant of the boundary data into the coefficients of the Dirichlet
    /// degrees of freedom.
    ///
    /// Lagrange nodes take point values, Crouzeix–Raviart degrees of freedom take edge means and
    /// BDM degrees of freedom take normal moments computed with `face_rule`.
    pub fn interpolate_boundary<G>(
        &self,
        level: &MeshLevel,
        face_rule: &SegmentQuadrature,
        boundary_velocity: G,
        coefficients: &mut [f64],
    ) where
        G: Fn(&Point2<f64>) -> Vector2<f64>,
    {
        assert_eq!(coefficients.len(), self.num_dofs);
        let topology = level.topology();
        for edge in topology.boundary_edges() {
            let (owner, _) = topology.edge_elements(edge);
            let dofs = &self.element_dofs[owner.element];
            match &self.element {
                VectorElement::Lagrange(basis) if self.continuous => {
                    let scalar = basis.scalar_basis();
                    let e = owner.local_edge;
                    let local_nodes = [e, (e + 1) % 3]
                        .into_iter()
                        .chain((1..scalar.degree()).map(|t| scalar.edge_node(e, t)));
                    for node in local_nodes {
                        let x = level.map(owner.element, &scalar.reference_node(node));
                        let g = boundary_velocity(&x);
                        for c in 0..2 {
                            coefficients[dofs[2 * node + c]] = g[c];
                        }
                    }
                }
                VectorElement::CrouzeixRaviart(_) => {
                    let points = level.face_quadrature(edge, face_rule);
                    let length: f64 = points.iter().map(|p| p.weight).sum();
                    let mean = points
                        .iter()
                        .fold(Vector2::zeros(), |sum, p| sum + boundary_velocity(&p.point) * p.weight)
                        / length;
                    for c in 0..2 {
                        coefficients[2 * edge + c] = mean[c];
                    }
                }
                VectorElement::Bdm(basis) => {
                    let k = basis.degree();
                    let signs = &self.element_signs.as_ref().expect("BDM spaces carry signs")[owner.element];
                    let mut legendre = vec![0.0; k + 1];
                    let mut moments = vec![0.0; k + 1];
                    let points = level.face_quadrature(edge, face_rule);
                    for (t, point) in face_rule.points().iter().zip(&points) {
                        shifted_legendre(*t, &mut legendre);
                        let flux = boundary_velocity(&point.point).dot(&point.normal);
                        for (moment, l) in moments.iter_mut().zip(&legendre) {
                            *moment += point.weight * flux * l;
                        }
                    }
                    for (j, moment) in moments.iter().enumerate() {
                        let local = basis.edge_dof(owner.local_edge, j);
                        coefficients[dofs[local]] = signs[local] * moment;
                    }
                }
                VectorElement::Lagrange(_) | VectorElement::Bubble(_) => {}
            }
        }
    }
}

/// A scalar Lagrange space.
#[derive(Debug, Clone)]
pub struct ScalarSpace {
    basis: LagrangeBasis,
    continuous: bool,
    num_dofs: usize,
    element_dofs: Vec<Vec<usize>>,
}

impl ScalarSpace {
    pub fn lagrange(level: &MeshLevel, degree: usize, continuous: bool) -> Self {
        let basis = LagrangeBasis::new(degree);
        let continuous = continuous && degree > 0;
        let nodes = number_lagrange_nodes(level, &basis, continuous);
        Self {
            basis,
            continuous,
            num_dofs: nodes.num_nodes,
            element_dofs: nodes.element_nodes,
        }
    }

    pub fn basis(&self) -> &LagrangeBasis {
        &self.basis
    }

    pub fn order(&self) -> usize {
        self.basis.degree()
    }

    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    pub fn element_dofs(&self, element: usize) -> &[usize] {
        &self.element_dofs[element]
    }
}

/// Basis functions of a [`SpacePair`] on one element, evaluated at one point.
#[derive(Debug, Clone, Default)]
pub struct LocalBasisValues {
    /// Velocity functions, followed by bubble functions if present.
    pub velocity: VectorBasisValues,
    pub pressure: ScalarBasisValues,
    bubble: VectorBasisValues,
}

impl LocalBasisValues {
    pub fn num_velocity(&self) -> usize {
        self.velocity.len()
    }

    pub fn num_pressure(&self) -> usize {
        self.pressure.values.len()
    }

    pub fn len(&self) -> usize {
        self.num_velocity() + self.num_pressure()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The discrete trial and test space of the Stokes problem.
#[derive(Debug, Clone)]
pub struct SpacePair {
    velocity: VectorSpace,
    bubble: Option<VectorSpace>,
    pressure: ScalarSpace,
    dg_jumps: bool,
}

impl SpacePair {
    pub fn new(velocity: VectorSpace, bubble: Option<VectorSpace>, pressure: ScalarSpace, dg_jumps: bool) -> Self {
        Self {
            velocity,
            bubble,
            pressure,
            dg_jumps,
        }
    }

    pub fn velocity(&self) -> &VectorSpace {
        &self.velocity
    }

    pub fn bubble(&self) -> Option<&VectorSpace> {
        self.bubble.as_ref()
    }

    pub fn pressure(&self) -> &ScalarSpace {
        &self.pressure
    }

    /// Whether jump and average operators across faces are available.
    pub fn has_dg_jumps(&self) -> bool {
        self.dg_jumps
    }

    /// The order of the velocity base space, used for convergence classification.
    pub fn velocity_order(&self) -> usize {
        self.velocity.order()
    }

    pub fn pressure_order(&self) -> usize {
        self.pressure.order()
    }

    pub fn bubble_offset(&self) -> usize {
        self.velocity.num_dofs()
    }

    pub fn pressure_offset(&self) -> usize {
        self.bubble_offset() + self.bubble.as_ref().map_or(0, VectorSpace::num_dofs)
    }

    pub fn num_velocity_dofs(&self) -> usize {
        self.pressure_offset()
    }

    pub fn num_dofs(&self) -> usize {
        self.pressure_offset() + self.pressure.num_dofs()
    }

    /// Global indices of the local degrees of freedom of an element.
    pub fn populate_element_dofs(&self, element: usize, dofs: &mut Vec<usize>) {
        dofs.clear();
        dofs.extend_from_slice(self.velocity.element_dofs(element));
        if let Some(bubble) = &self.bubble {
            let offset = self.bubble_offset();
            dofs.extend(bubble.element_dofs(element).iter().map(|dof| offset + dof));
        }
        let offset = self.pressure_offset();
        dofs.extend(self.pressure.element_dofs(element).iter().map(|dof| offset + dof));
    }

    pub fn element_dofs(&self, element: usize) -> Vec<usize> {
        let mut dofs = Vec::new();
        self.populate_element_dofs(element, &mut dofs);
        dofs
    }

    /// Evaluates all basis functions supported on an element.
    pub fn populate(&self, element: usize, xi: &Point2<f64>, geometry: &GeometryPoint, values: &mut LocalBasisValues) {
        self.velocity
            .populate(element, xi, geometry, &mut values.velocity);
        if let Some(bubble) = &self.bubble {
            bubble.populate(element, xi, geometry, &mut values.bubble);
            let velocity = &mut values.velocity;
            velocity.values.extend_from_slice(&values.bubble.values);
            velocity.gradients.extend_from_slice(&values.bubble.gradients);
            velocity
                .divergences
                .extend_from_slice(&values.bubble.divergences);
        }
        populate_scalar(self.pressure.basis(), xi, geometry, &mut values.pressure);
    }

    /// Flags for all global degrees of freedom that are prescribed by boundary data.
    pub fn dirichlet_dofs(&self) -> Vec<bool> {
        let mut flags = vec![false; self.num_dofs()];
        flags[..self.velocity.num_dofs()].copy_from_slice(self.velocity.dirichlet_dofs());
        flags
    }

    /// Interpolates the boundary velocity into a global coefficient vector.
    pub fn interpolate_boundary<G>(&self, level: &MeshLevel, boundary_velocity: G, coefficients: &mut [f64])
    where
        G: Fn(&Point2<f64>) -> Vector2<f64>,
    {
        let velocity_dofs = self.velocity.num_dofs();
        self.velocity.interpolate_boundary(
            level,
            &self.face_rule(),
            boundary_velocity,
            &mut coefficients[..velocity_dofs],
        );
    }

    /// Physical locations associated with all global degrees of freedom.
    pub fn dof_locations(&self, level: &MeshLevel) -> Vec<Point2<f64>> {
        let mut locations = vec![Point2::origin(); self.num_dofs()];
        let mut dofs = Vec::new();
        for element in 0..level.num_elements() {
            self.populate_element_dofs(element, &mut dofs);
            let num_velocity = self.velocity.element_dofs(element).len();
            let num_bubble = self
                .bubble
                .as_ref()
                .map_or(0, |bubble| bubble.element_dofs(element).len());
            for (local, &dof) in dofs.iter().enumerate() {
                let xi = if local < num_velocity {
                    self.velocity.element().dof_reference_location(local)
                } else if local < num_velocity + num_bubble {
                    centroid()
                } else {
                    self.pressure
                        .basis()
                        .reference_node(local - num_velocity - num_bubble)
                };
                locations[dof] = level.map(element, &xi);
            }
        }
        locations
    }

    fn max_order(&self) -> usize {
        let bubble_order = self.bubble.as_ref().map_or(0, VectorSpace::order);
        self.velocity
            .order()
            .max(bubble_order)
            .max(self.pressure.order())
    }

    /// Strength of the element quadrature used for forms and errors.
    pub fn quadrature_strength(&self) -> usize {
        2 * self.max_order() + 4
    }

    /// Gauss rule used on faces for forms and boundary interpolation.
    pub fn face_rule(&self) -> SegmentQuadrature {
        segment_quadrature(self.max_order() + 3)
    }
}

/// Constructs the space pair for a discretization on a mesh level.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpacePairBuilder;

impl SpacePairBuilder {
    pub fn build(&self, level: &MeshLevel, discretization: &Discretization) -> SpacePair {
        use VelocityElement::*;
        let velocity_element = discretization.velocity;
        let order = velocity_element.order();
        let velocity = match velocity_element {
            CrouzeixRaviart => VectorSpace::crouzeix_raviart(level),
            Bdm1 | Bdm2 | Bdm3 | Bdm4 => VectorSpace::bdm(level, order),
            P1 | P2 | P3 | P4 => VectorSpace::lagrange(level, order, true),
            P1Star | P2Star | P3Star | P4Star => VectorSpace::lagrange(level, order, false),
        };

        let bubble = (discretization.has(Extra::P3Bubble) && order < 3).then(|| VectorSpace::bubble(level));

        let pressure_element = discretization.pressure;
        let pressure = ScalarSpace::lagrange(level, pressure_element.order(), !pressure_element.is_discontinuous());

        let dg_jumps = discretization.extras.requires_dg_jumps();
        let pair = SpacePair::new(velocity, bubble, pressure, dg_jumps);
        debug!(
            "Space pair {}/{}: {} velocity DOFs, {} pressure DOFs, DG jumps: {}",
            velocity_element,
            pressure_element,
            pair.num_velocity_dofs(),
            pair.pressure().num_dofs(),
            dg_jumps
        );
        pair
    }
}

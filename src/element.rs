//! Finite element bases on the reference triangle.
//!
//! The reference triangle has vertices $(0, 0)$, $(1, 0)$ and $(0, 1)$ with barycentric
//! coordinates $\lambda_0 = 1 - \xi - \eta$, $\lambda_1 = \xi$ and $\lambda_2 = \eta$.
//! Local edge `e` runs from vertex `e` to vertex `(e + 1) % 3`.
use crate::geometry::GeometryPoint;
use nalgebra::{Matrix2, Point2, Vector2};
use std::fmt::Debug;

mod bdm;
mod lagrange;

pub use bdm::{shifted_legendre, BdmBasis};
pub use lagrange::LagrangeBasis;

/// Reference gradients of the barycentric coordinates.
pub const BARYCENTRIC_GRADIENTS: [[f64; 2]; 3] = [[-1.0, -1.0], [1.0, 0.0], [0.0, 1.0]];

pub fn reference_vertices() -> [Point2<f64>; 3] {
    [Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0)]
}

pub fn barycentric_coordinates(xi: &Point2<f64>) -> [f64; 3] {
    [1.0 - xi.x - xi.y, xi.x, xi.y]
}

/// The point at parameter `t` in `[0, 1]` along the given local edge.
pub fn reference_edge_point(local_edge: usize, t: f64) -> Point2<f64> {
    let v = reference_vertices();
    let a = v[local_edge];
    let b = v[(local_edge + 1) % 3];
    a + (b - a) * t
}

/// Tangent of the given local edge, with length equal to the reference edge length.
pub fn reference_edge_tangent(local_edge: usize) -> Vector2<f64> {
    let v = reference_vertices();
    v[(local_edge + 1) % 3] - v[local_edge]
}

/// Rotates a tangent of a counter-clockwise boundary into the outward normal direction.
pub fn outward_normal_from_tangent(tangent: &Vector2<f64>) -> Vector2<f64> {
    Vector2::new(tangent.y, -tangent.x)
}

/// Values of vector-valued basis functions mapped to a physical element.
#[derive(Debug, Clone, Default)]
pub struct VectorBasisValues {
    pub values: Vec<Vector2<f64>>,
    /// Gradients with rows corresponding to components.
    pub gradients: Vec<Matrix2<f64>>,
    pub divergences: Vec<f64>,
}

impl VectorBasisValues {
    pub fn resize(&mut self, n: usize) {
        self.values.resize(n, Vector2::zeros());
        self.gradients.resize(n, Matrix2::zeros());
        self.divergences.resize(n, 0.0);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Values of scalar basis functions mapped to a physical element.
#[derive(Debug, Clone, Default)]
pub struct ScalarBasisValues {
    pub values: Vec<f64>,
    pub gradients: Vec<Vector2<f64>>,
}

/// A basis for a vector-valued finite element on a triangle.
pub trait VectorBasis: Debug + Send + Sync {
    fn num_local_dofs(&self) -> usize;

    /// Evaluates all local basis functions at the reference point `xi`, where `geometry`
    /// describes the element map at `xi`.
    fn populate(&self, xi: &Point2<f64>, geometry: &GeometryPoint, output: &mut VectorBasisValues);
}

/// Vector-valued Lagrange basis. Local DOF `2 * node + component`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorLagrangeBasis {
    scalar: LagrangeBasis,
}

impl VectorLagrangeBasis {
    pub fn new(degree: usize) -> Self {
        Self {
            scalar: LagrangeBasis::new(degree),
        }
    }

    pub fn scalar_basis(&self) -> &LagrangeBasis {
        &self.scalar
    }
}

/// Populates vector basis functions $\phi_i e_c$ from scalar values and reference gradients.
fn populate_from_scalar(
    values: &[f64],
    reference_gradients: &[Vector2<f64>],
    geometry: &GeometryPoint,
    output: &mut VectorBasisValues,
) {
    output.resize(2 * values.len());
    for (i, (phi, grad_ref)) in values.iter().zip(reference_gradients).enumerate() {
        let grad = geometry.physical_gradient(grad_ref);
        for c in 0..2 {
            let dof = 2 * i + c;
            let mut value = Vector2::zeros();
            value[c] = *phi;
            let mut gradient = Matrix2::zeros();
            gradient.set_row(c, &grad.transpose());
            output.values[dof] = value;
            output.gradients[dof] = gradient;
            output.divergences[dof] = grad[c];
        }
    }
}

impl VectorBasis for VectorLagrangeBasis {
    fn num_local_dofs(&self) -> usize {
        2 * self.scalar.len()
    }

    fn populate(&self, xi: &Point2<f64>, geometry: &GeometryPoint, output: &mut VectorBasisValues) {
        let n = self.scalar.len();
        let mut values = vec![0.0; n];
        let mut gradients = vec![Vector2::zeros(); n];
        self.scalar
            .evaluate_with_gradients(xi, &mut values, &mut gradients);
        populate_from_scalar(&values, &gradients, geometry, output);
    }
}

/// The nonconforming linear Crouzeix–Raviart element.
///
/// The basis function associated with local edge `e` equals one in the midpoint of `e` and
/// vanishes in the midpoints of the other edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrouzeixRaviartBasis;

impl CrouzeixRaviartBasis {
    pub fn evaluate_scalar(xi: &Point2<f64>) -> ([f64; 3], [Vector2<f64>; 3]) {
        let lambda = barycentric_coordinates(xi);
        let mut values = [0.0; 3];
        let mut gradients = [Vector2::zeros(); 3];
        for e in 0..3 {
            let opposite = (e + 2) % 3;
            let [a, b] = BARYCENTRIC_GRADIENTS[opposite];
            values[e] = 1.0 - 2.0 * lambda[opposite];
            gradients[e] = Vector2::new(-2.0 * a, -2.0 * b);
        }
        (values, gradients)
    }
}

impl VectorBasis for CrouzeixRaviartBasis {
    fn num_local_dofs(&self) -> usize {
        6
    }

    fn populate(&self, xi: &Point2<f64>, geometry: &GeometryPoint, output: &mut VectorBasisValues) {
        let (values, gradients) = Self::evaluate_scalar(xi);
        populate_from_scalar(&values, &gradients, geometry, output);
    }
}

/// The cubic bubble $27 \lambda_0 \lambda_1 \lambda_2$ for each velocity component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BubbleBasis;

impl BubbleBasis {
    pub fn evaluate_scalar(xi: &Point2<f64>) -> (f64, Vector2<f64>) {
        let [l0, l1, l2] = barycentric_coordinates(xi);
        let g = BARYCENTRIC_GRADIENTS.map(|[a, b]| Vector2::new(a, b));
        let value = 27.0 * l0 * l1 * l2;
        let gradient = (g[0] * (l1 * l2) + g[1] * (l0 * l2) + g[2] * (l0 * l1)) * 27.0;
        (value, gradient)
    }
}

impl VectorBasis for BubbleBasis {
    fn num_local_dofs(&self) -> usize {
        2
    }

    fn populate(&self, xi: &Point2<f64>, geometry: &GeometryPoint, output: &mut VectorBasisValues) {
        let (value, gradient) = Self::evaluate_scalar(xi);
        populate_from_scalar(&[value], &[gradient], geometry, output);
    }
}

/// Evaluates a scalar Lagrange basis with physical gradients.
pub fn populate_scalar(
    basis: &LagrangeBasis,
    xi: &Point2<f64>,
    geometry: &GeometryPoint,
    output: &mut ScalarBasisValues,
) {
    let n = basis.len();
    output.values.resize(n, 0.0);
    output.gradients.resize(n, Vector2::zeros());
    basis.evaluate_with_gradients(xi, &mut output.values, &mut output.gradients);
    for gradient in &mut output.gradients {
        *gradient = geometry.physical_gradient(gradient);
    }
}

use crate::element::{
    outward_normal_from_tangent, reference_edge_point, reference_edge_tangent, LagrangeBasis, VectorBasis,
    VectorBasisValues,
};
use crate::geometry::GeometryPoint;
use crate::quadrature::segment_quadrature;
use nalgebra::{DMatrix, Matrix2, Point2, Vector2};

/// Shifted Legendre polynomials $L_j(t) = P_j(2t - 1)$ for `j = 0 .. values.len()`.
pub fn shifted_legendre(t: f64, values: &mut [f64]) {
    let s = 2.0 * t - 1.0;
    for j in 0..values.len() {
        values[j] = match j {
            0 => 1.0,
            1 => s,
            _ => {
                let n = (j - 1) as f64;
                ((2.0 * n + 1.0) * s * values[j - 1] - n * values[j - 2]) / (n + 1.0)
            }
        };
    }
}

/// Brezzi–Douglas–Marini element of degree `k` on the reference triangle.
///
/// The local degrees of freedom are
///
/// - for each local edge `e` and `j = 0 ..= k`, the normal moment
///   $\int_e (u \cdot n) L_j(t) \\, \mathrm{d}s$ with the outward normal $n$ and the edge parameter $t$
///   running from vertex `e` to vertex `(e + 1) % 3`, with local index `e * (k + 1) + j`,
/// - $(k + 1)(k - 1)$ interior degrees of freedom.
///
/// Basis functions are stored as coefficients with respect to the vector Lagrange basis of
/// degree `k` and mapped to physical elements with the contravariant Piola transform, which
/// preserves normal moments.
#[derive(Debug, Clone, PartialEq)]
pub struct BdmBasis {
    degree: usize,
    lagrange: LagrangeBasis,
    // Column m holds the coefficients of basis function m, row 2 * node + component
    coefficients: DMatrix<f64>,
}

impl BdmBasis {
    pub fn new(degree: usize) -> Self {
        assert!(degree >= 1, "BDM elements require degree at least 1.");
        let k = degree;
        let lagrange = LagrangeBasis::new(k);
        let n = 2 * lagrange.len();
        let num_edge_dofs = 3 * (k + 1);
        let num_interior_dofs = n - num_edge_dofs;

        // Edge functionals applied to the vector Lagrange basis
        let mut functionals = DMatrix::<f64>::zeros(num_edge_dofs, n);
        let quadrature = segment_quadrature(k + 2);
        let mut phi = vec![0.0; lagrange.len()];
        let mut legendre = vec![0.0; k + 1];
        for e in 0..3 {
            // Outward normal scaled by the edge length
            let normal = outward_normal_from_tangent(&reference_edge_tangent(e));
            for (w, t) in quadrature.iter() {
                lagrange.evaluate(&reference_edge_point(e, t), &mut phi);
                shifted_legendre(t, &mut legendre);
                for j in 0..=k {
                    for (i, phi_i) in phi.iter().enumerate() {
                        for c in 0..2 {
                            functionals[(e * (k + 1) + j, 2 * i + c)] += w * phi_i * normal[c] * legendre[j];
                        }
                    }
                }
            }
        }

        // Interior degrees of freedom span the null space of the edge functionals
        let normal_matrix = functionals.transpose() * &functionals;
        let eigen = normal_matrix.symmetric_eigen();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

        let gram = &functionals * functionals.transpose();
        let gram_inverse = gram
            .cholesky()
            .expect("Edge functionals of the BDM element are linearly independent")
            .inverse();
        let edge_basis = functionals.transpose() * gram_inverse;

        let mut coefficients = DMatrix::zeros(n, n);
        coefficients
            .columns_mut(0, num_edge_dofs)
            .copy_from(&edge_basis);
        for (m, &index) in order.iter().take(num_interior_dofs).enumerate() {
            coefficients
                .column_mut(num_edge_dofs + m)
                .copy_from(&eigen.eigenvectors.column(index));
        }

        Self {
            degree,
            lagrange,
            coefficients,
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn num_edge_dofs(&self) -> usize {
        3 * (self.degree + 1)
    }

    pub fn num_interior_dofs(&self) -> usize {
        self.num_local_dofs() - self.num_edge_dofs()
    }

    pub fn edge_dof(&self, local_edge: usize, j: usize) -> usize {
        local_edge * (self.degree + 1) + j
    }

    /// Evaluates the reference basis functions and their reference gradients.
    pub fn evaluate_reference(&self, xi: &Point2<f64>, values: &mut [Vector2<f64>], gradients: &mut [Matrix2<f64>]) {
        let nodes = self.lagrange.len();
        let mut phi = vec![0.0; nodes];
        let mut grad_phi = vec![Vector2::zeros(); nodes];
        self.lagrange
            .evaluate_with_gradients(xi, &mut phi, &mut grad_phi);

        for m in 0..self.num_local_dofs() {
            let coefficients = self.coefficients.column(m);
            let mut value = Vector2::zeros();
            let mut gradient = Matrix2::zeros();
            for i in 0..nodes {
                for c in 0..2 {
                    let a = coefficients[2 * i + c];
                    value[c] += a * phi[i];
                    gradient[(c, 0)] += a * grad_phi[i].x;
                    gradient[(c, 1)] += a * grad_phi[i].y;
                }
            }
            values[m] = value;
            gradients[m] = gradient;
        }
    }
}

impl VectorBasis for BdmBasis {
    fn num_local_dofs(&self) -> usize {
        self.coefficients.ncols()
    }

    fn populate(&self, xi: &Point2<f64>, geometry: &GeometryPoint, output: &mut VectorBasisValues) {
        let n = self.num_local_dofs();
        output.resize(n);
        let mut reference_values = vec![Vector2::zeros(); n];
        let mut reference_gradients = vec![Matrix2::zeros(); n];
        self.evaluate_reference(xi, &mut reference_values, &mut reference_gradients);

        let j = &geometry.jacobian;
        let det = geometry.jacobian_determinant;
        let dj = &geometry.jacobian_derivatives;
        let ddet = [0, 1].map(|b| {
            dj[b][(0, 0)] * j[(1, 1)] + j[(0, 0)] * dj[b][(1, 1)] - dj[b][(0, 1)] * j[(1, 0)] - j[(0, 1)] * dj[b][(1, 0)]
        });

        for m in 0..n {
            let u_ref = &reference_values[m];
            let grad_ref = &reference_gradients[m];
            let u = j * u_ref / det;

            // Derivatives of the Piola-mapped function with respect to reference coordinates
            let mut du = Matrix2::zeros();
            for b in 0..2 {
                let column = (dj[b] * u_ref + j * grad_ref.column(b)) / det - u * (ddet[b] / det);
                du.set_column(b, &column);
            }

            output.values[m] = u;
            output.gradients[m] = du * geometry.jacobian_inverse;
            output.divergences[m] = grad_ref.trace() / det;
        }
    }
}

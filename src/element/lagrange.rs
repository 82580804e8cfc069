use crate::element::BARYCENTRIC_GRADIENTS;
use nalgebra::{Matrix2, Point2, Vector2};

/// Nodal Lagrange basis of arbitrary degree on the reference triangle.
///
/// Basis functions are products of univariate Silvester polynomials in the barycentric
/// coordinates. Nodes are ordered as follows:
///
/// - the three vertices,
/// - for each local edge `e` (from vertex `e` to vertex `(e + 1) % 3`), its `degree - 1`
///   interior nodes, ordered from the start vertex towards the end vertex,
/// - the interior nodes, in lexicographic order of their multi-indices.
///
/// The degree 0 basis consists of a single node in the barycenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LagrangeBasis {
    degree: usize,
    multi_indices: Vec<[usize; 3]>,
}

impl LagrangeBasis {
    pub fn new(degree: usize) -> Self {
        let k = degree;
        if k == 0 {
            return Self {
                degree,
                multi_indices: vec![[0, 0, 0]],
            };
        }

        let mut multi_indices = vec![[k, 0, 0], [0, k, 0], [0, 0, k]];
        for e in 0..3 {
            let (a, b) = (e, (e + 1) % 3);
            for t in 1..k {
                let mut alpha = [0; 3];
                alpha[a] = k - t;
                alpha[b] = t;
                multi_indices.push(alpha);
            }
        }
        for i1 in 1..k {
            for i2 in 1..(k - i1) {
                multi_indices.push([k - i1 - i2, i1, i2]);
            }
        }
        debug_assert_eq!(multi_indices.len(), (k + 1) * (k + 2) / 2);

        Self { degree, multi_indices }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn len(&self) -> usize {
        self.multi_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.multi_indices.is_empty()
    }

    pub fn multi_indices(&self) -> &[[usize; 3]] {
        &self.multi_indices
    }

    /// Number of nodes in the interior of each edge.
    pub fn nodes_per_edge(&self) -> usize {
        self.degree.saturating_sub(1)
    }

    /// Number of nodes in the interior of the triangle.
    pub fn interior_nodes(&self) -> usize {
        if self.degree == 0 {
            1
        } else {
            self.len() - 3 - 3 * self.nodes_per_edge()
        }
    }

    /// Local index of the `t`-th interior node (`1 <= t < degree`) of the given local edge.
    pub fn edge_node(&self, local_edge: usize, t: usize) -> usize {
        debug_assert!(t >= 1 && t < self.degree);
        3 + local_edge * self.nodes_per_edge() + (t - 1)
    }

    /// Local index of the first interior node.
    pub fn first_interior_node(&self) -> usize {
        self.len() - self.interior_nodes()
    }

    pub fn reference_node(&self, node: usize) -> Point2<f64> {
        if self.degree == 0 {
            Point2::new(1.0 / 3.0, 1.0 / 3.0)
        } else {
            let [_, a1, a2] = self.multi_indices[node];
            let k = self.degree as f64;
            Point2::new(a1 as f64 / k, a2 as f64 / k)
        }
    }

    pub fn evaluate(&self, xi: &Point2<f64>, values: &mut [f64]) {
        self.evaluate_impl(xi, values, None, None)
    }

    pub fn evaluate_with_gradients(&self, xi: &Point2<f64>, values: &mut [f64], gradients: &mut [Vector2<f64>]) {
        self.evaluate_impl(xi, values, Some(gradients), None)
    }

    pub fn evaluate_with_hessians(
        &self,
        xi: &Point2<f64>,
        values: &mut [f64],
        gradients: &mut [Vector2<f64>],
        hessians: &mut [Matrix2<f64>],
    ) {
        self.evaluate_impl(xi, values, Some(gradients), Some(hessians))
    }

    fn evaluate_impl(
        &self,
        xi: &Point2<f64>,
        values: &mut [f64],
        mut gradients: Option<&mut [Vector2<f64>]>,
        mut hessians: Option<&mut [Matrix2<f64>]>,
    ) {
        assert_eq!(values.len(), self.len(), "Output buffer must match basis size.");
        let lambda = [1.0 - xi.x - xi.y, xi.x, xi.y];
        let grad_lambda = BARYCENTRIC_GRADIENTS.map(|[a, b]| Vector2::new(a, b));

        for (n, alpha) in self.multi_indices.iter().enumerate() {
            let g = [0, 1, 2].map(|m| silvester(self.degree, alpha[m], lambda[m]));
            values[n] = g[0][0] * g[1][0] * g[2][0];

            if let Some(gradients) = gradients.as_deref_mut() {
                let mut gradient = Vector2::zeros();
                for m in 0..3 {
                    let (p, q) = ((m + 1) % 3, (m + 2) % 3);
                    gradient += grad_lambda[m] * (g[m][1] * g[p][0] * g[q][0]);
                }
                gradients[n] = gradient;
            }

            if let Some(hessians) = hessians.as_deref_mut() {
                let mut hessian = Matrix2::zeros();
                for m in 0..3 {
                    for l in 0..3 {
                        let c = if m == l {
                            let (p, q) = ((m + 1) % 3, (m + 2) % 3);
                            g[m][2] * g[p][0] * g[q][0]
                        } else {
                            let r = 3 - m - l;
                            g[m][1] * g[l][1] * g[r][0]
                        };
                        hessian += grad_lambda[m] * grad_lambda[l].transpose() * c;
                    }
                }
                hessians[n] = hessian;
            }
        }
    }
}

/// Value, first and second derivative of $\prod_{j < a} (k \lambda - j) / (j + 1)$.
fn silvester(k: usize, a: usize, lambda: f64) -> [f64; 3] {
    let (mut v, mut d1, mut d2) = (1.0, 0.0, 0.0);
    for j in 0..a {
        let denominator = j as f64 + 1.0;
        let f = (k as f64 * lambda - j as f64) / denominator;
        let df = k as f64 / denominator;
        d2 = d2 * f + 2.0 * d1 * df;
        d1 = d1 * f + v * df;
        v *= f;
    }
    [v, d1, d2]
}

//! Element maps from the reference triangle to physical elements.
use crate::element::{barycentric_coordinates, LagrangeBasis};
use crate::mesh::{MeshTopology, TriangleMesh2d};
use nalgebra::{Matrix2, Point2, Vector2};
use std::f64::consts::PI;

/// Polynomial degree of curved element maps.
pub const CURVING_DEGREE: usize = 5;
const CURVING_NODES: usize = (CURVING_DEGREE + 1) * (CURVING_DEGREE + 2) / 2;

/// The element map and its derivatives evaluated at a reference point.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryPoint {
    pub point: Point2<f64>,
    pub jacobian: Matrix2<f64>,
    pub jacobian_inverse: Matrix2<f64>,
    pub jacobian_determinant: f64,
    /// Derivatives of the Jacobian with respect to each reference coordinate.
    pub jacobian_derivatives: [Matrix2<f64>; 2],
}

impl GeometryPoint {
    fn from_jacobian(point: Point2<f64>, jacobian: Matrix2<f64>, jacobian_derivatives: [Matrix2<f64>; 2]) -> Self {
        let jacobian_determinant = jacobian.determinant();
        let jacobian_inverse = jacobian.try_inverse().unwrap_or_else(Matrix2::zeros);
        Self {
            point,
            jacobian,
            jacobian_inverse,
            jacobian_determinant,
            jacobian_derivatives,
        }
    }

    /// Transforms a gradient with respect to reference coordinates into a physical gradient.
    pub fn physical_gradient(&self, reference_gradient: &Vector2<f64>) -> Vector2<f64> {
        self.jacobian_inverse.transpose() * reference_gradient
    }

    /// Integration weight corresponding to a reference quadrature weight.
    pub fn physical_weight(&self, reference_weight: f64) -> f64 {
        reference_weight * self.jacobian_determinant.abs()
    }
}

/// Map from the reference triangle to a physical element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementGeometry {
    Affine { vertices: [Point2<f64>; 3] },
    /// Isoparametric map with nodes in the order of the [`LagrangeBasis`] of degree
    /// [`CURVING_DEGREE`].
    Curved { nodes: Vec<Point2<f64>> },
}

impl ElementGeometry {
    pub fn is_curved(&self) -> bool {
        matches!(self, Self::Curved { .. })
    }

    /// Evaluates the element map. `curving_basis` must be the Lagrange basis of degree
    /// [`CURVING_DEGREE`].
    pub fn evaluate(&self, xi: &Point2<f64>, curving_basis: &LagrangeBasis) -> GeometryPoint {
        match self {
            Self::Affine { vertices } => {
                let [a, b, c] = vertices;
                let jacobian = Matrix2::from_columns(&[b - a, c - a]);
                let point = a + jacobian * xi.coords;
                GeometryPoint::from_jacobian(point, jacobian, [Matrix2::zeros(); 2])
            }
            Self::Curved { nodes } => {
                debug_assert_eq!(curving_basis.degree(), CURVING_DEGREE);
                let mut values = [0.0; CURVING_NODES];
                let mut gradients = [Vector2::zeros(); CURVING_NODES];
                let mut hessians = [Matrix2::zeros(); CURVING_NODES];
                curving_basis.evaluate_with_hessians(xi, &mut values, &mut gradients, &mut hessians);

                let mut point = Vector2::zeros();
                let mut jacobian = Matrix2::zeros();
                let mut jacobian_derivatives = [Matrix2::zeros(); 2];
                for (x, phi, grad, hessian) in itertools::izip!(nodes, &values, &gradients, &hessians) {
                    point += x.coords * *phi;
                    jacobian += x.coords * grad.transpose();
                    for (b, derivative) in jacobian_derivatives.iter_mut().enumerate() {
                        *derivative += x.coords * hessian.column(b).transpose();
                    }
                }
                GeometryPoint::from_jacobian(Point2::from(point), jacobian, jacobian_derivatives)
            }
        }
    }

    /// Maps a reference point to physical coordinates.
    pub fn map(&self, xi: &Point2<f64>, curving_basis: &LagrangeBasis) -> Point2<f64> {
        match self {
            Self::Affine { vertices } => {
                let [a, b, c] = vertices;
                a + (b - a) * xi.x + (c - a) * xi.y
            }
            Self::Curved { .. } => self.evaluate(xi, curving_basis).point,
        }
    }
}

/// Polar angle of a point in `[-pi, pi]`.
fn angle(x: &Point2<f64>) -> f64 {
    x.y.atan2(x.x)
}

/// Projects a point radially onto the circle of the given radius around the origin.
pub fn project_to_circle(x: &Point2<f64>, radius: f64) -> Point2<f64> {
    let norm = x.coords.norm();
    if norm > 0.0 {
        Point2::from(x.coords * (radius / norm))
    } else {
        *x
    }
}

/// Constructs element maps in which boundary edges follow the circle of the given radius around
/// the origin.
///
/// For each boundary edge of an element, the difference between the circular arc and the
/// straight edge is blended into the element with the edge bubble $\lambda_i \lambda_j$, vanishing
/// at the vertices and at all other edges. The resulting map is interpolated by a polynomial of degree [`CURVING_DEGREE`].
/// Elements without boundary edges keep their affine map.
pub fn curve_to_circle(mesh: &TriangleMesh2d, topology: &MeshTopology, radius: f64) -> Vec<ElementGeometry> {
    let curving_basis = LagrangeBasis::new(CURVING_DEGREE);
    let reference_nodes: Vec<_> = (0..curving_basis.len())
        .map(|n| curving_basis.reference_node(n))
        .collect();

    (0..mesh.num_elements())
        .map(|element| {
            let vertices = mesh.element_vertices(element);
            let boundary_edges: Vec<usize> = (0..3)
                .filter(|&e| topology.is_boundary_edge(topology.element_edges()[element][e]))
                .collect();
            if boundary_edges.is_empty() {
                return ElementGeometry::Affine { vertices };
            }

            let nodes = reference_nodes
                .iter()
                .map(|xi| {
                    let lambda = barycentric_coordinates(xi);
                    let [a, b, c] = &vertices;
                    let mut x = a + (b - a) * xi.x + (c - a) * xi.y;
                    for &e in &boundary_edges {
                        let (i, j) = (e, (e + 1) % 3);
                        let edge_bubble = lambda[i] * lambda[j];
                        if edge_bubble <= 0.0 {
                            continue;
                        }
                        let t = lambda[j] / (lambda[i] + lambda[j]);
                        let (start, end) = (vertices[i], vertices[j]);
                        let chord = start + (end - start) * t;
                        let theta_start = angle(&start);
                        let mut delta = angle(&end) - theta_start;
                        if delta > PI {
                            delta -= 2.0 * PI;
                        } else if delta < -PI {
                            delta += 2.0 * PI;
                        }
                        let theta = theta_start + t * delta;
                        let arc = Point2::new(radius * theta.cos(), radius * theta.sin());
                        // The deviation vanishes like t (1 - t) at the edge ends, so the quotient is smooth
                        x += (arc - chord) * (edge_bubble / (t * (1.0 - t)));
                    }
                    x
                })
                .collect();
            ElementGeometry::Curved { nodes }
        })
        .collect()
}

//! Quadrature rules on the reference triangle and on the unit interval.
//!
//! The reference triangle used throughout the crate is the unit triangle with vertices
//! $(0, 0)$, $(1, 0)$ and $(0, 1)$. The rules of `fenris-quadrature` are defined on the
//! triangle with vertices $(-1, -1)$, $(1, -1)$, $(-1, 1)$ and are transformed accordingly.
use fenris_quadrature::{polyquad, univariate};
use nalgebra::Point2;

pub use fenris_quadrature::Error as QuadratureError;

/// Quadrature rule on the reference triangle.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleQuadrature {
    weights: Vec<f64>,
    points: Vec<Point2<f64>>,
}

impl TriangleQuadrature {
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &Point2<f64>)> {
        self.weights.iter().copied().zip(&self.points)
    }
}

/// Quadrature rule on the unit interval $[0, 1]$.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentQuadrature {
    weights: Vec<f64>,
    points: Vec<f64>,
}

impl SegmentQuadrature {
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.weights.iter().copied().zip(self.points.iter().copied())
    }
}

/// Returns a rule on the reference triangle that integrates polynomials of total degree
/// `strength` exactly.
///
/// Uses the `polyquad` rules where available and falls back to [`collapsed_gauss_triangle`]
/// otherwise.
pub fn triangle_quadrature(strength: usize) -> TriangleQuadrature {
    match polyquad::triangle(strength) {
        Ok((weights, points)) => TriangleQuadrature {
            weights: weights.into_iter().map(|w| w / 4.0).collect(),
            points: points
                .into_iter()
                .map(|[x, y]| Point2::new((x + 1.0) / 2.0, (y + 1.0) / 2.0))
                .collect(),
        },
        Err(_) => collapsed_gauss_triangle((strength + 1) / 2),
    }
}

/// A tensor Gauss rule on the square collapsed onto the reference triangle.
///
/// The rule is exact for polynomials of total degree `2 * degree_half`. It uses
/// `degree_half + 1` points in each direction.
pub fn collapsed_gauss_triangle(degree_half: usize) -> TriangleQuadrature {
    // The collapse adds one degree in the collapsed direction
    let gauss = segment_quadrature(degree_half + 1);
    let mut weights = Vec::with_capacity(gauss.len() * gauss.len());
    let mut points = Vec::with_capacity(gauss.len() * gauss.len());
    for (w_a, a) in gauss.iter() {
        for (w_b, b) in gauss.iter() {
            points.push(Point2::new(a * (1.0 - b), b));
            weights.push(w_a * w_b * (1.0 - b));
        }
    }
    TriangleQuadrature { weights, points }
}

/// Gauss–Legendre rule with the given number of points on $[0, 1]$.
pub fn segment_quadrature(num_points: usize) -> SegmentQuadrature {
    let (weights, points) = univariate::gauss(num_points);
    SegmentQuadrature {
        weights: weights.into_iter().map(|w| w / 2.0).collect(),
        points: points.into_iter().map(|[x]| (x + 1.0) / 2.0).collect(),
    }
}

/// Gauss–Legendre rule on $[0, 1]$ that integrates polynomials of degree `strength` exactly.
pub fn segment_quadrature_with_strength(strength: usize) -> SegmentQuadrature {
    segment_quadrature(strength / 2 + 1)
}

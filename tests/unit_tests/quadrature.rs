use festokes::quadrature::{
    collapsed_gauss_triangle, segment_quadrature, segment_quadrature_with_strength, triangle_quadrature,
    TriangleQuadrature,
};
use matrixcompare::assert_scalar_eq;

fn factorial(n: usize) -> f64 {
    (1..=n).map(|i| i as f64).product()
}

/// Exact integral of x^a y^b over the reference triangle.
fn monomial_integral(a: usize, b: usize) -> f64 {
    factorial(a) * factorial(b) / factorial(a + b + 2)
}

fn assert_exact_for_degree(quadrature: &TriangleQuadrature, degree: usize) {
    for a in 0..=degree {
        for b in 0..=(degree - a) {
            let approx: f64 = quadrature
                .iter()
                .map(|(w, p)| w * p.x.powi(a as i32) * p.y.powi(b as i32))
                .sum();
            assert_scalar_eq!(approx, monomial_integral(a, b), comp = abs, tol = 1e-13);
        }
    }
}

#[test]
fn triangle_quadrature_integrates_monomials_exactly() {
    for strength in 0..=20 {
        let quadrature = triangle_quadrature(strength);
        assert!(!quadrature.is_empty());
        assert_eq!(quadrature.weights().len(), quadrature.points().len());
        assert_exact_for_degree(&quadrature, strength);
    }
}

#[test]
fn triangle_quadrature_points_lie_in_reference_triangle() {
    for strength in [1, 4, 10, 14] {
        for (_, p) in triangle_quadrature(strength).iter() {
            assert!(p.x >= -1e-14 && p.y >= -1e-14 && p.x + p.y <= 1.0 + 1e-14);
        }
    }
}

#[test]
fn collapsed_gauss_rule_is_exact_beyond_polyquad_range() {
    for degree_half in [1, 3, 6, 12] {
        let quadrature = collapsed_gauss_triangle(degree_half);
        assert_eq!(quadrature.len(), (degree_half + 1) * (degree_half + 1));
        assert_exact_for_degree(&quadrature, (2 * degree_half).min(20));
    }
}

#[test]
fn segment_quadrature_integrates_monomials_exactly() {
    for num_points in 1..=8 {
        let quadrature = segment_quadrature(num_points);
        assert_eq!(quadrature.len(), num_points);
        for m in 0..(2 * num_points) {
            let approx: f64 = quadrature.iter().map(|(w, t)| w * t.powi(m as i32)).sum();
            assert_scalar_eq!(approx, 1.0 / (m as f64 + 1.0), comp = abs, tol = 1e-14);
        }
        assert!(quadrature.points().iter().all(|&t| t > 0.0 && t < 1.0));
    }
}

#[test]
fn segment_quadrature_with_strength_uses_minimal_points() {
    assert_eq!(segment_quadrature_with_strength(0).len(), 1);
    assert_eq!(segment_quadrature_with_strength(1).len(), 1);
    assert_eq!(segment_quadrature_with_strength(2).len(), 2);
    assert_eq!(segment_quadrature_with_strength(9).len(), 5);
}

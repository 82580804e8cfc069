//! Error norms of a discrete solution against the exact solution.
use crate::exact::ExactSolution;
use crate::solver::DiscreteSolution;
use serde::{Deserialize, Serialize};

/// Errors of one refinement level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelErrors {
    /// $\norm{u_h - u}_{L^2}$.
    pub velocity_l2: f64,
    /// $\norm{\nabla u_h - \nabla u}_{L^2}$, evaluated elementwise.
    pub velocity_h1_seminorm: f64,
    /// $\norm{\mathrm{div}\, u_h}_{L^2}$, evaluated elementwise.
    pub divergence_l2: f64,
    /// $\norm{p_h - p}_{L^2}$.
    pub pressure_l2: f64,
}

/// Computes the error norms of a discrete solution.
///
/// The pressure is compared as given, so the pressure offset should already have been removed.
pub fn compute_errors(solution: &DiscreteSolution, exact: &ExactSolution) -> LevelErrors {
    let level = solution.level();
    let strength = solution.space().quadrature_strength() + 2;
    let [velocity, gradient, divergence, pressure] = level.integrate(strength, |element, xi, geometry| {
        let x = &geometry.point;
        let values = solution.evaluate(element, xi, geometry);
        [
            (values.velocity - exact.velocity(x)).norm_squared(),
            (values.velocity_gradient - exact.velocity_gradient(x)).norm_squared(),
            values.divergence * values.divergence,
            (values.pressure - exact.pressure(x)).powi(2),
        ]
    });
    LevelErrors {
        velocity_l2: velocity.sqrt(),
        velocity_h1_seminorm: gradient.sqrt(),
        divergence_l2: divergence.sqrt(),
        pressure_l2: pressure.sqrt(),
    }
}

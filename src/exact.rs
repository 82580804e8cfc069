//! Manufactured solutions of the Stokes equations with unit viscosity.
use nalgebra::{Matrix2, Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Closed-form velocity and pressure fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManufacturedFlow {
    /// $u = (\sin \pi x \cos \pi y, -\cos \pi x \sin \pi y)$ and $p = \sin \pi x \cos \pi y$.
    Trigonometric,
    /// $u = \cos(\pi r / 2) (y, -x)$ with $r = |x|$ and the trigonometric pressure.
    Vortex,
}

/// The velocity prescribed on the boundary of the domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryData {
    /// The trace of the exact velocity.
    Exact,
    /// Zero velocity, regardless of the exact velocity.
    NoSlip,
}

/// A manufactured flow together with the boundary data applied in the discrete problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactSolution {
    flow: ManufacturedFlow,
    boundary_data: BoundaryData,
}

/// The radial profile `f(r) = cos(pi r / 2)` of the vortex with `f'(r) / r` and `f''(r)`.
fn vortex_profile(r: f64) -> (f64, f64, f64) {
    let a = 0.5 * PI;
    let f = (a * r).cos();
    let df_over_r = if r > 1e-12 {
        -a * (a * r).sin() / r
    } else {
        -a * a
    };
    let d2f = -a * a * f;
    (f, df_over_r, d2f)
}

impl ExactSolution {
    pub fn new(flow: ManufacturedFlow, boundary_data: BoundaryData) -> Self {
        Self { flow, boundary_data }
    }

    pub fn flow(&self) -> ManufacturedFlow {
        self.flow
    }

    pub fn boundary_data(&self) -> BoundaryData {
        self.boundary_data
    }

    pub fn velocity(&self, x: &Point2<f64>) -> Vector2<f64> {
        match self.flow {
            ManufacturedFlow::Trigonometric => {
                let (sx, cx) = (PI * x.x).sin_cos();
                let (sy, cy) = (PI * x.y).sin_cos();
                Vector2::new(sx * cy, -cx * sy)
            }
            ManufacturedFlow::Vortex => {
                let (f, _, _) = vortex_profile(x.coords.norm());
                Vector2::new(f * x.y, -f * x.x)
            }
        }
    }

    /// Gradient of the velocity, with rows corresponding to components.
    pub fn velocity_gradient(&self, x: &Point2<f64>) -> Matrix2<f64> {
        match self.flow {
            ManufacturedFlow::Trigonometric => {
                let (sx, cx) = (PI * x.x).sin_cos();
                let (sy, cy) = (PI * x.y).sin_cos();
                Matrix2::new(PI * cx * cy, -PI * sx * sy, PI * sx * sy, -PI * cx * cy)
            }
            ManufacturedFlow::Vortex => {
                let (f, g, _) = vortex_profile(x.coords.norm());
                let (x, y) = (x.x, x.y);
                Matrix2::new(g * x * y, f + g * y * y, -f - g * x * x, -g * x * y)
            }
        }
    }

    /// The negative vector Laplacian $-\Delta u$ of the velocity.
    pub fn negative_laplacian(&self, x: &Point2<f64>) -> Vector2<f64> {
        match self.flow {
            ManufacturedFlow::Trigonometric => self.velocity(x) * (2.0 * PI * PI),
            ManufacturedFlow::Vortex => {
                // The Laplacian of f(r) y is (f'' + 3 f' / r) y
                let (_, g, d2f) = vortex_profile(x.coords.norm());
                Vector2::new(x.y, -x.x) * -(d2f + 3.0 * g)
            }
        }
    }

    pub fn pressure(&self, x: &Point2<f64>) -> f64 {
        (PI * x.x).sin() * (PI * x.y).cos()
    }

    pub fn pressure_gradient(&self, x: &Point2<f64>) -> Vector2<f64> {
        let (sx, cx) = (PI * x.x).sin_cos();
        let (sy, cy) = (PI * x.y).sin_cos();
        Vector2::new(PI * cx * cy, -PI * sx * sy)
    }

    /// The right-hand side $f = -\Delta u + \nabla p$ of the momentum equation.
    pub fn body_force(&self, x: &Point2<f64>) -> Vector2<f64> {
        self.negative_laplacian(x) + self.pressure_gradient(x)
    }

    /// The velocity imposed on the boundary in the discrete problem.
    pub fn boundary_velocity(&self, x: &Point2<f64>) -> Vector2<f64> {
        match self.boundary_data {
            BoundaryData::Exact => self.velocity(x),
            BoundaryData::NoSlip => Vector2::zeros(),
        }
    }
}

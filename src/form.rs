//! Bilinear and linear forms of the discrete Stokes problem.
//!
//! Forms are lists of typed terms. Each term knows how to accumulate its contribution at a
//! single quadrature point into a local matrix or vector, whose rows correspond to test
//! functions and whose columns correspond to trial functions.
//!
//! Face terms use the outward normal `n` of the element owning the face, the jump
//! `[v] = v_owner - v_neighbor` and the average `{v} = (v_owner + v_neighbor) / 2`. On boundary
//! faces, jumps and averages reduce to the trace of the owner.
use crate::config::{Extra, Extras};
use crate::exact::ExactSolution;
use crate::space::{LocalBasisValues, SpacePair};
use nalgebra::{DMatrix, DVector, Point2, Vector2};
use std::error::Error;
use std::fmt;

/// Coefficient of the pressure mass term that removes the constant pressure mode.
pub const PRESSURE_REGULARIZATION: f64 = 1e-8;
/// Coefficient of the interior penalty, scaled by `(k + 1)^2 / h_F`.
pub const PENALTY_COEFFICIENT: f64 = 20.0;
pub const GRAD_DIV_COEFFICIENT: f64 = 1e3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeTerm {
    /// $(\nabla u, \nabla v)$
    Viscous,
    /// $-(\operatorname{div} v, p) - (\operatorname{div} u, q)$
    PressureCoupling,
    /// $-\epsilon (p, q)$
    PressureRegularization { epsilon: f64 },
    /// $c (\operatorname{div} u, \operatorname{div} v)$
    GradDiv { coefficient: f64 },
    /// $-h_T^2 (\nabla p, \nabla q)$
    BrezziPitkaranta,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkeletonTerm {
    /// Symmetric interior penalty terms for velocity and the consistent pressure coupling.
    InteriorPenalty { penalty: f64 },
    /// $c [u \cdot n][v \cdot n]$
    NormalJump { coefficient: f64 },
    /// $-h_F [p][q]$
    PressureJump,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryTerm {
    /// Interior penalty terms with the boundary data in place of the neighbor trace.
    InteriorPenalty { penalty: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadTerm {
    /// $(f, v)$ with the manufactured body force $f = -\Delta u + \nabla p$.
    BodyForce,
    /// Boundary data terms $-\nabla v n \cdot g + q n \cdot g + \sigma g \cdot v$ matching
    /// [`BoundaryTerm::InteriorPenalty`].
    BoundaryPenalty { penalty: f64 },
}

/// Traces of the local basis functions of one or two elements at a face quadrature point.
///
/// Functions are indexed by the local layout of the owner, followed by that of the neighbor.
#[derive(Debug, Clone, Default)]
pub struct FaceTraces {
    pub jump: Vec<Vector2<f64>>,
    /// Average of the normal derivative $\{\nabla u\} n$.
    pub average_normal_gradient: Vec<Vector2<f64>>,
    pub pressure_jump: Vec<f64>,
    pub pressure_average: Vec<f64>,
}

impl FaceTraces {
    fn clear(&mut self) {
        self.jump.clear();
        self.average_normal_gradient.clear();
        self.pressure_jump.clear();
        self.pressure_average.clear();
    }

    fn push_side(&mut self, values: &LocalBasisValues, normal: &Vector2<f64>, sign: f64, average_weight: f64) {
        let velocity = &values.velocity;
        for (value, gradient) in velocity.values.iter().zip(&velocity.gradients) {
            self.jump.push(value * sign);
            self.average_normal_gradient.push(gradient * normal * average_weight);
            self.pressure_jump.push(0.0);
            self.pressure_average.push(0.0);
        }
        for &value in &values.pressure.values {
            self.jump.push(Vector2::zeros());
            self.average_normal_gradient.push(Vector2::zeros());
            self.pressure_jump.push(sign * value);
            self.pressure_average.push(average_weight * value);
        }
    }

    /// Traces across an interior face.
    pub fn populate_interior(
        &mut self,
        owner: &LocalBasisValues,
        neighbor: &LocalBasisValues,
        normal: &Vector2<f64>,
    ) {
        self.clear();
        self.push_side(owner, normal, 1.0, 0.5);
        self.push_side(neighbor, normal, -1.0, 0.5);
    }

    /// Traces on a boundary face.
    pub fn populate_boundary(&mut self, owner: &LocalBasisValues, normal: &Vector2<f64>) {
        self.clear();
        self.push_side(owner, normal, 1.0, 1.0);
    }

    pub fn len(&self) -> usize {
        self.jump.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jump.is_empty()
    }
}

impl VolumeTerm {
    pub fn accumulate(&self, values: &LocalBasisValues, element_diameter: f64, weight: f64, matrix: &mut DMatrix<f64>) {
        let nu = values.num_velocity();
        let np = values.num_pressure();
        let velocity = &values.velocity;
        let pressure = &values.pressure;
        match *self {
            Self::Viscous => {
                for i in 0..nu {
                    for j in 0..nu {
                        matrix[(i, j)] += weight * velocity.gradients[i].dot(&velocity.gradients[j]);
                    }
                }
            }
            Self::PressureCoupling => {
                for i in 0..nu {
                    for m in 0..np {
                        let a = -weight * velocity.divergences[i] * pressure.values[m];
                        matrix[(i, nu + m)] += a;
                        matrix[(nu + m, i)] += a;
                    }
                }
            }
            Self::PressureRegularization { epsilon } => {
                for m in 0..np {
                    for l in 0..np {
                        matrix[(nu + m, nu + l)] -= weight * epsilon * pressure.values[m] * pressure.values[l];
                    }
                }
            }
            Self::GradDiv { coefficient } => {
                for i in 0..nu {
                    for j in 0..nu {
                        matrix[(i, j)] += weight * coefficient * velocity.divergences[i] * velocity.divergences[j];
                    }
                }
            }
            Self::BrezziPitkaranta => {
                let h2 = element_diameter * element_diameter;
                for m in 0..np {
                    for l in 0..np {
                        matrix[(nu + m, nu + l)] -= weight * h2 * pressure.gradients[m].dot(&pressure.gradients[l]);
                    }
                }
            }
        }
    }
}

fn accumulate_interior_penalty(
    traces: &FaceTraces,
    normal: &Vector2<f64>,
    penalty: f64,
    weight: f64,
    matrix: &mut DMatrix<f64>,
) {
    let n = traces.len();
    for i in 0..n {
        let jump_i = &traces.jump[i];
        let grad_i = &traces.average_normal_gradient[i];
        let p_i = traces.pressure_average[i];
        for j in 0..n {
            let jump_j = &traces.jump[j];
            let grad_j = &traces.average_normal_gradient[j];
            let p_j = traces.pressure_average[j];
            let a = -grad_j.dot(jump_i) - grad_i.dot(jump_j)
                + p_j * jump_i.dot(normal)
                + p_i * jump_j.dot(normal)
                + penalty * jump_i.dot(jump_j);
            matrix[(i, j)] += weight * a;
        }
    }
}

impl SkeletonTerm {
    pub fn accumulate(
        &self,
        traces: &FaceTraces,
        normal: &Vector2<f64>,
        face_length: f64,
        weight: f64,
        matrix: &mut DMatrix<f64>,
    ) {
        let n = traces.len();
        match *self {
            Self::InteriorPenalty { penalty } => {
                accumulate_interior_penalty(traces, normal, penalty / face_length, weight, matrix)
            }
            Self::NormalJump { coefficient } => {
                for i in 0..n {
                    let jump_i = traces.jump[i].dot(normal);
                    for j in 0..n {
                        matrix[(i, j)] += weight * coefficient * jump_i * traces.jump[j].dot(normal);
                    }
                }
            }
            Self::PressureJump => {
                for i in 0..n {
                    for j in 0..n {
                        matrix[(i, j)] -= weight * face_length * traces.pressure_jump[i] * traces.pressure_jump[j];
                    }
                }
            }
        }
    }
}

impl BoundaryTerm {
    pub fn accumulate(
        &self,
        traces: &FaceTraces,
        normal: &Vector2<f64>,
        face_length: f64,
        weight: f64,
        matrix: &mut DMatrix<f64>,
    ) {
        match *self {
            Self::InteriorPenalty { penalty } => {
                accumulate_interior_penalty(traces, normal, penalty / face_length, weight, matrix)
            }
        }
    }
}

impl LoadTerm {
    pub fn is_boundary_term(&self) -> bool {
        matches!(self, Self::BoundaryPenalty { .. })
    }

    /// Accumulates the contribution of a volume term at a point of the element.
    pub fn accumulate_volume(
        &self,
        values: &LocalBasisValues,
        exact: &ExactSolution,
        point: &Point2<f64>,
        weight: f64,
        vector: &mut DVector<f64>,
    ) {
        if let Self::BodyForce = self {
            let force = exact.body_force(point);
            for (i, value) in values.velocity.values.iter().enumerate() {
                vector[i] += weight * force.dot(value);
            }
        }
    }

    /// Accumulates the contribution of a boundary term at a point of a boundary face.
    #[allow(clippy::too_many_arguments)]
    pub fn accumulate_boundary(
        &self,
        traces: &FaceTraces,
        exact: &ExactSolution,
        point: &Point2<f64>,
        normal: &Vector2<f64>,
        face_length: f64,
        weight: f64,
        vector: &mut DVector<f64>,
    ) {
        if let Self::BoundaryPenalty { penalty } = *self {
            let g = exact.boundary_velocity(point);
            let sigma = penalty / face_length;
            for i in 0..traces.len() {
                let a = -traces.average_normal_gradient[i].dot(&g)
                    + traces.pressure_average[i] * normal.dot(&g)
                    + sigma * g.dot(&traces.jump[i]);
                vector[i] += weight * a;
            }
        }
    }
}

/// The bilinear form of the discrete Stokes problem.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BilinearForm {
    pub volume: Vec<VolumeTerm>,
    pub skeleton: Vec<SkeletonTerm>,
    pub boundary: Vec<BoundaryTerm>,
}

/// The linear form of the discrete Stokes problem.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearForm {
    pub terms: Vec<LoadTerm>,
    pub exact: ExactSolution,
}

impl LinearForm {
    pub fn volume_terms(&self) -> impl Iterator<Item = &LoadTerm> {
        self.terms.iter().filter(|term| !term.is_boundary_term())
    }

    pub fn boundary_terms(&self) -> impl Iterator<Item = &LoadTerm> {
        self.terms.iter().filter(|term| term.is_boundary_term())
    }
}

/// A combination of forms and spaces that cannot be discretized.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DiscretizationError {
    /// Face terms were requested on a space without jump and average operators.
    MissingDgJumps,
}

impl fmt::Display for DiscretizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDgJumps => write!(f, "face terms require a space with DG jumps enabled"),
        }
    }
}

impl Error for DiscretizationError {}

/// Builds the forms for a space pair and a set of extras.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormAssembler;

impl FormAssembler {
    pub fn assemble(
        &self,
        space: &SpacePair,
        exact: &ExactSolution,
        extras: &Extras,
    ) -> Result<(BilinearForm, LinearForm), DiscretizationError> {
        let mut bilinear = BilinearForm {
            volume: vec![
                VolumeTerm::Viscous,
                VolumeTerm::PressureCoupling,
                VolumeTerm::PressureRegularization {
                    epsilon: PRESSURE_REGULARIZATION,
                },
            ],
            ..Default::default()
        };
        let mut linear = LinearForm {
            terms: vec![LoadTerm::BodyForce],
            exact: *exact,
        };

        let order = space.velocity_order() as f64;
        let penalty = PENALTY_COEFFICIENT * (order + 1.0) * (order + 1.0);
        for extra in extras.iter() {
            match extra {
                Extra::InteriorPenalty => {
                    bilinear
                        .skeleton
                        .push(SkeletonTerm::InteriorPenalty { penalty });
                    bilinear
                        .boundary
                        .push(BoundaryTerm::InteriorPenalty { penalty });
                    linear.terms.push(LoadTerm::BoundaryPenalty { penalty });
                }
                Extra::GradDiv => {
                    bilinear.volume.push(VolumeTerm::GradDiv {
                        coefficient: GRAD_DIV_COEFFICIENT,
                    });
                    bilinear.skeleton.push(SkeletonTerm::NormalJump {
                        coefficient: GRAD_DIV_COEFFICIENT,
                    });
                }
                Extra::BrezziPitkaranta => bilinear.volume.push(VolumeTerm::BrezziPitkaranta),
                Extra::PressureJump => bilinear.skeleton.push(SkeletonTerm::PressureJump),
                Extra::PowellSabinSplit | Extra::AlfeldSplit | Extra::P3Bubble => {}
            }
        }

        if !bilinear.skeleton.is_empty() && !space.has_dg_jumps() {
            return Err(DiscretizationError::MissingDgJumps);
        }
        Ok((bilinear, linear))
    }
}

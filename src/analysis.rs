//! Convergence studies over sequences of uniformly refined meshes.
use crate::config::{Configuration, Discretization, MissingSelection};
use crate::error::{compute_errors, LevelErrors};
use crate::form::{DiscretizationError, FormAssembler};
use crate::mesh::builder::MeshBuilder;
use crate::mesh::TriangleMesh2d;
use crate::score::{score, ScoreBreakdown};
use crate::solver::StokesSolver;
use crate::space::SpacePairBuilder;
use log::{debug, info, warn};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

pub const DEFAULT_NUM_REFINEMENTS: usize = 4;
/// Slack allowed when comparing observed and expected convergence orders.
pub const TOLERANCE_BAND: f64 = 0.25;
pub const OPTIMAL_POINTS: u32 = 2;

/// Error norms of each refinement level, ordered by level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorSeries {
    velocity_l2: Vec<f64>,
    velocity_h1_seminorm: Vec<f64>,
    divergence_l2: Vec<f64>,
    pressure_l2: Vec<f64>,
}

impl ErrorSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, errors: LevelErrors) {
        self.velocity_l2.push(errors.velocity_l2);
        self.velocity_h1_seminorm.push(errors.velocity_h1_seminorm);
        self.divergence_l2.push(errors.divergence_l2);
        self.pressure_l2.push(errors.pressure_l2);
    }

    pub fn len(&self) -> usize {
        self.velocity_l2.len()
    }

    pub fn is_empty(&self) -> bool {
        self.velocity_l2.is_empty()
    }

    pub fn level(&self, level: usize) -> Option<LevelErrors> {
        (level < self.len()).then(|| LevelErrors {
            velocity_l2: self.velocity_l2[level],
            velocity_h1_seminorm: self.velocity_h1_seminorm[level],
            divergence_l2: self.divergence_l2[level],
            pressure_l2: self.pressure_l2[level],
        })
    }

    pub fn last(&self) -> Option<LevelErrors> {
        self.len().checked_sub(1).and_then(|level| self.level(level))
    }

    pub fn velocity_l2(&self) -> &[f64] {
        &self.velocity_l2
    }

    pub fn velocity_h1_seminorm(&self) -> &[f64] {
        &self.velocity_h1_seminorm
    }

    pub fn divergence_l2(&self) -> &[f64] {
        &self.divergence_l2
    }

    pub fn pressure_l2(&self) -> &[f64] {
        &self.pressure_l2
    }
}

impl FromIterator<LevelErrors> for ErrorSeries {
    fn from_iter<I: IntoIterator<Item = LevelErrors>>(iter: I) -> Self {
        let mut series = Self::new();
        iter.into_iter().for_each(|errors| series.push(errors));
        series
    }
}

/// Experimental order of convergence between the last two entries of an error series,
/// assuming that the mesh size is halved between levels.
///
/// Returns `None` for fewer than two entries.
pub fn compute_eoc(errors: &[f64]) -> Option<f64> {
    match errors {
        [.., previous, last] => Some((last / previous).ln() / 0.5f64.ln()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceVerdict {
    pub eoc_velocity_h1: Option<f64>,
    pub eoc_pressure_l2: Option<f64>,
    pub is_stable: bool,
    pub is_convergent: bool,
    pub is_optimal: bool,
    pub points: u32,
}

/// Classifies a complete error series.
///
/// The velocity is optimal if its $H^1$ seminorm EOC is within the tolerance band of
/// `velocity_order`, and the pressure is optimal if its $L^2$ EOC is within the band of
/// `pressure_order + 1`. Both EOCs must exceed the band for convergence. Stability only looks at
/// the magnitude of the errors on the final level.
pub fn classify(series: &ErrorSeries, velocity_order: usize, pressure_order: usize) -> ConvergenceVerdict {
    let eoc_velocity_h1 = compute_eoc(series.velocity_h1_seminorm());
    let eoc_pressure_l2 = compute_eoc(series.pressure_l2());

    let (is_convergent, is_optimal) = match (eoc_velocity_h1, eoc_pressure_l2) {
        (Some(eoc_v), Some(eoc_p)) => {
            let velocity_optimal = eoc_v - velocity_order as f64 > -TOLERANCE_BAND;
            let pressure_optimal = eoc_p - (pressure_order + 1) as f64 > -TOLERANCE_BAND;
            (
                eoc_v > TOLERANCE_BAND && eoc_p > TOLERANCE_BAND,
                velocity_optimal && pressure_optimal,
            )
        }
        _ => (false, false),
    };
    let is_stable = series
        .last()
        .map(|errors| errors.pressure_l2 < 1.0 && errors.velocity_l2 < 1.0)
        .unwrap_or(false);

    ConvergenceVerdict {
        eoc_velocity_h1,
        eoc_pressure_l2,
        is_stable,
        is_convergent,
        is_optimal,
        points: if is_optimal { OPTIMAL_POINTS } else { 0 },
    }
}

/// Fields of the finest level, sampled at the mesh vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalFields {
    pub mesh: TriangleMesh2d,
    pub velocity: Vec<Vector2<f64>>,
    pub pressure: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationReport {
    pub discretization: Discretization,
    pub errors: ErrorSeries,
    pub verdict: ConvergenceVerdict,
    pub final_fields: FinalFields,
    pub score: ScoreBreakdown,
}

#[derive(Debug)]
#[non_exhaustive]
pub enum CalculationError {
    /// A required selection is missing.
    ConfigurationIncomplete(MissingSelection),
    /// The selections cannot be combined into a discretization.
    Discretization(DiscretizationError),
    /// Assembly or solution of the discrete system failed.
    Solver(eyre::Report),
}

impl fmt::Display for CalculationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigurationIncomplete(missing) => write!(f, "incomplete configuration: {missing}"),
            Self::Discretization(err) => write!(f, "invalid discretization: {err}"),
            Self::Solver(report) => write!(f, "{report:#}"),
        }
    }
}

impl Error for CalculationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ConfigurationIncomplete(missing) => Some(missing),
            Self::Discretization(err) => Some(err),
            Self::Solver(report) => Some(report.as_ref()),
        }
    }
}

impl From<MissingSelection> for CalculationError {
    fn from(missing: MissingSelection) -> Self {
        Self::ConfigurationIncomplete(missing)
    }
}

impl From<DiscretizationError> for CalculationError {
    fn from(err: DiscretizationError) -> Self {
        Self::Discretization(err)
    }
}

/// Solves the Stokes benchmark of a discretization on a sequence of refinement levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergenceAnalyzer {
    num_refinements: usize,
}

impl Default for ConvergenceAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_REFINEMENTS)
    }
}

impl ConvergenceAnalyzer {
    /// # Panics
    ///
    /// Panics if `num_refinements` is zero.
    pub fn new(num_refinements: usize) -> Self {
        assert!(num_refinements > 0, "At least one refinement level is required");
        Self { num_refinements }
    }

    pub fn num_refinements(&self) -> usize {
        self.num_refinements
    }

    pub fn run_configuration(&self, configuration: &Configuration) -> Result<CalculationReport, CalculationError> {
        self.run(&configuration.discretization()?)
    }

    /// Runs all refinement levels in order.
    ///
    /// The run is all-or-nothing: any failure discards the errors of the levels already computed.
    pub fn run(&self, discretization: &Discretization) -> Result<CalculationReport, CalculationError> {
        info!(
            "Running {} / {} on {} with extras {:?} over {} levels",
            discretization.velocity,
            discretization.pressure,
            discretization.mesh_family,
            discretization.extras,
            self.num_refinements
        );

        let mut errors = ErrorSeries::new();
        let mut final_fields = None;
        let mut orders = (0, 0);
        for level in 0..self.num_refinements {
            let (mesh_level, exact) = MeshBuilder.build(discretization, level);
            let space = SpacePairBuilder.build(&mesh_level, discretization);
            let (bilinear, linear) = FormAssembler.assemble(&space, &exact, &discretization.extras)?;
            let solution = StokesSolver
                .solve(&bilinear, &linear, &space, &mesh_level, &exact)
                .map_err(|err| {
                    warn!("Solver failure on level {level}: {err:#}");
                    CalculationError::Solver(err)
                })?;

            let level_errors = compute_errors(&solution, &exact);
            debug!("Level {level} errors: {level_errors:?}");
            errors.push(level_errors);
            orders = (solution.velocity_order(), solution.pressure_order());

            if level + 1 == self.num_refinements {
                let (velocity, pressure) = solution.sample_at_vertices();
                final_fields = Some(FinalFields {
                    mesh: mesh_level.mesh().clone(),
                    velocity,
                    pressure,
                });
            }
        }

        let verdict = classify(&errors, orders.0, orders.1);
        info!(
            "Verdict: stable = {}, convergent = {}, optimal = {} (EOC velocity H1 {:?}, pressure L2 {:?})",
            verdict.is_stable, verdict.is_convergent, verdict.is_optimal, verdict.eoc_velocity_h1, verdict.eoc_pressure_l2
        );
        Ok(CalculationReport {
            discretization: discretization.clone(),
            score: score(discretization, &verdict),
            errors,
            verdict,
            final_fields: final_fields.expect("Internal error: the final level always produces fields"),
        })
    }
}

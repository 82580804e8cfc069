use eyre::eyre;
use festokes::analysis::{classify, compute_eoc, CalculationError, ConvergenceAnalyzer, ErrorSeries, OPTIMAL_POINTS};
use festokes::config::{
    Configuration, Discretization, Extras, MeshFamily, MissingSelection, PressureElement, VelocityElement,
};
use festokes::error::LevelErrors;
use matrixcompare::assert_scalar_eq;
use std::error::Error;

/// Errors that decay with the given rates for velocity gradient and pressure.
fn series_with_rates(initial: f64, velocity_rate: f64, pressure_rate: f64, num_levels: usize) -> ErrorSeries {
    (0..num_levels)
        .map(|level| {
            let h = 0.5f64.powi(level as i32);
            LevelErrors {
                velocity_l2: initial * h.powf(velocity_rate + 1.0),
                velocity_h1_seminorm: initial * h.powf(velocity_rate),
                divergence_l2: initial * h.powf(velocity_rate),
                pressure_l2: initial * h.powf(pressure_rate),
            }
        })
        .collect()
}

#[test]
fn eoc_of_halving_mesh_size() {
    assert_scalar_eq!(compute_eoc(&[1.0, 0.25]).unwrap(), 2.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(compute_eoc(&[3.0, 1.0, 0.5]).unwrap(), 1.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(compute_eoc(&[1.0, 1.0]).unwrap(), 0.0, comp = abs, tol = 1e-12);
    // Growing errors give negative orders
    assert!(compute_eoc(&[1.0, 2.0]).unwrap() < 0.0);
}

#[test]
fn eoc_requires_two_levels() {
    assert_eq!(compute_eoc(&[]), None);
    assert_eq!(compute_eoc(&[0.1]), None);
}

#[test]
fn eoc_is_scale_invariant() {
    let errors = [0.3, 0.07];
    let scaled = errors.map(|e| 1e-5 * e);
    assert_scalar_eq!(
        compute_eoc(&errors).unwrap(),
        compute_eoc(&scaled).unwrap(),
        comp = abs,
        tol = 1e-12
    );
}

#[test]
fn error_series_collects_levels_in_order() {
    let series = series_with_rates(0.5, 2.0, 2.0, 3);
    assert_eq!(series.len(), 3);
    assert!(!series.is_empty());
    assert_eq!(series.level(3), None);
    assert_eq!(series.last(), series.level(2));
    assert_scalar_eq!(series.pressure_l2()[1], 0.125, comp = abs, tol = 1e-15);

    let empty = ErrorSeries::new();
    assert!(empty.is_empty());
    assert_eq!(empty.last(), None);
}

#[test]
fn optimal_rates_are_classified_as_optimal() {
    // Taylor-Hood P2/P1: H1 velocity order 2, L2 pressure order 2
    let series = series_with_rates(0.5, 2.0, 2.0, 4);
    let verdict = classify(&series, 2, 1);
    assert!(verdict.is_stable);
    assert!(verdict.is_convergent);
    assert!(verdict.is_optimal);
    assert_eq!(verdict.points, OPTIMAL_POINTS);
    assert_scalar_eq!(verdict.eoc_velocity_h1.unwrap(), 2.0, comp = abs, tol = 1e-12);
}

#[test]
fn rates_within_tolerance_band_are_optimal() {
    let series = series_with_rates(0.5, 1.8, 1.8, 4);
    assert!(classify(&series, 2, 1).is_optimal);

    let series = series_with_rates(0.5, 1.7, 2.0, 4);
    assert!(!classify(&series, 2, 1).is_optimal);
}

#[test]
fn suboptimal_but_convergent_rates_earn_no_points() {
    let series = series_with_rates(0.5, 1.0, 1.0, 4);
    let verdict = classify(&series, 2, 1);
    assert!(verdict.is_convergent);
    assert!(!verdict.is_optimal);
    assert_eq!(verdict.points, 0);
}

#[test]
fn stagnating_errors_are_not_convergent() {
    let series = series_with_rates(0.5, 0.0, 0.0, 4);
    let verdict = classify(&series, 1, 0);
    assert!(verdict.is_stable);
    assert!(!verdict.is_convergent);
    assert!(!verdict.is_optimal);
}

#[test]
fn large_final_errors_are_unstable() {
    let series = series_with_rates(100.0, 0.0, 0.0, 4);
    let verdict = classify(&series, 1, 0);
    assert!(!verdict.is_stable);

    // Optimality only looks at the rates
    let series = series_with_rates(1e4, 2.0, 2.0, 3);
    let verdict = classify(&series, 2, 1);
    assert!(!verdict.is_stable);
    assert!(verdict.is_optimal);
}

#[test]
fn single_level_has_no_rates() {
    let series = series_with_rates(0.1, 2.0, 2.0, 1);
    let verdict = classify(&series, 2, 1);
    assert_eq!(verdict.eoc_velocity_h1, None);
    assert_eq!(verdict.eoc_pressure_l2, None);
    assert!(verdict.is_stable);
    assert!(!verdict.is_convergent);
    assert_eq!(verdict.points, 0);
}

#[test]
fn incomplete_configuration_is_rejected_before_solving() {
    let configuration = Configuration {
        mesh_family: Some(MeshFamily::TypeOne),
        velocity: Some(VelocityElement::P2),
        ..Default::default()
    };
    let err = ConvergenceAnalyzer::new(1)
        .run_configuration(&configuration)
        .unwrap_err();
    assert!(matches!(
        err,
        CalculationError::ConfigurationIncomplete(MissingSelection::Pressure)
    ));
    assert!(err.to_string().contains("no pressure element selected"));
    assert!(err.source().is_some());
}

#[test]
fn solver_error_displays_full_context() {
    let err = CalculationError::Solver(eyre!("zero pivot").wrap_err("Failed to factorize"));
    let message = err.to_string();
    assert!(message.contains("Failed to factorize"));
    assert!(message.contains("zero pivot"));
}

#[test]
fn singular_system_is_reported_as_solver_failure() {
    // Without interior penalty, the BDM1/P0 system is numerically singular
    let discretization = Discretization::new(
        MeshFamily::Unstructured,
        VelocityElement::Bdm1,
        PressureElement::P0,
        Extras::new(),
    );
    let err = ConvergenceAnalyzer::new(2).run(&discretization).unwrap_err();
    assert!(matches!(err, CalculationError::Solver(_)), "{err:?}");
    assert!(err.to_string().contains("factorization"));
    assert!(err.source().is_some());
}

#[test]
#[should_panic]
fn analyzer_requires_at_least_one_level() {
    ConvergenceAnalyzer::new(0);
}

//! Runs the convergence study of a single pairing and exports the finest solution.
//!
//! Usage: `stokes_pairing <mesh> <velocity> <pressure> [extras...]`, for example
//! `stokes_pairing "Unstructured Mesh" P2 P1* "P3 Bubble"`.
use eyre::eyre;
use festokes::analysis::ConvergenceAnalyzer;
use festokes::io::export_report;
use festokes::session::{CardSelection, ConfigurationSource};

fn main() -> eyre::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [mesh, velocity, pressure, extras @ ..] = args.as_slice() else {
        return Err(eyre!("usage: stokes_pairing <mesh> <velocity> <pressure> [extras...]"));
    };
    let selection = CardSelection {
        mesh: mesh.clone(),
        velocity: velocity.clone(),
        pressure: pressure.clone(),
        extras: extras.to_vec(),
    };
    let configuration = selection.read_configuration()?;
    let report = ConvergenceAnalyzer::default().run_configuration(&configuration)?;

    let errors = &report.errors;
    println!("{:>12} {:>12} {:>12} {:>12}", "|u|_L2", "|u|_H1", "|div u|_L2", "|p|_L2");
    for level in 0..errors.len() {
        println!(
            "{:>12.4e} {:>12.4e} {:>12.4e} {:>12.4e}",
            errors.velocity_l2()[level],
            errors.velocity_h1_seminorm()[level],
            errors.divergence_l2()[level],
            errors.pressure_l2()[level]
        );
    }
    println!("EOC velocity H1: {:?}", report.verdict.eoc_velocity_h1);
    println!("EOC pressure L2: {:?}", report.verdict.eoc_pressure_l2);
    println!("Score: {}", report.score);

    export_report(&report, "data/demos/stokes_pairing")?;
    Ok(())
}

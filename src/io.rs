//! File output of calculation results.
use crate::analysis::{CalculationReport, ConvergenceVerdict, ErrorSeries};
use crate::config::Discretization;
use crate::io::vtk::TriangleMeshDataSetBuilder;
use crate::mesh::TriangleMesh2d;
use crate::score::ScoreBreakdown;
use crate::session::ResultSink;
use eyre::WrapErr;
use log::{info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub mod vtk;

pub const MESH_FILE: &str = "mesh.vtu";
pub const VELOCITY_FILE: &str = "velocity.vtu";
pub const PRESSURE_FILE: &str = "pressure.vtu";
pub const SUMMARY_FILE: &str = "summary.json";

/// Everything of a report except for the fields.
#[derive(Debug, Serialize)]
pub struct ReportSummary<'a> {
    pub discretization: &'a Discretization,
    pub errors: &'a ErrorSeries,
    pub verdict: &'a ConvergenceVerdict,
    pub score: &'a ScoreBreakdown,
    /// The total score as displayed to the user.
    pub total: String,
}

impl<'a> From<&'a CalculationReport> for ReportSummary<'a> {
    fn from(report: &'a CalculationReport) -> Self {
        Self {
            discretization: &report.discretization,
            errors: &report.errors,
            verdict: &report.verdict,
            score: &report.score,
            total: report.score.to_string(),
        }
    }
}

pub fn write_summary_json(report: &CalculationReport, path: impl AsRef<Path>) -> eyre::Result<()> {
    let path = path.as_ref();
    let file = File::create(path).wrap_err_with(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &ReportSummary::from(report))
        .wrap_err_with(|| format!("Failed to write summary to {}", path.display()))?;
    Ok(())
}

/// Writes the final fields of a report as VTK files and a JSON summary.
pub fn export_report(report: &CalculationReport, directory: impl AsRef<Path>) -> eyre::Result<()> {
    let directory = directory.as_ref();
    let fields = &report.final_fields;
    TriangleMeshDataSetBuilder::from_mesh(&fields.mesh)
        .with_title("velocity")
        .with_point_vector_attributes("velocity", &fields.velocity)
        .try_export(directory.join(VELOCITY_FILE))?;
    TriangleMeshDataSetBuilder::from_mesh(&fields.mesh)
        .with_title("pressure")
        .with_point_scalar_attributes("pressure", &fields.pressure)
        .try_export(directory.join(PRESSURE_FILE))?;
    write_summary_json(report, directory.join(SUMMARY_FILE))
}

/// A result sink that writes everything it receives into an output directory.
#[derive(Debug, Clone)]
pub struct VtkResultSink {
    directory: PathBuf,
    last_failure: Option<String>,
}

impl VtkResultSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            last_failure: None,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The message of the most recent failure, either of the calculation or of the export.
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    fn record_export_result(&mut self, result: eyre::Result<()>) {
        if let Err(err) = result {
            warn!("Export to {} failed: {err:#}", self.directory.display());
            self.last_failure = Some(format!("{err:#}"));
        }
    }
}

impl ResultSink for VtkResultSink {
    fn set_busy(&mut self, busy: bool) {
        if busy {
            info!("Calculating...");
        }
    }

    fn show_mesh(&mut self, mesh: &TriangleMesh2d) {
        let result = TriangleMeshDataSetBuilder::from_mesh(mesh)
            .with_title("mesh")
            .try_export(self.directory.join(MESH_FILE));
        self.record_export_result(result);
    }

    fn show_results(&mut self, report: &CalculationReport) {
        let result = export_report(report, &self.directory);
        if result.is_ok() {
            info!("Score: {}", report.score);
        }
        self.record_export_result(result);
    }

    fn report_failure(&mut self, message: &str) {
        warn!("{message}");
        self.last_failure = Some(message.to_string());
    }

    fn clear_fields(&mut self) {
        for file in [MESH_FILE, VELOCITY_FILE, PRESSURE_FILE] {
            let path = self.directory.join(file);
            if path.exists() {
                if let Err(err) = std::fs::remove_file(&path) {
                    warn!("Failed to remove {}: {err}", path.display());
                }
            }
        }
    }
}

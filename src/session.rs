//! Interactive calculation sessions.
//!
//! A session reads a configuration from a [`ConfigurationSource`], runs the convergence study on a
//! dedicated worker thread and delivers the outcome to a [`ResultSink`]. At most one calculation
//! is in flight at a time.
use crate::analysis::{CalculationReport, ConvergenceAnalyzer};
use crate::config::{parse_card, Configuration, Extras, UnknownCard};
use crate::mesh::builder::MeshBuilder;
use crate::mesh::TriangleMesh2d;
use log::{debug, warn};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

pub trait ConfigurationSource {
    fn read_configuration(&self) -> Result<Configuration, UnknownCard>;
}

impl ConfigurationSource for Configuration {
    fn read_configuration(&self) -> Result<Configuration, UnknownCard> {
        Ok(self.clone())
    }
}

/// Card names as selected in a user interface, with "None" for an empty selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSelection {
    pub mesh: String,
    pub velocity: String,
    pub pressure: String,
    #[serde(default)]
    pub extras: Vec<String>,
}

impl Default for CardSelection {
    fn default() -> Self {
        Self {
            mesh: "None".to_string(),
            velocity: "None".to_string(),
            pressure: "None".to_string(),
            extras: Vec::new(),
        }
    }
}

impl ConfigurationSource for CardSelection {
    fn read_configuration(&self) -> Result<Configuration, UnknownCard> {
        Ok(Configuration {
            mesh_family: parse_card(&self.mesh)?,
            velocity: parse_card(&self.velocity)?,
            pressure: parse_card(&self.pressure)?,
            extras: Extras::from_card_names(self.extras.iter().map(String::as_str))?,
        })
    }
}

/// Receiver of calculation results, typically a user interface.
pub trait ResultSink: Send {
    fn set_busy(&mut self, busy: bool);

    /// Shows a mesh without any fields.
    fn show_mesh(&mut self, mesh: &TriangleMesh2d);

    fn show_results(&mut self, report: &CalculationReport);

    fn report_failure(&mut self, message: &str);

    fn clear_fields(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Busy(bool),
    Mesh(TriangleMesh2d),
    Results(Box<CalculationReport>),
    Failure(String),
    ClearFields,
}

/// A sink that records everything it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub events: Vec<SinkEvent>,
}

impl RecordingSink {
    pub fn results(&self) -> impl Iterator<Item = &CalculationReport> {
        self.events.iter().filter_map(|event| match event {
            SinkEvent::Results(report) => Some(report.as_ref()),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|event| match event {
            SinkEvent::Failure(message) => Some(message.as_str()),
            _ => None,
        })
    }
}

impl ResultSink for RecordingSink {
    fn set_busy(&mut self, busy: bool) {
        self.events.push(SinkEvent::Busy(busy));
    }

    fn show_mesh(&mut self, mesh: &TriangleMesh2d) {
        self.events.push(SinkEvent::Mesh(mesh.clone()));
    }

    fn show_results(&mut self, report: &CalculationReport) {
        self.events
            .push(SinkEvent::Results(Box::new(report.clone())));
    }

    fn report_failure(&mut self, message: &str) {
        self.events.push(SinkEvent::Failure(message.to_string()));
    }

    fn clear_fields(&mut self) {
        self.events.push(SinkEvent::ClearFields);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    /// Another calculation is still running.
    Busy,
    InvalidConfiguration(UnknownCard),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "a calculation is already running"),
            Self::InvalidConfiguration(err) => write!(f, "invalid configuration: {err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Busy => None,
            Self::InvalidConfiguration(err) => Some(err),
        }
    }
}

enum Outcome {
    Nothing,
    Mesh(TriangleMesh2d),
    Report(Box<CalculationReport>),
    Failure(String),
}

fn calculate(analyzer: &ConvergenceAnalyzer, configuration: &Configuration) -> Outcome {
    match configuration.discretization() {
        Ok(discretization) => match analyzer.run(&discretization) {
            Ok(report) => Outcome::Report(Box::new(report)),
            Err(err) => Outcome::Failure(err.to_string()),
        },
        Err(missing) => match configuration.mesh_family {
            Some(family) => {
                debug!("Showing mesh only: {missing}");
                let level = MeshBuilder.build_mesh(family, &configuration.extras, 0);
                Outcome::Mesh(level.mesh().clone())
            }
            None => Outcome::Nothing,
        },
    }
}

/// Runs calculations one at a time on a worker thread.
pub struct CalculationSession<S> {
    sink: Arc<Mutex<S>>,
    analyzer: ConvergenceAnalyzer,
    busy: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S: ResultSink + 'static> CalculationSession<S> {
    pub fn new(sink: S) -> Self {
        Self::with_analyzer(sink, ConvergenceAnalyzer::default())
    }

    pub fn with_analyzer(sink: S, analyzer: ConvergenceAnalyzer) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
            analyzer,
            busy: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            worker: Mutex::new(None),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Locks the sink, blocking while the worker is delivering results.
    pub fn sink(&self) -> MutexGuard<'_, S> {
        self.sink.lock()
    }

    /// Starts a calculation for the configuration currently selected in `source`.
    ///
    /// A submission while another calculation is running is rejected.
    pub fn submit(&self, source: &dyn ConfigurationSource) -> Result<(), SessionError> {
        let configuration = source
            .read_configuration()
            .map_err(SessionError::InvalidConfiguration)?;
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::Busy);
        }
        self.sink.lock().set_busy(true);

        let generation = self.generation.load(Ordering::Acquire);
        let sink = Arc::clone(&self.sink);
        let busy = Arc::clone(&self.busy);
        let current_generation = Arc::clone(&self.generation);
        let analyzer = self.analyzer;
        let handle = std::thread::spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| calculate(&analyzer, &configuration)))
                .unwrap_or_else(|_| Outcome::Failure("the calculation panicked".to_string()));

            let mut sink = sink.lock();
            if current_generation.load(Ordering::Acquire) == generation {
                match outcome {
                    Outcome::Nothing => {}
                    Outcome::Mesh(mesh) => sink.show_mesh(&mesh),
                    Outcome::Report(report) => sink.show_results(&report),
                    Outcome::Failure(message) => {
                        warn!("Calculation failed: {message}");
                        sink.report_failure(&message);
                        sink.clear_fields();
                    }
                }
            } else {
                debug!("Discarding the outcome of an abandoned calculation");
            }
            sink.set_busy(false);
            busy.store(false, Ordering::Release);
        });

        let previous = self.worker.lock().replace(handle);
        if let Some(previous) = previous {
            // The previous worker has already released the busy flag
            let _ = previous.join();
        }
        Ok(())
    }

    /// Clears the displayed fields. The outcome of a running calculation is discarded.
    pub fn clear(&self) {
        let mut sink = self.sink.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        sink.clear_fields();
    }

    /// Blocks until the current calculation, if any, has finished.
    pub fn wait(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl<S> Drop for CalculationSession<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.get_mut().take() {
            let _ = handle.join();
        }
    }
}

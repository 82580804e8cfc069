use festokes::analysis::{ConvergenceAnalyzer, DEFAULT_NUM_REFINEMENTS};
use festokes::session::{CalculationSession, CardSelection, RecordingSink, SessionError, SinkEvent};

fn selection(mesh: &str, velocity: &str, pressure: &str, extras: &[&str]) -> CardSelection {
    CardSelection {
        mesh: mesh.to_string(),
        velocity: velocity.to_string(),
        pressure: pressure.to_string(),
        extras: extras.iter().map(|s| s.to_string()).collect(),
    }
}

/// A calculation that takes long enough to still be running right after submission.
fn long_selection() -> CardSelection {
    selection("Unstructured Mesh", "P3", "P2", &[])
}

#[test]
fn empty_selection_only_toggles_busy_state() {
    let session = CalculationSession::new(RecordingSink::default());
    session.submit(&CardSelection::default()).unwrap();
    session.wait();
    assert!(!session.is_busy());
    assert_eq!(session.sink().events, vec![SinkEvent::Busy(true), SinkEvent::Busy(false)]);
}

#[test]
fn mesh_without_elements_shows_mesh() {
    let session = CalculationSession::new(RecordingSink::default());
    session
        .submit(&selection("Type One Mesh", "P2", "None", &[]))
        .unwrap();
    session.wait();

    let sink = session.sink();
    assert_eq!(sink.events.len(), 3);
    assert_eq!(sink.events[0], SinkEvent::Busy(true));
    match &sink.events[1] {
        SinkEvent::Mesh(mesh) => assert_eq!(mesh.num_elements(), 8),
        other => panic!("Expected a mesh, got {other:?}"),
    }
    assert_eq!(sink.events[2], SinkEvent::Busy(false));
    assert_eq!(sink.results().count(), 0);
}

#[test]
fn unknown_card_is_rejected_before_calculation() {
    let session = CalculationSession::new(RecordingSink::default());
    let err = session
        .submit(&selection("Hexagonal Mesh", "P2", "P1", &[]))
        .unwrap_err();
    match &err {
        SessionError::InvalidConfiguration(card) => {
            assert_eq!(card.kind(), "mesh");
            assert_eq!(card.name(), "Hexagonal Mesh");
        }
        other => panic!("Unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("Hexagonal Mesh"));

    let err = session
        .submit(&selection("Type One Mesh", "P2", "P1", &["Upwinding"]))
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidConfiguration(ref card) if card.kind() == "extra"));

    session.wait();
    assert!(session.sink().events.is_empty());
}

#[test]
fn complete_selection_delivers_results() {
    let session = CalculationSession::with_analyzer(RecordingSink::default(), ConvergenceAnalyzer::new(1));
    session
        .submit(&selection("Type One Mesh", "P2", "P1", &[]))
        .unwrap();
    session.wait();

    let sink = session.sink();
    assert_eq!(sink.events.first(), Some(&SinkEvent::Busy(true)));
    assert_eq!(sink.events.last(), Some(&SinkEvent::Busy(false)));
    assert_eq!(sink.failures().count(), 0);
    let reports: Vec<_> = sink.results().collect();
    assert_eq!(reports.len(), 1);
    let report = reports[0];
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.final_fields.mesh.num_elements(), 8);
    assert_eq!(report.final_fields.velocity.len(), 9);
    assert_eq!(report.final_fields.pressure.len(), 9);
}

#[test]
fn submission_while_busy_is_rejected() {
    let session = CalculationSession::new(RecordingSink::default());
    session.submit(&long_selection()).unwrap();
    assert!(session.is_busy());
    assert_eq!(session.submit(&long_selection()), Err(SessionError::Busy));
    session.wait();
    assert!(!session.is_busy());

    let sink = session.sink();
    let busy_events = sink
        .events
        .iter()
        .filter(|event| matches!(event, SinkEvent::Busy(_)))
        .count();
    assert_eq!(busy_events, 2);
    let report = sink.results().next().unwrap();
    assert_eq!(report.errors.len(), DEFAULT_NUM_REFINEMENTS);
}

#[test]
fn clearing_discards_running_calculation() {
    let session = CalculationSession::new(RecordingSink::default());
    session.submit(&long_selection()).unwrap();
    session.clear();
    session.wait();

    let sink = session.sink();
    assert_eq!(sink.results().count(), 0);
    assert_eq!(
        sink.events,
        vec![SinkEvent::Busy(true), SinkEvent::ClearFields, SinkEvent::Busy(false)]
    );
}

#[test]
fn session_accepts_new_calculation_after_completion() {
    let session = CalculationSession::with_analyzer(RecordingSink::default(), ConvergenceAnalyzer::new(1));
    session.submit(&CardSelection::default()).unwrap();
    session.wait();
    session
        .submit(&selection("Singular Vertex Mesh", "None", "None", &[]))
        .unwrap();
    session.wait();
    assert_eq!(session.sink().events.len(), 5);
}

#[test]
fn solver_failure_is_reported_and_clears_fields() {
    let session = CalculationSession::with_analyzer(RecordingSink::default(), ConvergenceAnalyzer::new(2));
    session
        .submit(&selection("Unstructured Mesh", "BDM1", "P0", &[]))
        .unwrap();
    session.wait();

    let sink = session.sink();
    assert_eq!(sink.events.len(), 4, "{:?}", sink.events);
    assert_eq!(sink.events[0], SinkEvent::Busy(true));
    match &sink.events[1] {
        SinkEvent::Failure(message) => assert!(message.contains("factorization"), "{message}"),
        other => panic!("Expected a failure, got {other:?}"),
    }
    assert_eq!(sink.events[2], SinkEvent::ClearFields);
    assert_eq!(sink.events[3], SinkEvent::Busy(false));
    assert_eq!(sink.results().count(), 0);
    assert_eq!(sink.failures().count(), 1);
}

//! Test: the first failing phase stops the sequence

use crate::helpers::*;
use launcher::core::{PhaseKind, PhaseState, SequenceState};
use launcher::{PhaseOutcome, ProcessError, StartupError};

#[tokio::test]
async fn test_migration_failure_stops_everything() {
    let run = run_sequence("{}", MockRunner::with_codes(&[3])).await;

    assert!(matches!(run.result, Err(StartupError::Migration { code: 3 })));
    assert_eq!(run.exit_code(), 3);
    assert_eq!(run.commands(), vec!["alembic upgrade head"]);
    assert_eq!(run.markers(), vec![DEFAULT_MARKERS[0]]);
    assert_eq!(
        run.sequence.state,
        SequenceState::Failed {
            phase: PhaseKind::Migrate,
            code: 3
        }
    );
    assert!(matches!(run.phase_state(PhaseKind::Import), PhaseState::Pending));
    assert!(matches!(run.phase_state(PhaseKind::Run), PhaseState::Pending));
}

#[tokio::test]
async fn test_import_failure_never_starts_bot() {
    let run = run_sequence("{}", MockRunner::with_codes(&[0, 2])).await;

    assert!(matches!(run.result, Err(StartupError::Import { code: 2 })));
    assert_eq!(run.exit_code(), 2);
    assert_eq!(run.markers(), DEFAULT_MARKERS[..2]);
    assert!(run.calls.iter().all(|c| c.handoff.is_none()));
    assert!(matches!(
        run.phase_state(PhaseKind::Migrate),
        PhaseState::Completed { exit_code: 0, .. }
    ));
    assert!(matches!(
        run.phase_state(PhaseKind::Import),
        PhaseState::Failed { exit_code: 2, .. }
    ));
}

#[tokio::test]
async fn test_signal_killed_phase_uses_shell_code() {
    let run = run_sequence(
        "{}",
        MockRunner::new(vec![Ok(PhaseOutcome::signaled(9))]),
    )
    .await;

    assert_eq!(run.exit_code(), 137);
    assert_eq!(run.commands().len(), 1);
}

#[tokio::test]
async fn test_timeout_fails_phase_with_124() {
    let yaml = r#"
phases:
  migrate:
    command: alembic
    args: ["upgrade", "head"]
    timeout_secs: 60
"#;
    let run = run_sequence(yaml, MockRunner::new(vec![Err(ProcessError::Timeout(60))])).await;

    assert!(matches!(run.result, Err(StartupError::Migration { code: 124 })));
    assert_eq!(
        run.calls[0].invocation.timeout,
        Some(std::time::Duration::from_secs(60))
    );
    assert_eq!(run.commands().len(), 1);
}

#[tokio::test]
async fn test_missing_import_program() {
    let run = run_sequence(
        "{}",
        MockRunner::new(vec![
            Ok(PhaseOutcome::exited(0)),
            Err(ProcessError::Spawn {
                program: "python".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
        ]),
    )
    .await;

    match &run.result {
        Err(err @ StartupError::Launch { phase, .. }) => {
            assert_eq!(*phase, PhaseKind::Import);
            assert_eq!(err.exit_code(), 127);
        }
        other => panic!("expected launch failure, got {:?}", other),
    }
    assert_eq!(
        run.sequence.state,
        SequenceState::Failed {
            phase: PhaseKind::Import,
            code: 127
        }
    );
}

#[tokio::test]
async fn test_failed_exec_reports_run_phase() {
    let run = run_sequence(
        "handoff: exec\n",
        MockRunner::new(vec![
            Ok(PhaseOutcome::exited(0)),
            Ok(PhaseOutcome::exited(0)),
            Err(ProcessError::Exec {
                program: "python".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            }),
        ]),
    )
    .await;

    assert_eq!(run.exit_code(), 126);
    assert_eq!(run.markers(), DEFAULT_MARKERS);
    assert_eq!(
        run.sequence.state,
        SequenceState::Failed {
            phase: PhaseKind::Run,
            code: 126
        }
    );
}

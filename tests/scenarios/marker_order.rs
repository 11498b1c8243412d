//! Test: markers and phase order on a successful start

use crate::helpers::*;
use launcher::core::{PhaseKind, PhaseState, SequenceOverrides, SequenceState};
use launcher::HandoffMode;

#[tokio::test]
async fn test_phases_run_in_fixed_order() {
    let run = run_sequence("{}", MockRunner::succeeding()).await;

    assert!(run.result.is_ok());
    assert_eq!(
        run.commands(),
        vec![
            "alembic upgrade head",
            "python scripts/import_data.py",
            "python bot.py",
        ]
    );
    assert_eq!(run.markers(), DEFAULT_MARKERS);
    assert_eq!(run.sequence.state, SequenceState::Exited { code: 0 });
}

#[tokio::test]
async fn test_only_the_final_phase_is_handed_off() {
    let yaml = "handoff: supervise\n";
    let run = run_sequence(yaml, MockRunner::succeeding()).await;

    let modes: Vec<Option<HandoffMode>> = run.calls.iter().map(|c| c.handoff).collect();
    assert_eq!(modes, vec![None, None, Some(HandoffMode::Supervise)]);
}

#[tokio::test]
async fn test_each_phase_starts_once() {
    let run = run_sequence("{}", MockRunner::succeeding()).await;

    let mut started = Vec::new();
    for event in &run.events {
        if let launcher::ExecutionEvent::PhaseStarted { phase, .. } = event {
            started.push(*phase);
        }
    }
    assert_eq!(started, PhaseKind::ALL);
}

#[tokio::test]
async fn test_custom_markers() {
    let yaml = r#"
phases:
  migrate:
    command: alembic
    args: ["upgrade", "head"]
    marker: "[1/3] migrating"
  run:
    command: python
    args: ["-m", "bot"]
    marker: "[3/3] bot"
"#;
    let run = run_sequence(yaml, MockRunner::succeeding()).await;

    assert_eq!(
        run.markers(),
        vec!["[1/3] migrating", "Importing data...", "[3/3] bot"]
    );
    assert_eq!(run.commands()[2], "python -m bot");
}

#[tokio::test]
async fn test_exec_mode_hands_off_run_phase() {
    let overrides = SequenceOverrides {
        handoff: Some(HandoffMode::Exec),
        ..SequenceOverrides::default()
    };
    let run = run_sequence_with(
        "{}",
        MockRunner::succeeding(),
        RunOptions {
            overrides,
            ..RunOptions::default()
        },
    )
    .await;

    // The mock returns from exec, so the engine records the bot's exit too
    assert_eq!(run.calls[2].handoff, Some(HandoffMode::Exec));
    assert!(matches!(
        run.phase_state(PhaseKind::Run),
        PhaseState::Completed { exit_code: 0, .. }
    ));
}

#[tokio::test]
async fn test_bot_exit_code_propagates() {
    let run = run_sequence("handoff: supervise\n", MockRunner::with_codes(&[0, 0, 3])).await;

    assert_eq!(run.exit_code(), 3);
    assert!(matches!(
        run.result,
        Err(launcher::StartupError::Runtime { code: 3 })
    ));
    assert_eq!(run.sequence.state, SequenceState::Exited { code: 3 });
}

#[tokio::test]
async fn test_rerun_repeats_every_phase() {
    // Import is never skipped on a second start; idempotence is the script's job
    let first = run_sequence("{}", MockRunner::succeeding()).await;
    let second = run_sequence("{}", MockRunner::succeeding()).await;

    assert_eq!(first.commands(), second.commands());
    assert_ne!(first.sequence.run_id, second.sequence.run_id);
}

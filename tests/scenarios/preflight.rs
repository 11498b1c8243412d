//! Test: required environment is checked before anything runs

use crate::helpers::*;
use launcher::core::{SequenceOverrides, SequenceState};
use launcher::ExecutionEvent;
use launcher::StartupError;

const REQUIRES_SECRETS: &str = r#"
required_env: ["BOT_TOKEN", "DB_PASSWORD"]
"#;

#[tokio::test]
async fn test_missing_env_blocks_migration() {
    let run = run_sequence_with(
        REQUIRES_SECRETS,
        MockRunner::succeeding(),
        RunOptions {
            env: env(&[("BOT_TOKEN", "123:abc")]),
            ..RunOptions::default()
        },
    )
    .await;

    assert!(matches!(run.result, Err(StartupError::Config(_))));
    assert_eq!(run.exit_code(), 78);
    assert!(run.calls.is_empty());
    assert!(run.markers().is_empty());
    assert_eq!(run.sequence.state, SequenceState::Init);
    assert!(run.events.iter().any(|e| matches!(
        e,
        ExecutionEvent::PreflightFailed { missing } if missing == &vec!["DB_PASSWORD".to_string()]
    )));
}

#[tokio::test]
async fn test_empty_value_counts_as_missing() {
    let run = run_sequence_with(
        REQUIRES_SECRETS,
        MockRunner::succeeding(),
        RunOptions {
            env: env(&[("BOT_TOKEN", "123:abc"), ("DB_PASSWORD", "")]),
            ..RunOptions::default()
        },
    )
    .await;

    assert_eq!(run.exit_code(), 78);
}

#[tokio::test]
async fn test_phase_env_satisfies_requirement() {
    let overrides = SequenceOverrides {
        env: vec![("DB_PASSWORD".to_string(), "secret".to_string())],
        ..SequenceOverrides::default()
    };
    let run = run_sequence_with(
        REQUIRES_SECRETS,
        MockRunner::succeeding(),
        RunOptions {
            overrides,
            env: env(&[("BOT_TOKEN", "123:abc")]),
            ..RunOptions::default()
        },
    )
    .await;

    assert!(run.result.is_ok());
    assert_eq!(
        run.calls[0].invocation.env.get("DB_PASSWORD").map(String::as_str),
        Some("secret")
    );
}

//! Test: {{ name }} placeholders in phase commands

use crate::helpers::*;
use launcher::core::{LauncherConfig, Sequence, SequenceOverrides};
use launcher::StartupError;

const TEMPLATED: &str = r#"
variables:
  revision: head
  data_dir: /data
phases:
  migrate:
    command: alembic
    args: ["upgrade", "{{ revision }}"]
  import:
    command: python
    args: ["scripts/import_data.py", "--source", "{{data_dir}}/halls.json"]
"#;

#[tokio::test]
async fn test_variables_are_rendered() {
    let run = run_sequence(TEMPLATED, MockRunner::succeeding()).await;

    assert_eq!(
        run.commands()[..2],
        [
            "alembic upgrade head",
            "python scripts/import_data.py --source /data/halls.json",
        ]
    );
}

#[tokio::test]
async fn test_cli_override_wins() {
    let overrides = SequenceOverrides {
        variables: vec![("revision".to_string(), "ae1027a6acf".to_string())],
        ..SequenceOverrides::default()
    };
    let run = run_sequence_with(
        TEMPLATED,
        MockRunner::succeeding(),
        RunOptions {
            overrides,
            ..RunOptions::default()
        },
    )
    .await;

    assert_eq!(run.commands()[0], "alembic upgrade ae1027a6acf");
}

#[test]
fn test_unresolved_placeholder_is_config_error() {
    let config = LauncherConfig::from_yaml(
        r#"
phases:
  run:
    command: python
    args: ["bot.py", "--token", "{{ token }}", "--mode", "{{ mode }}"]
"#,
    )
    .unwrap();

    let err = Sequence::from_config(&config, &SequenceOverrides::default()).unwrap_err();
    assert!(matches!(err, StartupError::Config(_)));
    assert_eq!(err.exit_code(), 78);
    let message = err.to_string();
    assert!(message.contains("mode"));
    assert!(message.contains("token"));
}

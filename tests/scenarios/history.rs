//! Test: startup attempts are recorded

use crate::helpers::*;
use launcher::core::{PhaseKind, StartupStatus};
use launcher::persistence::{InMemoryPersistence, PersistenceBackend};
use std::sync::Arc;

#[tokio::test]
async fn test_failed_start_is_recorded() {
    let store = Arc::new(InMemoryPersistence::new());
    let run = run_sequence_with(
        "name: booking-bot\n",
        MockRunner::with_codes(&[0, 4]),
        RunOptions {
            history: Some(store.clone()),
            ..RunOptions::default()
        },
    )
    .await;

    let saved = store
        .load_run(run.sequence.run_id)
        .await
        .unwrap()
        .expect("run should be recorded");
    assert_eq!(saved.sequence_name, "booking-bot");
    assert_eq!(saved.status, StartupStatus::Failed);
    assert_eq!(saved.failed_phase, Some(PhaseKind::Import));
    assert_eq!(saved.exit_code, Some(4));
}

#[tokio::test]
async fn test_supervised_exit_is_recorded() {
    let store = Arc::new(InMemoryPersistence::new());
    let run = run_sequence_with(
        "handoff: supervise\n",
        MockRunner::succeeding(),
        RunOptions {
            history: Some(store.clone()),
            ..RunOptions::default()
        },
    )
    .await;

    let saved = store.load_run(run.sequence.run_id).await.unwrap().unwrap();
    assert_eq!(saved.status, StartupStatus::Exited);
    assert_eq!(saved.exit_code, Some(0));
    assert!(saved.finished_at.is_some());
    assert_eq!(store.list_recent(10).await.unwrap().len(), 1);
}

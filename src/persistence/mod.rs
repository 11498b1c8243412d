//! Persistence layer for startup history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteStartupStore;

pub use crate::core::StartupStatus;
use crate::core::{PhaseKind, PhaseState, Sequence, SequenceState, StartupError};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary of one startup attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// Sequence name from the config
    pub sequence_name: String,

    pub status: StartupStatus,

    /// Phase that failed, if any
    pub failed_phase: Option<PhaseKind>,

    /// Exit code, once known
    pub exit_code: Option<i32>,

    /// Error message for failed attempts
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,

    pub finished_at: Option<DateTime<Utc>>,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Insert or update a startup record
    async fn save_run(&self, run: &StartupSummary) -> Result<()>;

    /// Load a record by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<StartupSummary>>;

    /// Most recent records first, at most `limit`
    async fn list_recent(&self, limit: usize) -> Result<Vec<StartupSummary>>;
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    runs: tokio::sync::RwLock<Vec<StartupSummary>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            runs: tokio::sync::RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &StartupSummary) -> Result<()> {
        let mut runs = self.runs.write().await;
        match runs.iter_mut().find(|r| r.run_id == run.run_id) {
            Some(existing) => *existing = run.clone(),
            None => runs.push(run.clone()),
        }
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<StartupSummary>> {
        let runs = self.runs.read().await;
        Ok(runs.iter().find(|r| r.run_id == run_id).cloned())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<StartupSummary>> {
        let mut runs = self.runs.read().await.clone();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }
}

/// Create a summary from a sequence and the error that ended it, if any
pub fn create_summary(sequence: &Sequence, error: Option<&StartupError>) -> StartupSummary {
    let handed_off = matches!(
        sequence.phase(PhaseKind::Run).state,
        PhaseState::HandedOff { .. }
    );

    let status = match sequence.state {
        SequenceState::Failed { .. } => StartupStatus::Failed,
        SequenceState::Exited { .. } if error.is_some() => StartupStatus::Failed,
        SequenceState::Exited { .. } => StartupStatus::Exited,
        _ if error.is_some() => StartupStatus::Failed,
        _ if handed_off => StartupStatus::HandedOff,
        _ => StartupStatus::Running,
    };

    let exit_code = match (error, sequence.state) {
        (Some(error), _) => Some(error.exit_code()),
        (None, SequenceState::Exited { code }) => Some(code),
        _ => None,
    };

    StartupSummary {
        run_id: sequence.run_id,
        sequence_name: sequence.name.clone(),
        status,
        failed_phase: error.and_then(StartupError::failed_phase),
        exit_code,
        error: error.map(ToString::to_string),
        started_at: sequence.started_at.unwrap_or_else(Utc::now),
        finished_at: sequence.finished_at,
    }
}

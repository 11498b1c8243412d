//! Execution state models

use crate::core::phase::PhaseKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall startup status, as recorded in history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartupStatus {
    /// Sequence is migrating or importing
    Running,
    /// The bot replaced the launcher process
    HandedOff,
    /// The supervised bot exited
    Exited,
    /// A phase or the preflight failed
    Failed,
}

impl StartupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StartupStatus::Running => "Running",
            StartupStatus::HandedOff => "HandedOff",
            StartupStatus::Exited => "Exited",
            StartupStatus::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Running" => Some(StartupStatus::Running),
            "HandedOff" => Some(StartupStatus::HandedOff),
            "Exited" => Some(StartupStatus::Exited),
            "Failed" => Some(StartupStatus::Failed),
            _ => None,
        }
    }
}

/// The startup state machine.
///
/// `Init -> Migrating -> Importing -> Running -> Exited`, with `Failed`
/// reachable only from the phase that failed. No transition skips a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceState {
    Init,
    Migrating,
    Importing,
    Running,
    Exited { code: i32 },
    Failed { phase: PhaseKind, code: i32 },
}

impl SequenceState {
    /// The state entered when `phase` begins
    pub fn entering(phase: PhaseKind) -> Self {
        match phase {
            PhaseKind::Migrate => SequenceState::Migrating,
            PhaseKind::Import => SequenceState::Importing,
            PhaseKind::Run => SequenceState::Running,
        }
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: &SequenceState) -> bool {
        use SequenceState::*;
        match (self, next) {
            (Init, Migrating) | (Migrating, Importing) | (Importing, Running) => true,
            (Running, Exited { .. }) => true,
            (Migrating, Failed { phase, .. }) => *phase == PhaseKind::Migrate,
            (Importing, Failed { phase, .. }) => *phase == PhaseKind::Import,
            (Running, Failed { phase, .. }) => *phase == PhaseKind::Run,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SequenceState::Exited { .. } | SequenceState::Failed { .. })
    }
}

impl fmt::Display for SequenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceState::Init => write!(f, "INIT"),
            SequenceState::Migrating => write!(f, "MIGRATING"),
            SequenceState::Importing => write!(f, "IMPORTING"),
            SequenceState::Running => write!(f, "RUNNING"),
            SequenceState::Exited { code } => write!(f, "EXITED({})", code),
            SequenceState::Failed { phase, code } => write!(f, "FAILED({}, {})", phase, code),
        }
    }
}

/// State of a single phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PhaseState {
    /// Phase has not started
    Pending,
    /// Phase process is running
    Running {
        started_at: DateTime<Utc>,
    },
    /// Phase process exited with status 0
    Completed {
        exit_code: i32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Phase could not start, timed out or exited non-zero
    Failed {
        error: String,
        exit_code: i32,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Run phase replaced the launcher process image
    HandedOff {
        at: DateTime<Utc>,
    },
}

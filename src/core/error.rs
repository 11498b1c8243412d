//! Startup failure taxonomy and exit-code mapping

use crate::core::phase::PhaseKind;
use crate::core::state::SequenceState;
use crate::process::ProcessError;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for configuration problems (`EX_CONFIG` from sysexits.h)
pub const EXIT_CONFIG: i32 = 78;

/// Exit code for internal sequencing bugs (`EX_SOFTWARE`)
pub const EXIT_SOFTWARE: i32 = 70;

/// Exit code reported when a phase is killed for exceeding its timeout
pub const EXIT_TIMEOUT: i32 = 124;

/// Every way a build or startup can fail.
///
/// All variants are fatal. [`StartupError::exit_code`] is what the
/// container process exits with.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("dependency install failed with exit code {code}")]
    Build { code: i32 },

    #[error("failed to prepare {path}: {source}")]
    Asset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("migration failed with exit code {code}")]
    Migration { code: i32 },

    #[error("import failed with exit code {code}")]
    Import { code: i32 },

    #[error("bot exited with code {code}")]
    Runtime { code: i32 },

    #[error("failed to launch {phase} phase: {source}")]
    Launch {
        phase: PhaseKind,
        #[source]
        source: ProcessError,
    },

    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: SequenceState,
        to: SequenceState,
    },
}

impl StartupError {
    /// Build the failure for a phase that exited with a non-zero code
    pub fn phase_failure(phase: PhaseKind, code: i32) -> Self {
        match phase {
            PhaseKind::Migrate => StartupError::Migration { code },
            PhaseKind::Import => StartupError::Import { code },
            PhaseKind::Run => StartupError::Runtime { code },
        }
    }

    /// Process exit code the launcher should terminate with
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::Config(_) => EXIT_CONFIG,
            StartupError::Build { code }
            | StartupError::Migration { code }
            | StartupError::Import { code }
            | StartupError::Runtime { code } => *code,
            StartupError::Asset { .. } => 1,
            StartupError::Launch { source, .. } => source.exit_code(),
            StartupError::InvalidTransition { .. } => EXIT_SOFTWARE,
        }
    }

    /// The phase this failure belongs to, if any
    pub fn failed_phase(&self) -> Option<PhaseKind> {
        match self {
            StartupError::Migration { .. } => Some(PhaseKind::Migrate),
            StartupError::Import { .. } => Some(PhaseKind::Import),
            StartupError::Runtime { .. } => Some(PhaseKind::Run),
            StartupError::Launch { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

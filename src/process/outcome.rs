//! Process outcome and error types

use crate::core::error::EXIT_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::process::ExitStatus;
use thiserror::Error;

/// Error types for process operations
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {0} seconds")]
    Timeout(u64),

    #[error("failed to exec `{program}`: {source}")]
    Exec {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),
}

impl ProcessError {
    /// Exit code a POSIX shell would report for the same failure
    pub fn exit_code(&self) -> i32 {
        match self {
            ProcessError::Spawn { source, .. } | ProcessError::Exec { source, .. } => {
                if source.kind() == std::io::ErrorKind::NotFound {
                    127
                } else {
                    126
                }
            }
            ProcessError::Timeout(_) => EXIT_TIMEOUT,
            ProcessError::Wait { .. } | ProcessError::Signals(_) => 1,
        }
    }
}

/// How a phase process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseOutcome {
    /// Exit code, if the process exited normally
    pub code: Option<i32>,

    /// Terminating signal, if the process was killed
    pub signal: Option<i32>,
}

impl PhaseOutcome {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn signaled(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::signaled(signal);
            }
        }
        Self {
            code: status.code(),
            signal: None,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code with the shell's `128 + signal` convention for killed processes
    pub fn shell_code(&self) -> i32 {
        match (self.code, self.signal) {
            (Some(code), _) => code,
            (None, Some(signal)) => 128 + signal,
            (None, None) => 1,
        }
    }
}

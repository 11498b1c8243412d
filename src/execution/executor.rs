//! Phase executor - runs individual phases with the runner

use crate::{
    core::{error::EXIT_TIMEOUT, HandoffMode, PhaseKind, StartupError},
    process::{Invocation, PhaseOutcome, PhaseRunner, ProcessError},
};
use tracing::{error, info};

/// Result of executing a blocking phase
#[derive(Debug)]
pub enum ExecutionResult {
    /// Phase exited with status 0
    Success { outcome: PhaseOutcome },
    /// Phase could not start, timed out, or exited non-zero
    Failed { error: StartupError },
}

/// Executes a single phase
pub struct PhaseExecutor<R> {
    runner: R,
}

impl<R: PhaseRunner> PhaseExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Run a blocking phase and classify the result
    pub async fn execute(&self, kind: PhaseKind, invocation: &Invocation) -> ExecutionResult {
        info!(phase = %kind, command = %invocation.display(), "executing phase");

        match self.runner.run(invocation).await {
            Ok(outcome) if outcome.success() => {
                info!(phase = %kind, "phase completed successfully");
                ExecutionResult::Success { outcome }
            }
            Ok(outcome) => {
                let code = outcome.shell_code();
                error!(phase = %kind, code, "phase failed");
                ExecutionResult::Failed {
                    error: StartupError::phase_failure(kind, code),
                }
            }
            Err(ProcessError::Timeout(secs)) => {
                error!(phase = %kind, "phase timed out after {} seconds", secs);
                ExecutionResult::Failed {
                    error: StartupError::phase_failure(kind, EXIT_TIMEOUT),
                }
            }
            Err(source) => {
                error!(phase = %kind, "phase could not be started: {}", source);
                ExecutionResult::Failed {
                    error: StartupError::Launch { phase: kind, source },
                }
            }
        }
    }

    /// Hand off to the run phase
    pub async fn hand_off(
        &self,
        invocation: &Invocation,
        mode: HandoffMode,
    ) -> Result<PhaseOutcome, ProcessError> {
        info!(?mode, command = %invocation.display(), "handing off to run phase");
        self.runner.hand_off(invocation, mode).await
    }
}

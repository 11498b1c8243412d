//! Subprocess runner - runs phase commands as child processes

use crate::core::config::HandoffMode;
use crate::process::{handoff, Invocation, PhaseOutcome, PhaseRunner, ProcessError};
use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs phases as real child processes with inherited stdio
#[derive(Debug, Clone, Default)]
pub struct SubprocessRunner;

impl SubprocessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PhaseRunner for SubprocessRunner {
    /// Spawn the phase and block until it exits.
    ///
    /// # Errors
    /// Returns `ProcessError` if:
    /// - The program cannot be spawned
    /// - Waiting on the child fails
    /// - The invocation's timeout elapses (the child is killed first)
    async fn run(&self, invocation: &Invocation) -> Result<PhaseOutcome, ProcessError> {
        debug!(command = %invocation.display(), "spawning phase process");

        let mut child = invocation
            .tokio_command()
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        let waited = match invocation.timeout {
            Some(limit) => match timeout(limit, child.wait()).await {
                Ok(waited) => waited,
                Err(_) => {
                    warn!(
                        command = %invocation.display(),
                        "phase exceeded {}s, killing it",
                        limit.as_secs()
                    );
                    if let Err(e) = child.kill().await {
                        warn!("failed to kill timed out phase: {}", e);
                    }
                    return Err(ProcessError::Timeout(limit.as_secs()));
                }
            },
            None => child.wait().await,
        };

        let status = waited.map_err(|source| ProcessError::Wait {
            program: invocation.program.clone(),
            source,
        })?;

        let outcome = PhaseOutcome::from_status(status);
        if !outcome.success() {
            warn!(
                command = %invocation.display(),
                "phase exited with code {}",
                outcome.shell_code()
            );
        }
        Ok(outcome)
    }

    async fn hand_off(
        &self,
        invocation: &Invocation,
        mode: HandoffMode,
    ) -> Result<PhaseOutcome, ProcessError> {
        handoff::hand_off(invocation, mode).await
    }
}

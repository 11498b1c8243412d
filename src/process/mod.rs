//! Process execution for startup phases

pub mod handoff;
pub mod invocation;
pub mod outcome;
pub mod subprocess;

use crate::core::config::HandoffMode;
use async_trait::async_trait;
pub use invocation::Invocation;
pub use outcome::{PhaseOutcome, ProcessError};
pub use subprocess::SubprocessRunner;

/// Trait for phase execution - allows for different implementations
#[async_trait]
pub trait PhaseRunner: Send + Sync {
    /// Run a blocking phase to completion
    async fn run(&self, invocation: &Invocation) -> Result<PhaseOutcome, ProcessError>;

    /// Hand the process over to the final phase.
    ///
    /// Real implementations in [`HandoffMode::Exec`] never return `Ok`.
    async fn hand_off(
        &self,
        invocation: &Invocation,
        mode: HandoffMode,
    ) -> Result<PhaseOutcome, ProcessError>;
}

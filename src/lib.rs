//! launcher - container startup sequencer and image builder
//!
//! Runs database migrations, then data import, then hands the process over
//! to the bot. Any failing step stops the sequence and its exit code becomes
//! the container's.

pub mod cli;
pub mod core;
pub mod execution;
pub mod image;
pub mod persistence;
pub mod process;

// Re-export commonly used types
pub use core::{HandoffMode, LauncherConfig, PhaseKind, Sequence, SequenceState, StartupError};
pub use execution::{ExecutionEvent, SequenceEngine};
pub use image::{ImageBuilder, PrepareStage};
pub use process::{Invocation, PhaseOutcome, PhaseRunner, ProcessError, SubprocessRunner};

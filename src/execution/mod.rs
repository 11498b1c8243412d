//! Startup execution engine

pub mod engine;
pub mod executor;

pub use engine::{EventHandler, ExecutionEvent, SequenceEngine};
pub use executor::{ExecutionResult, PhaseExecutor};

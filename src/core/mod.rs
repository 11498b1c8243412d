//! Core domain models for the launcher
//!
//! This module defines the startup sequence, its phases, the state
//! machine they move through, and how failures map to exit codes.

pub mod config;
pub mod context;
pub mod error;
pub mod phase;
pub mod sequence;
pub mod state;

pub use config::{HandoffMode, LauncherConfig};
pub use context::*;
pub use error::*;
pub use phase::*;
pub use sequence::*;
pub use state::*;

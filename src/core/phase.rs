//! Phase domain model

use crate::core::{
    config::PhaseConfig,
    context::LaunchContext,
    error::StartupError,
    state::PhaseState,
};
use crate::process::Invocation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The three fixed startup phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Migrate,
    Import,
    Run,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; 3] = [PhaseKind::Migrate, PhaseKind::Import, PhaseKind::Run];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Migrate => "migrate",
            PhaseKind::Import => "import",
            PhaseKind::Run => "run",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        PhaseKind::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Marker printed when the config does not override it
    pub fn default_marker(&self) -> &'static str {
        match self {
            PhaseKind::Migrate => "Running database migrations...",
            PhaseKind::Import => "Importing data...",
            PhaseKind::Run => "Starting bot...",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single startup phase with its rendered command line
#[derive(Debug, Clone)]
pub struct Phase {
    pub kind: PhaseKind,

    /// Program to run
    pub command: String,

    /// Arguments with placeholders already substituted
    pub args: Vec<String>,

    /// Progress marker printed before the phase starts
    pub marker: String,

    /// Optional kill deadline
    pub timeout_secs: Option<u64>,

    /// Runtime state
    pub state: PhaseState,
}

impl Phase {
    /// Build a phase from config, rendering placeholders against `context`.
    ///
    /// Every unresolved placeholder is reported in one `Config` error.
    pub fn from_config(
        kind: PhaseKind,
        config: &PhaseConfig,
        context: &LaunchContext,
    ) -> Result<Self, StartupError> {
        let mut missing = Vec::new();
        let mut render = |template: &str| match context.render(template) {
            Ok(rendered) => rendered,
            Err(names) => {
                missing.extend(names);
                template.to_string()
            }
        };

        let command = render(&config.command);
        let args: Vec<String> = config.args.iter().map(|arg| render(arg)).collect();

        if !missing.is_empty() {
            missing.sort();
            missing.dedup();
            return Err(StartupError::Config(format!(
                "phase '{}' references undefined variable(s): {}",
                kind,
                missing.join(", ")
            )));
        }

        Ok(Phase {
            kind,
            command,
            args,
            marker: config
                .marker
                .clone()
                .unwrap_or_else(|| kind.default_marker().to_string()),
            timeout_secs: config.timeout_secs,
            state: PhaseState::Pending,
        })
    }

    /// The process invocation for this phase
    pub fn invocation(&self, context: &LaunchContext) -> Invocation {
        let mut invocation = Invocation::new(self.command.clone())
            .with_args(self.args.clone())
            .with_env(context.env.clone());
        if let Some(dir) = &context.workdir {
            invocation = invocation.with_workdir(dir.clone());
        }
        if let Some(secs) = self.timeout_secs {
            invocation = invocation.with_timeout(Duration::from_secs(secs));
        }
        invocation
    }

    /// Human-readable command line
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

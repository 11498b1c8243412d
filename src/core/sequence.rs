//! Startup sequence domain model

use crate::core::{
    config::{HandoffMode, LauncherConfig},
    context::LaunchContext,
    error::StartupError,
    phase::{Phase, PhaseKind},
    state::SequenceState,
};
use crate::process::Invocation;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Command-line overrides layered on top of the config file
#[derive(Debug, Clone, Default)]
pub struct SequenceOverrides {
    pub variables: Vec<(String, String)>,
    pub env: Vec<(String, String)>,
    pub handoff: Option<HandoffMode>,
}

/// One startup attempt: migrate, import, run
#[derive(Debug, Clone)]
pub struct Sequence {
    /// Unique id of this attempt
    pub run_id: Uuid,

    pub name: String,

    migrate: Phase,
    import: Phase,
    run: Phase,

    /// Variables checked before migration starts
    pub required_env: Vec<String>,

    pub handoff: HandoffMode,

    pub context: LaunchContext,

    pub state: SequenceState,

    pub started_at: Option<DateTime<Utc>>,

    pub finished_at: Option<DateTime<Utc>>,
}

impl Sequence {
    /// Create a sequence from configuration and CLI overrides
    pub fn from_config(
        config: &LauncherConfig,
        overrides: &SequenceOverrides,
    ) -> Result<Self, StartupError> {
        let mut context = LaunchContext::new();
        context.variables.extend(config.variables.clone());
        context.env.extend(config.env.clone());
        context.workdir = config.workdir.clone();

        for (key, value) in &overrides.variables {
            context.set_variable(key.clone(), value.clone());
        }
        for (key, value) in &overrides.env {
            if !crate::core::config::is_valid_env_name(key) {
                return Err(StartupError::Config(format!(
                    "'{}' is not a valid environment variable name",
                    key
                )));
            }
            context.set_env(key.clone(), value.clone());
        }

        let migrate = Phase::from_config(PhaseKind::Migrate, &config.phases.migrate, &context)?;
        let import = Phase::from_config(PhaseKind::Import, &config.phases.import, &context)?;
        let run = Phase::from_config(PhaseKind::Run, &config.phases.run, &context)?;

        Ok(Sequence {
            run_id: Uuid::new_v4(),
            name: config.name.clone(),
            migrate,
            import,
            run,
            required_env: config.required_env.clone(),
            handoff: overrides.handoff.unwrap_or(config.handoff),
            context,
            state: SequenceState::Init,
            started_at: None,
            finished_at: None,
        })
    }

    pub fn phase(&self, kind: PhaseKind) -> &Phase {
        match kind {
            PhaseKind::Migrate => &self.migrate,
            PhaseKind::Import => &self.import,
            PhaseKind::Run => &self.run,
        }
    }

    pub fn phase_mut(&mut self, kind: PhaseKind) -> &mut Phase {
        match kind {
            PhaseKind::Migrate => &mut self.migrate,
            PhaseKind::Import => &mut self.import,
            PhaseKind::Run => &mut self.run,
        }
    }

    /// Phases in execution order
    pub fn phases(&self) -> [&Phase; 3] {
        [&self.migrate, &self.import, &self.run]
    }

    /// Move the state machine forward, rejecting skipped or backward steps
    pub fn advance(&mut self, next: SequenceState) -> Result<(), StartupError> {
        if !self.state.can_transition_to(&next) {
            return Err(StartupError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn invocation(&self, kind: PhaseKind) -> Invocation {
        self.phase(kind).invocation(&self.context)
    }

    /// Required variables that are unset or empty.
    ///
    /// The phase environment wins over `lookup`, same as for the children.
    pub fn missing_env<F>(&self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.required_env
            .iter()
            .filter(|name| {
                self.context
                    .resolve_env(name, &lookup)
                    .map_or(true, |value| value.is_empty())
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_default_config() {
        let sequence =
            Sequence::from_config(&LauncherConfig::default(), &SequenceOverrides::default()).unwrap();

        let order: Vec<PhaseKind> = sequence.phases().iter().map(|p| p.kind).collect();
        assert_eq!(order, PhaseKind::ALL);
        assert_eq!(sequence.phase(PhaseKind::Migrate).command_line(), "alembic upgrade head");
        assert_eq!(sequence.state, SequenceState::Init);
    }

    #[test]
    fn test_overrides_win() {
        let config = LauncherConfig::from_yaml(
            r#"
variables:
  revision: "head"
phases:
  migrate:
    command: "alembic"
    args: ["upgrade", "{{ revision }}"]
handoff: exec
"#,
        )
        .unwrap();
        let overrides = SequenceOverrides {
            variables: vec![("revision".to_string(), "base".to_string())],
            env: vec![("DB_HOST".to_string(), "localhost".to_string())],
            handoff: Some(HandoffMode::Supervise),
        };

        let sequence = Sequence::from_config(&config, &overrides).unwrap();
        assert_eq!(sequence.phase(PhaseKind::Migrate).args, vec!["upgrade", "base"]);
        assert_eq!(sequence.context.env.get("DB_HOST"), Some(&"localhost".to_string()));
        assert_eq!(sequence.handoff, HandoffMode::Supervise);
    }

    #[test]
    fn test_invalid_env_override_rejected() {
        let overrides = SequenceOverrides {
            env: vec![("NOT VALID".to_string(), "x".to_string())],
            ..Default::default()
        };
        let result = Sequence::from_config(&LauncherConfig::default(), &overrides);
        assert!(matches!(result, Err(StartupError::Config(_))));
    }

    #[test]
    fn test_advance_rejects_skips() {
        let mut sequence =
            Sequence::from_config(&LauncherConfig::default(), &SequenceOverrides::default()).unwrap();

        assert!(sequence.advance(SequenceState::Importing).is_err());
        sequence.advance(SequenceState::Migrating).unwrap();
        assert!(sequence.advance(SequenceState::Running).is_err());
        sequence.advance(SequenceState::Importing).unwrap();
        sequence.advance(SequenceState::Running).unwrap();
        assert!(sequence.finished_at.is_none());
        sequence.advance(SequenceState::Exited { code: 0 }).unwrap();
        assert!(sequence.finished_at.is_some());
    }

    #[test]
    fn test_missing_env() {
        let mut config = LauncherConfig::default();
        config.required_env = vec![
            "BOT_TOKEN".to_string(),
            "DB_PASSWORD".to_string(),
            "DB_HOST".to_string(),
        ];
        config.env.insert("DB_HOST".to_string(), "db".to_string());
        let sequence = Sequence::from_config(&config, &SequenceOverrides::default()).unwrap();

        let lookup = |name: &str| match name {
            "BOT_TOKEN" => Some("123:abc".to_string()),
            "DB_PASSWORD" => Some(String::new()),
            _ => None,
        };

        assert_eq!(sequence.missing_env(lookup), vec!["DB_PASSWORD"]);
    }
}

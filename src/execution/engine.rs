//! Main execution engine - orchestrates the startup sequence

use crate::{
    core::{
        HandoffMode, PhaseKind, PhaseState, Sequence, SequenceState, StartupError,
    },
    execution::{ExecutionResult, PhaseExecutor},
    persistence::{create_summary, PersistenceBackend},
    process::{PhaseOutcome, PhaseRunner},
};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during a startup
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    SequenceStarted {
        run_id: Uuid,
        name: String,
    },
    PreflightFailed {
        missing: Vec<String>,
    },
    /// Emitted exactly once per phase, before its process starts
    PhaseStarted {
        phase: PhaseKind,
        marker: String,
    },
    PhaseCompleted {
        phase: PhaseKind,
        exit_code: i32,
    },
    PhaseFailed {
        phase: PhaseKind,
        exit_code: i32,
        error: String,
    },
    HandingOff {
        mode: HandoffMode,
        command: String,
    },
    SequenceFinished {
        run_id: Uuid,
        state: SequenceState,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Runs migrate, import and the run handoff, stopping at the first failure
pub struct SequenceEngine<R> {
    executor: PhaseExecutor<R>,
    event_handlers: Mutex<Vec<EventHandler>>,
    history: Option<Arc<dyn PersistenceBackend>>,
    env_lookup: EnvLookup,
}

impl<R: PhaseRunner> SequenceEngine<R> {
    pub fn new(runner: R) -> Self {
        Self {
            executor: PhaseExecutor::new(runner),
            event_handlers: Mutex::new(Vec::new()),
            history: None,
            env_lookup: Box::new(|name| std::env::var(name).ok()),
        }
    }

    /// Record every attempt in `store`
    pub fn with_history(mut self, store: Arc<dyn PersistenceBackend>) -> Self {
        self.history = Some(store);
        self
    }

    /// Replace the environment used for the required-variable preflight
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env_lookup = Box::new(lookup);
        self
    }

    /// Add an event handler.
    ///
    /// Handlers run synchronously, in registration order, on the engine's
    /// task; a `PhaseStarted` handler finishes before the phase spawns.
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::new(handler));
    }

    fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self
            .event_handlers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for handler in handlers.iter() {
            handler(&event);
        }
    }

    /// Execute the whole sequence.
    ///
    /// In exec handoff mode a real runner does not return once the bot is
    /// launched. Otherwise the bot's outcome is returned, with a non-zero
    /// exit mapped to [`StartupError::Runtime`].
    pub async fn start(&self, sequence: &mut Sequence) -> Result<PhaseOutcome, StartupError> {
        let run_id = sequence.run_id;
        info!("Starting sequence: {} ({})", sequence.name, run_id);
        sequence.started_at = Some(Utc::now());
        self.emit_event(ExecutionEvent::SequenceStarted {
            run_id,
            name: sequence.name.clone(),
        });

        let missing = sequence.missing_env(|name| (self.env_lookup)(name));
        if !missing.is_empty() {
            let error = StartupError::Config(format!(
                "required environment variable(s) not set: {}",
                missing.join(", ")
            ));
            error!("{}", error);
            self.emit_event(ExecutionEvent::PreflightFailed { missing });
            self.record(sequence, Some(&error)).await;
            return Err(error);
        }

        for kind in [PhaseKind::Migrate, PhaseKind::Import] {
            self.run_phase(sequence, kind).await?;
        }

        self.run_final(sequence).await
    }

    /// Mark the phase running and print its marker
    fn begin_phase(&self, sequence: &mut Sequence, kind: PhaseKind) -> DateTime<Utc> {
        let started_at = Utc::now();
        let phase = sequence.phase_mut(kind);
        phase.state = PhaseState::Running { started_at };
        let marker = phase.marker.clone();
        self.emit_event(ExecutionEvent::PhaseStarted { phase: kind, marker });
        started_at
    }

    async fn run_phase(&self, sequence: &mut Sequence, kind: PhaseKind) -> Result<(), StartupError> {
        sequence.advance(SequenceState::entering(kind))?;
        let started_at = self.begin_phase(sequence, kind);

        let invocation = sequence.invocation(kind);
        match self.executor.execute(kind, &invocation).await {
            ExecutionResult::Success { outcome } => {
                let exit_code = outcome.shell_code();
                sequence.phase_mut(kind).state = PhaseState::Completed {
                    exit_code,
                    started_at,
                    completed_at: Utc::now(),
                };
                self.emit_event(ExecutionEvent::PhaseCompleted {
                    phase: kind,
                    exit_code,
                });
                Ok(())
            }
            ExecutionResult::Failed { error } => {
                Err(self.fail_phase(sequence, kind, started_at, error).await)
            }
        }
    }

    async fn run_final(&self, sequence: &mut Sequence) -> Result<PhaseOutcome, StartupError> {
        sequence.advance(SequenceState::Running)?;
        let started_at = self.begin_phase(sequence, PhaseKind::Run);

        let invocation = sequence.invocation(PhaseKind::Run);
        let mode = sequence.handoff;

        if mode == HandoffMode::Exec {
            // Last chance to write history: a successful exec never returns
            sequence.phase_mut(PhaseKind::Run).state = PhaseState::HandedOff { at: Utc::now() };
            self.record(sequence, None).await;
        }

        self.emit_event(ExecutionEvent::HandingOff {
            mode,
            command: invocation.display(),
        });

        match self.executor.hand_off(&invocation, mode).await {
            Ok(outcome) => {
                let exit_code = outcome.shell_code();
                let now = Utc::now();
                sequence.phase_mut(PhaseKind::Run).state = if outcome.success() {
                    PhaseState::Completed {
                        exit_code,
                        started_at,
                        completed_at: now,
                    }
                } else {
                    PhaseState::Failed {
                        error: format!("bot exited with code {}", exit_code),
                        exit_code,
                        started_at,
                        failed_at: now,
                    }
                };
                sequence.advance(SequenceState::Exited { code: exit_code })?;

                info!("Sequence finished: {} - bot exited with {}", sequence.name, exit_code);
                self.emit_event(ExecutionEvent::SequenceFinished {
                    run_id: sequence.run_id,
                    state: sequence.state,
                });

                if outcome.success() {
                    self.record(sequence, None).await;
                    Ok(outcome)
                } else {
                    let error = StartupError::Runtime { code: exit_code };
                    self.record(sequence, Some(&error)).await;
                    Err(error)
                }
            }
            Err(source) => {
                let error = StartupError::Launch {
                    phase: PhaseKind::Run,
                    source,
                };
                Err(self.fail_phase(sequence, PhaseKind::Run, started_at, error).await)
            }
        }
    }

    async fn fail_phase(
        &self,
        sequence: &mut Sequence,
        kind: PhaseKind,
        started_at: DateTime<Utc>,
        error: StartupError,
    ) -> StartupError {
        let exit_code = error.exit_code();
        sequence.phase_mut(kind).state = PhaseState::Failed {
            error: error.to_string(),
            exit_code,
            started_at,
            failed_at: Utc::now(),
        };
        if let Err(transition) = sequence.advance(SequenceState::Failed {
            phase: kind,
            code: exit_code,
        }) {
            return transition;
        }

        error!("Sequence failed in {} phase: {}", kind, error);
        self.emit_event(ExecutionEvent::PhaseFailed {
            phase: kind,
            exit_code,
            error: error.to_string(),
        });
        self.emit_event(ExecutionEvent::SequenceFinished {
            run_id: sequence.run_id,
            state: sequence.state,
        });
        self.record(sequence, Some(&error)).await;
        error
    }

    /// Save a history record; failures are logged, never fatal
    async fn record(&self, sequence: &Sequence, error: Option<&StartupError>) {
        if let Some(store) = &self.history {
            let summary = create_summary(sequence, error);
            if let Err(e) = store.save_run(&summary).await {
                warn!("Failed to save startup history: {:#}", e);
            }
        }
    }
}

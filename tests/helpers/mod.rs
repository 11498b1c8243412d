//! Test utility functions for the launcher

#![allow(dead_code)]

use async_trait::async_trait;
use launcher::core::{LauncherConfig, PhaseKind, PhaseState, Sequence, SequenceOverrides};
use launcher::execution::{ExecutionEvent, SequenceEngine};
use launcher::persistence::PersistenceBackend;
use launcher::{HandoffMode, Invocation, PhaseOutcome, PhaseRunner, ProcessError, StartupError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// One call the engine made into the runner
#[derive(Debug, Clone)]
pub struct Call {
    pub invocation: Invocation,
    /// Set for the final handoff, `None` for blocking phases
    pub handoff: Option<HandoffMode>,
}

/// Mock runner that replays scripted outcomes in call order.
///
/// Calls past the end of the script succeed with exit code 0.
pub struct MockRunner {
    replies: Mutex<VecDeque<Result<PhaseOutcome, ProcessError>>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl MockRunner {
    pub fn new(replies: Vec<Result<PhaseOutcome, ProcessError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every phase exits 0
    pub fn succeeding() -> Self {
        Self::new(Vec::new())
    }

    /// Phases exit with `codes`, in order
    pub fn with_codes(codes: &[i32]) -> Self {
        Self::new(codes.iter().map(|c| Ok(PhaseOutcome::exited(*c))).collect())
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<Call>>> {
        self.calls.clone()
    }

    fn reply(&self, call: Call) -> Result<PhaseOutcome, ProcessError> {
        self.calls.lock().unwrap().push(call);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(PhaseOutcome::exited(0)))
    }
}

#[async_trait]
impl PhaseRunner for MockRunner {
    async fn run(&self, invocation: &Invocation) -> Result<PhaseOutcome, ProcessError> {
        self.reply(Call {
            invocation: invocation.clone(),
            handoff: None,
        })
    }

    async fn hand_off(
        &self,
        invocation: &Invocation,
        mode: HandoffMode,
    ) -> Result<PhaseOutcome, ProcessError> {
        self.reply(Call {
            invocation: invocation.clone(),
            handoff: Some(mode),
        })
    }
}

/// Result of running a sequence against a mock runner
pub struct StartupRun {
    pub result: Result<PhaseOutcome, StartupError>,
    pub sequence: Sequence,
    pub events: Vec<ExecutionEvent>,
    pub calls: Vec<Call>,
}

impl StartupRun {
    /// Progress markers in the order they were emitted
    pub fn markers(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ExecutionEvent::PhaseStarted { marker, .. } => Some(marker.clone()),
                _ => None,
            })
            .collect()
    }

    /// Rendered command lines the runner received
    pub fn commands(&self) -> Vec<String> {
        self.calls.iter().map(|c| c.invocation.display()).collect()
    }

    pub fn exit_code(&self) -> i32 {
        match &self.result {
            Ok(outcome) => outcome.shell_code(),
            Err(e) => e.exit_code(),
        }
    }

    pub fn phase_state(&self, kind: PhaseKind) -> &PhaseState {
        &self.sequence.phase(kind).state
    }
}

/// Options for [`run_sequence_with`]
#[derive(Default)]
pub struct RunOptions {
    pub overrides: SequenceOverrides,
    /// Environment seen by the preflight check; `None` means the real one
    pub env: Option<HashMap<String, String>>,
    pub history: Option<Arc<dyn PersistenceBackend>>,
}

pub fn config(yaml: &str) -> LauncherConfig {
    LauncherConfig::from_yaml(yaml).expect("test config should parse")
}

/// Run the default-configured sequence with `runner`
pub async fn run_sequence(yaml: &str, runner: MockRunner) -> StartupRun {
    run_sequence_with(yaml, runner, RunOptions::default()).await
}

pub async fn run_sequence_with(yaml: &str, runner: MockRunner, options: RunOptions) -> StartupRun {
    let calls = runner.calls();
    let mut sequence = Sequence::from_config(&config(yaml), &options.overrides)
        .expect("test sequence should build");

    let mut engine = SequenceEngine::new(runner);
    if let Some(env) = options.env {
        engine = engine.with_env_lookup(move |name| env.get(name).cloned());
    }
    if let Some(store) = options.history {
        engine = engine.with_history(store);
    }

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine.add_event_handler(move |event| sink.lock().unwrap().push(event.clone()));

    let result = engine.start(&mut sequence).await;

    let events = events.lock().unwrap().clone();
    let calls = calls.lock().unwrap().clone();
    StartupRun {
        result,
        sequence,
        events,
        calls,
    }
}

pub fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
    Some(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

pub const DEFAULT_MARKERS: [&str; 3] = [
    "Running database migrations...",
    "Importing data...",
    "Starting bot...",
];

/// Temporary project directory with a `launcher.yaml`, for driving the binary
pub struct Workspace {
    pub dir: tempfile::TempDir,
}

impl Workspace {
    pub fn new(config_yaml: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(dir.path().join("launcher.yaml"), config_yaml).expect("write config");
        Self { dir }
    }

    pub fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, content: &str) -> std::path::PathBuf {
        let path = self.path(name);
        std::fs::write(&path, content).expect("write fixture");
        path
    }

    /// `launcher -c launcher.yaml <args>` run from the workspace
    pub fn launcher(&self, args: &[&str]) -> std::process::Command {
        let mut cmd = std::process::Command::new(env!("CARGO_BIN_EXE_launcher"));
        cmd.current_dir(self.dir.path())
            .env_remove("LAUNCHER_CONFIG")
            .env_remove("RUST_LOG")
            .arg("-c")
            .arg("launcher.yaml")
            .args(args);
        cmd
    }
}

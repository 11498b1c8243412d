//! Launcher configuration from YAML

use crate::core::phase::PhaseKind;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "launcher.yaml";

/// How the run phase takes over once migrate and import succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandoffMode {
    /// Replace the launcher process image with the bot (`execve`)
    Exec,
    /// Spawn the bot as a child, forward signals, mirror its exit code
    Supervise,
}

impl Default for HandoffMode {
    fn default() -> Self {
        if cfg!(unix) {
            HandoffMode::Exec
        } else {
            HandoffMode::Supervise
        }
    }
}

/// Top-level launcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Name used in logs and history
    #[serde(default = "default_name")]
    pub name: String,

    /// Working directory for every phase (defaults to the launcher's own)
    #[serde(default)]
    pub workdir: Option<PathBuf>,

    /// Values for `{{ name }}` placeholders in phase arguments
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    /// Extra environment applied to every phase
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Variables that must be set and non-empty before migration starts
    #[serde(default)]
    pub required_env: Vec<String>,

    #[serde(default)]
    pub phases: PhasesConfig,

    #[serde(default)]
    pub handoff: HandoffMode,

    #[serde(default)]
    pub image: ImageConfig,

    #[serde(default)]
    pub history: HistoryConfig,
}

/// The three fixed phases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhasesConfig {
    #[serde(default = "default_migrate")]
    pub migrate: PhaseConfig,

    #[serde(default = "default_import")]
    pub import: PhaseConfig,

    #[serde(default = "default_run")]
    pub run: PhaseConfig,
}

/// One external command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Program to execute, looked up on PATH
    pub command: String,

    /// Arguments, may contain `{{ name }}` placeholders
    #[serde(default)]
    pub args: Vec<String>,

    /// Progress marker printed before the phase starts
    #[serde(default)]
    pub marker: Option<String>,

    /// Kill the phase after this many seconds (migrate and import only)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Build-time settings for `prepare` and `containerfile`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_base_image")]
    pub base_image: String,

    /// Directory inside the image holding the source tree
    #[serde(default = "default_image_workdir")]
    pub workdir: String,

    /// Dependency manifest, relative to the source tree
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,

    /// Installer command line, run from the source tree.
    ///
    /// Defaults to `pip install --no-cache-dir -r <manifest>`.
    #[serde(default)]
    pub install: Option<Vec<String>>,

    /// Optional entry script to normalize and mark executable
    #[serde(default)]
    pub entrypoint: Option<PathBuf>,

    /// Image the launcher binary is copied from
    #[serde(default = "default_launcher_from")]
    pub launcher_from: String,
}

/// Startup history settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default)]
    pub enabled: bool,

    /// SQLite file; defaults to the user data directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_name() -> String {
    "bot".to_string()
}

fn default_migrate() -> PhaseConfig {
    PhaseConfig {
        command: "alembic".to_string(),
        args: vec!["upgrade".to_string(), "head".to_string()],
        marker: None,
        timeout_secs: None,
    }
}

fn default_import() -> PhaseConfig {
    PhaseConfig {
        command: "python".to_string(),
        args: vec!["scripts/import_data.py".to_string()],
        marker: None,
        timeout_secs: None,
    }
}

fn default_run() -> PhaseConfig {
    PhaseConfig {
        command: "python".to_string(),
        args: vec!["bot.py".to_string()],
        marker: None,
        timeout_secs: None,
    }
}

fn default_base_image() -> String {
    "python:3.11-slim".to_string()
}

fn default_image_workdir() -> String {
    "/app".to_string()
}

fn default_manifest() -> PathBuf {
    PathBuf::from("requirements.txt")
}

fn default_launcher_from() -> String {
    "launcher:latest".to_string()
}

impl Default for PhasesConfig {
    fn default() -> Self {
        Self {
            migrate: default_migrate(),
            import: default_import(),
            run: default_run(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base_image: default_base_image(),
            workdir: default_image_workdir(),
            manifest: default_manifest(),
            install: None,
            entrypoint: None,
            launcher_from: default_launcher_from(),
        }
    }
}

impl ImageConfig {
    /// Installer command line for this image's manifest
    pub fn install_command(&self) -> Vec<String> {
        match &self.install {
            Some(install) => install.clone(),
            None => vec![
                "pip".to_string(),
                "install".to_string(),
                "--no-cache-dir".to_string(),
                "-r".to_string(),
                self.manifest.display().to_string(),
            ],
        }
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            workdir: None,
            variables: BTreeMap::new(),
            env: BTreeMap::new(),
            required_env: Vec::new(),
            phases: PhasesConfig::default(),
            handoff: HandoffMode::default(),
            image: ImageConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl PhasesConfig {
    pub fn get(&self, kind: PhaseKind) -> &PhaseConfig {
        match kind {
            PhaseKind::Migrate => &self.migrate,
            PhaseKind::Import => &self.import,
            PhaseKind::Run => &self.run,
        }
    }
}

/// Matches POSIX-style environment variable names
pub fn is_valid_env_name(name: &str) -> bool {
    static ENV_NAME: OnceLock<Regex> = OnceLock::new();
    ENV_NAME
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"))
        .is_match(name)
}

impl LauncherConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: LauncherConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config source.
    ///
    /// An explicit path must exist. Without one, `launcher.yaml` in the
    /// current directory is used if present, else the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Config name must not be empty");
        }

        for kind in PhaseKind::ALL {
            let phase = self.phases.get(kind);
            if phase.command.trim().is_empty() {
                anyhow::bail!("Phase '{}' has an empty command", kind);
            }
            match phase.timeout_secs {
                Some(0) => anyhow::bail!("Phase '{}' timeout_secs must be greater than zero", kind),
                Some(_) if kind == PhaseKind::Run => {
                    anyhow::bail!("Phase 'run' does not support timeout_secs")
                }
                _ => {}
            }
        }

        for name in &self.required_env {
            if !is_valid_env_name(name) {
                anyhow::bail!("required_env entry '{}' is not a valid variable name", name);
            }
        }

        for key in self.env.keys() {
            if !is_valid_env_name(key) {
                anyhow::bail!("env key '{}' is not a valid variable name", key);
            }
        }

        if self.image.manifest.is_absolute()
            || self
                .image
                .manifest
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            anyhow::bail!(
                "image.manifest '{}' must be a path inside the source tree",
                self.image.manifest.display()
            );
        }

        if let Some(install) = &self.image.install {
            if install.first().map_or(true, |program| program.trim().is_empty()) {
                anyhow::bail!("image.install must name an installer command");
            }
        }

        Ok(())
    }
}

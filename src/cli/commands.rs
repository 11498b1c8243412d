//! CLI command definitions

use crate::core::HandoffMode;
use crate::image::PrepareStage;
use clap::Args;
use std::path::PathBuf;

/// Run the startup sequence
#[derive(Debug, Args, Clone)]
pub struct StartCommand {
    /// Print the resolved commands and exit without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Variable overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub variable: Vec<(String, String)>,

    /// Extra environment for every phase (KEY=VALUE)
    #[arg(long, value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// How to start the bot once migrate and import succeeded
    #[arg(long, value_enum)]
    pub handoff: Option<HandoffModeArg>,

    /// Record this attempt in the startup history
    #[arg(long)]
    pub history: bool,
}

/// Prepare the source tree at image build time
#[derive(Debug, Args, Clone)]
pub struct PrepareCommand {
    /// Which part of the preparation to run
    #[arg(long, value_enum, default_value_t = StageArg::All)]
    pub stage: StageArg,

    /// Normalize files but do not run the installer
    #[arg(long)]
    pub skip_install: bool,

    /// Source tree to prepare
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

/// Print the image definition
#[derive(Debug, Args, Clone)]
pub struct ContainerfileCommand {
    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Validate the configuration and dependency manifest
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Fail if any requirement is not pinned to an exact version
    #[arg(long)]
    pub strict_pins: bool,

    /// Source tree holding the manifest
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

/// Show startup history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Number of recent startups to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show a single startup by ID
    #[arg(long)]
    pub run_id: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Handoff mode argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum HandoffModeArg {
    Exec,
    Supervise,
}

impl From<HandoffModeArg> for HandoffMode {
    fn from(arg: HandoffModeArg) -> Self {
        match arg {
            HandoffModeArg::Exec => HandoffMode::Exec,
            HandoffModeArg::Supervise => HandoffMode::Supervise,
        }
    }
}

/// Prepare stage argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StageArg {
    Deps,
    Assets,
    All,
}

impl From<StageArg> for PrepareStage {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Deps => PrepareStage::Deps,
            StageArg::Assets => PrepareStage::Assets,
            StageArg::All => PrepareStage::All,
        }
    }
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}

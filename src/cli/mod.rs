//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{
    ContainerfileCommand, HistoryCommand, PrepareCommand, StartCommand, ValidateCommand,
};
use std::ffi::OsString;
use std::path::PathBuf;

/// Container startup sequencer: migrate, import, then hand off to the bot
#[derive(Debug, Parser, Clone)]
#[command(name = "launcher")]
#[command(version)]
#[command(about = "Runs database migrations and data import, then starts the bot", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to launcher configuration file
    #[arg(short, long, global = true, env = "LAUNCHER_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run migrate, import and the bot (the image's default command)
    Start(StartCommand),

    /// Prepare the source tree at image build time
    Prepare(PrepareCommand),

    /// Print the image definition
    Containerfile(ContainerfileCommand),

    /// Validate the configuration and dependency manifest
    Validate(ValidateCommand),

    /// Show startup history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

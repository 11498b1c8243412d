use anyhow::{Context, Result};
use launcher::cli::commands::{
    ContainerfileCommand, HistoryCommand, PrepareCommand, StartCommand, ValidateCommand,
};
use launcher::cli::output::*;
use launcher::cli::{Cli, Command};
use launcher::core::config::DEFAULT_CONFIG_FILE;
use launcher::core::{LauncherConfig, Sequence, SequenceOverrides, StartupError};
use launcher::execution::SequenceEngine;
use launcher::image::{containerfile, DependencyManifest, ImageBuilder};
use launcher::persistence::PersistenceBackend;
use launcher::process::SubprocessRunner;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() {
    let cli = Cli::from_args();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("{:#}", e);
    }

    let result = match &cli.command {
        Command::Start(cmd) => start(&cli, cmd).await,
        Command::Prepare(cmd) => prepare(&cli, cmd).await,
        Command::Containerfile(cmd) => render_containerfile(&cli, cmd),
        Command::Validate(cmd) => validate(&cli, cmd),
        Command::History(cmd) => show_history(&cli, cmd).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        let code = e
            .downcast_ref::<StartupError>()
            .map(StartupError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

/// Logs go to stderr; stdout carries only the progress markers
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")
}

fn load_config(cli: &Cli) -> Result<LauncherConfig, StartupError> {
    LauncherConfig::load(cli.config.as_deref())
        .map_err(|e| StartupError::Config(format!("{:#}", e)))
}

/// Config file to bake into the image, if any
fn config_source(cli: &Cli) -> Option<PathBuf> {
    cli.config.clone().or_else(|| {
        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        fallback.exists().then(|| fallback.to_path_buf())
    })
}

async fn start(cli: &Cli, cmd: &StartCommand) -> Result<()> {
    let config = load_config(cli)?;

    let overrides = SequenceOverrides {
        variables: cmd.variable.clone(),
        env: cmd.env.clone(),
        handoff: cmd.handoff.map(Into::into),
    };
    let mut sequence = Sequence::from_config(&config, &overrides)?;

    if cmd.dry_run {
        println!("{}", format_plan(&sequence));
        return Ok(());
    }

    let mut engine = SequenceEngine::new(SubprocessRunner::new());
    if cmd.history || config.history.enabled {
        if let Some(store) = open_history(&config).await {
            engine = engine.with_history(store);
        }
    }
    engine.add_event_handler(print_execution_event);

    engine.start(&mut sequence).await?;
    Ok(())
}

/// History is best effort: a store that cannot be opened is skipped
#[cfg(feature = "sqlite")]
async fn open_history(config: &LauncherConfig) -> Option<Arc<dyn PersistenceBackend>> {
    use launcher::persistence::SqliteStartupStore;

    match SqliteStartupStore::open(config.history.path.as_deref()).await {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            warn!("Startup history disabled: {:#}", e);
            None
        }
    }
}

#[cfg(not(feature = "sqlite"))]
async fn open_history(_config: &LauncherConfig) -> Option<Arc<dyn PersistenceBackend>> {
    warn!("Startup history requires the 'sqlite' feature");
    None
}

async fn prepare(cli: &Cli, cmd: &PrepareCommand) -> Result<()> {
    let config = load_config(cli)?;

    let builder = ImageBuilder::new(SubprocessRunner::new(), cmd.root.clone(), config.image)
        .skip_install(cmd.skip_install);
    let report = builder.prepare(cmd.stage.into()).await?;

    println!("{}", format_prepare_report(&report));
    Ok(())
}

fn render_containerfile(cli: &Cli, cmd: &ContainerfileCommand) -> Result<()> {
    let config = load_config(cli)?;
    let context = std::env::current_dir().context("Failed to resolve the build context")?;
    let source = config_source(cli)
        .map(|path| containerfile::context_relative(&path, &context))
        .transpose()?;
    let rendered = containerfile::render(&config.image, source.as_deref());

    match &cmd.output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{}Wrote {}", CHECK, style(path.display()).bold());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

fn validate(cli: &Cli, cmd: &ValidateCommand) -> Result<()> {
    println!("{}Validating launcher configuration...", INFO);

    let checked = load_config(cli).and_then(|config| {
        let sequence = Sequence::from_config(&config, &SequenceOverrides::default())?;
        Ok((config, sequence))
    });
    let (config, sequence) = match checked {
        Ok(checked) => checked,
        Err(e) => {
            println!("{}Validation failed:", CROSS);
            println!("  {}", style(&e).red());
            return Err(e.into());
        }
    };

    println!("{}Configuration is valid!", CHECK);
    println!("{}", format_plan(&sequence));

    let manifest_path = cmd.root.join(&config.image.manifest);
    let manifest = match DependencyManifest::from_file(&manifest_path) {
        Ok(manifest) => manifest,
        Err(e) => {
            println!("{}Manifest {} is invalid:", CROSS, manifest_path.display());
            println!("  {}", style(&e).red());
            return Err(StartupError::Config(e.to_string()).into());
        }
    };
    println!(
        "{}Manifest {}",
        CHECK,
        style(manifest_path.display()).bold()
    );
    println!("{}", format_manifest(&manifest));

    if cmd.json {
        let data = serde_json::json!({ "config": config, "manifest": manifest });
        println!("\n{}", serde_json::to_string_pretty(&data)?);
    }

    let unpinned = manifest.unpinned();
    if cmd.strict_pins && !unpinned.is_empty() {
        let names: Vec<&str> = unpinned.iter().map(|r| r.name.as_str()).collect();
        return Err(StartupError::Config(format!(
            "unpinned requirement(s): {}",
            names.join(", ")
        ))
        .into());
    }

    Ok(())
}

#[cfg(feature = "sqlite")]
async fn show_history(cli: &Cli, cmd: &HistoryCommand) -> Result<()> {
    use launcher::persistence::SqliteStartupStore;

    let config = load_config(cli)?;
    let store = SqliteStartupStore::open(config.history.path.as_deref()).await?;

    let runs = match &cmd.run_id {
        Some(id) => {
            let run_id = uuid::Uuid::parse_str(id).context("Invalid run ID format")?;
            match store.load_run(run_id).await? {
                Some(run) => vec![run],
                None => {
                    println!("{}Startup {} not found", WARN, id);
                    return Ok(());
                }
            }
        }
        None => store.list_recent(cmd.limit).await?,
    };

    if cmd.json {
        let data = serde_json::json!({ "startups": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("{}No startups recorded", INFO);
        return Ok(());
    }

    println!("{}Startup history (latest {}):", INFO, runs.len());
    for run in &runs {
        println!("  {}", format_summary(run));
        if let Some(error) = &run.error {
            println!("      {}", style(error).dim());
        }
    }
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
async fn show_history(_cli: &Cli, _cmd: &HistoryCommand) -> Result<()> {
    anyhow::bail!("history requires the 'sqlite' feature")
}

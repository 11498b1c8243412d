//! Build-time preparation of the source tree

use crate::core::{config::ImageConfig, StartupError};
use crate::image::normalize::{mark_executable, normalize_file};
use crate::process::{Invocation, PhaseRunner};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Which part of the preparation to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrepareStage {
    /// Normalize the manifest and install dependencies
    Deps,
    /// Normalize the entrypoint and mark it executable
    Assets,
    #[default]
    All,
}

impl PrepareStage {
    fn includes_deps(self) -> bool {
        matches!(self, PrepareStage::Deps | PrepareStage::All)
    }

    fn includes_assets(self) -> bool {
        matches!(self, PrepareStage::Assets | PrepareStage::All)
    }
}

/// What a preparation run changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareReport {
    /// Files whose line endings were rewritten
    pub normalized: Vec<PathBuf>,
    /// Whether the installer ran and succeeded
    pub installed: bool,
    /// Entrypoint marked executable, if any
    pub executable: Option<PathBuf>,
}

/// Prepares a source tree for the runtime image
pub struct ImageBuilder<R> {
    runner: R,
    root: PathBuf,
    image: ImageConfig,
    skip_install: bool,
}

impl<R: PhaseRunner> ImageBuilder<R> {
    pub fn new(runner: R, root: impl Into<PathBuf>, image: ImageConfig) -> Self {
        Self {
            runner,
            root: root.into(),
            image,
            skip_install: false,
        }
    }

    /// Normalize the manifest without running the installer
    pub fn skip_install(mut self, skip: bool) -> Self {
        self.skip_install = skip;
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn install_invocation(&self) -> Invocation {
        let command = self.image.install_command();
        let (program, args) = match command.split_first() {
            Some((program, args)) => (program.as_str(), args),
            None => ("pip", &[][..]),
        };
        Invocation::new(program)
            .with_args(args.iter().cloned())
            .with_workdir(self.root.clone())
    }

    /// Run the requested stage.
    ///
    /// The entrypoint is only touched after a successful install, so a
    /// failed build never leaves a half-prepared tree behind.
    pub async fn prepare(&self, stage: PrepareStage) -> Result<PrepareReport, StartupError> {
        let mut report = PrepareReport::default();

        if stage.includes_deps() {
            self.prepare_deps(&mut report).await?;
        }
        if stage.includes_assets() {
            self.prepare_assets(&mut report)?;
        }

        Ok(report)
    }

    async fn prepare_deps(&self, report: &mut PrepareReport) -> Result<(), StartupError> {
        let manifest = self.resolve(&self.image.manifest);
        if normalize(&manifest)? {
            report.normalized.push(manifest.clone());
        }

        if self.skip_install {
            info!("Skipping dependency install");
            return Ok(());
        }

        let invocation = self.install_invocation();
        info!(command = %invocation.display(), "Installing dependencies");
        match self.runner.run(&invocation).await {
            Ok(outcome) if outcome.success() => {
                report.installed = true;
                Ok(())
            }
            Ok(outcome) => {
                let code = outcome.shell_code();
                error!(code, "dependency install failed");
                Err(StartupError::Build { code })
            }
            Err(e) => {
                error!("dependency installer could not run: {}", e);
                Err(StartupError::Build {
                    code: e.exit_code(),
                })
            }
        }
    }

    fn prepare_assets(&self, report: &mut PrepareReport) -> Result<(), StartupError> {
        let Some(entrypoint) = &self.image.entrypoint else {
            return Ok(());
        };
        let entrypoint = self.resolve(entrypoint);

        if normalize(&entrypoint)? {
            report.normalized.push(entrypoint.clone());
        }
        mark_executable(&entrypoint).map_err(|source| StartupError::Asset {
            path: entrypoint.clone(),
            source,
        })?;
        info!(path = %entrypoint.display(), "Marked entrypoint executable");
        report.executable = Some(entrypoint);
        Ok(())
    }
}

fn normalize(path: &Path) -> Result<bool, StartupError> {
    normalize_file(path).map_err(|source| StartupError::Asset {
        path: path.to_path_buf(),
        source,
    })
}

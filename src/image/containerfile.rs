//! Image definition rendering

use crate::core::config::{ImageConfig, DEFAULT_CONFIG_FILE};
use crate::core::StartupError;
use std::path::{Component, Path, PathBuf};

/// Where the launcher binary lives inside the image
pub const LAUNCHER_PATH: &str = "/usr/local/bin/launcher";

/// Express a config path relative to the build context.
///
/// `COPY` sources must live inside the context, so absolute paths are
/// stripped of the context prefix and anything escaping it is rejected.
pub fn context_relative(path: &Path, context: &Path) -> Result<PathBuf, StartupError> {
    let relative = if path.is_absolute() {
        path.strip_prefix(context).map_err(|_| {
            StartupError::Config(format!(
                "config file {} is outside the build context {}",
                path.display(),
                context.display()
            ))
        })?
    } else {
        path
    };

    let mut clean = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => {
                return Err(StartupError::Config(format!(
                    "config file {} is outside the build context",
                    path.display()
                )))
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(StartupError::Config(format!(
            "config path {} does not name a file",
            path.display()
        )));
    }
    Ok(clean)
}

/// Exec-form instruction arguments, e.g. `["launcher", "start"]`
fn exec_form(args: &[&str]) -> String {
    let quoted: Vec<String> = args
        .iter()
        .map(|arg| serde_json::Value::from(*arg).to_string())
        .collect();
    format!("[{}]", quoted.join(", "))
}

/// Render the image definition.
///
/// Dependencies are installed in their own layer, copied before the source
/// tree so edits to the code do not invalidate it. `config_file`, relative
/// to the build context, is copied to `launcher.yaml` in the image work dir
/// and exported as `LAUNCHER_CONFIG`.
pub fn render(image: &ImageConfig, config_file: Option<&Path>) -> String {
    let manifest = image.manifest.display();
    let mut lines = vec![
        format!("FROM {} AS launcher", image.launcher_from),
        String::new(),
        format!("FROM {}", image.base_image),
        format!("WORKDIR {}", image.workdir),
        format!("COPY --from=launcher {0} {0}", LAUNCHER_PATH),
        format!("COPY {0} ./{0}", manifest),
    ];
    if let Some(config) = config_file {
        lines.push(format!("COPY {} ./{}", config.display(), DEFAULT_CONFIG_FILE));
        lines.push(format!(
            "ENV LAUNCHER_CONFIG={}/{}",
            image.workdir.trim_end_matches('/'),
            DEFAULT_CONFIG_FILE
        ));
    }
    lines.extend([
        format!("RUN {}", exec_form(&["launcher", "prepare", "--stage", "deps"])),
        "COPY . .".to_string(),
        format!("RUN {}", exec_form(&["launcher", "prepare", "--stage", "assets"])),
        format!("CMD {}", exec_form(&["launcher", "start"])),
    ]);

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

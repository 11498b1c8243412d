//! Launch context - variables, environment and working directory shared by all phases

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.-]+)\s*\}\}").expect("valid placeholder regex")
    })
}

/// Shared runtime data for the three phases
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaunchContext {
    /// Values for `{{ name }}` placeholders
    pub variables: BTreeMap<String, String>,

    /// Environment added on top of the launcher's own
    pub env: BTreeMap<String, String>,

    /// Working directory for every phase
    pub workdir: Option<PathBuf>,
}

impl LaunchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_variable(&mut self, key: String, value: String) {
        self.variables.insert(key, value);
    }

    pub fn set_env(&mut self, key: String, value: String) {
        self.env.insert(key, value);
    }

    /// Substitute `{{ name }}` placeholders.
    ///
    /// Returns the names of all unresolved placeholders on failure.
    pub fn render(&self, template: &str) -> Result<String, Vec<String>> {
        let mut missing = Vec::new();
        let rendered = placeholder().replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match self.variables.get(name) {
                Some(value) => value.clone(),
                None => {
                    missing.push(name.to_string());
                    caps[0].to_string()
                }
            }
        });

        if missing.is_empty() {
            Ok(rendered.into_owned())
        } else {
            Err(missing)
        }
    }

    /// Look up a variable in the phase environment, falling back to `lookup`
    /// (normally the launcher's own environment)
    pub fn resolve_env<F>(&self, name: &str, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.env.get(name).cloned().or_else(|| lookup(name))
    }
}

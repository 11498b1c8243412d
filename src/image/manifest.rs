//! Requirements-style dependency manifests

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Errors found while reading a manifest
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: cannot parse requirement '{content}'")]
    InvalidLine { line: usize, content: String },

    #[error("line {line}: invalid version clause '{clause}'")]
    InvalidConstraint { line: usize, clause: String },

    #[error("line {line}: '{name}' is already required on line {first}")]
    Duplicate {
        name: String,
        line: usize,
        first: usize,
    },
}

/// One version clause such as `>=2.0`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Constraint {
    pub op: String,
    pub version: String,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op, self.version)
    }
}

/// A single declared dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub name: String,
    pub extras: Vec<String>,
    pub constraints: Vec<Constraint>,
    /// Environment marker after `;`, kept verbatim
    pub marker: Option<String>,
    /// 1-based line in the manifest
    pub line: usize,
}

impl Requirement {
    /// True when exactly one `==` clause fixes the version
    pub fn is_pinned(&self) -> bool {
        matches!(self.constraints.as_slice(), [c] if c.op == "==" && !c.version.contains('*'))
    }

    /// Canonical form of the name: lowercase, runs of `-_.` folded to `-`
    pub fn normalized_name(&self) -> String {
        static SEPARATORS: OnceLock<Regex> = OnceLock::new();
        SEPARATORS
            .get_or_init(|| Regex::new(r"[-_.]+").expect("valid regex"))
            .replace_all(&self.name.to_lowercase(), "-")
            .into_owned()
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        let clauses: Vec<String> = self.constraints.iter().map(ToString::to_string).collect();
        write!(f, "{}", clauses.join(","))?;
        if let Some(marker) = &self.marker {
            write!(f, "; {}", marker)?;
        }
        Ok(())
    }
}

/// Parsed manifest: requirements plus installer option lines
#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyManifest {
    pub requirements: Vec<Requirement>,
    /// Lines starting with `-`, such as `--index-url` or `-r base.txt`
    pub options: Vec<String>,
}

fn requirement_regex() -> &'static Regex {
    static REQUIREMENT: OnceLock<Regex> = OnceLock::new();
    REQUIREMENT.get_or_init(|| {
        Regex::new(
            r"^(?P<name>[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[(?P<extras>[^\]]*)\])?\s*(?P<specifier>[^;]*?)\s*(?:;\s*(?P<marker>.+))?$",
        )
        .expect("valid regex")
    })
}

fn clause_regex() -> &'static Regex {
    static CLAUSE: OnceLock<Regex> = OnceLock::new();
    CLAUSE.get_or_init(|| {
        Regex::new(r"^\s*(?P<op>===|==|>=|<=|~=|!=|>|<)\s*(?P<version>[A-Za-z0-9.*+!_-]+)\s*$")
            .expect("valid regex")
    })
}

/// Drop a trailing ` # comment`; a `#` inside a token is kept
fn strip_comment(line: &str) -> &str {
    if line.starts_with('#') {
        return "";
    }
    match line.find(" #").or_else(|| line.find("\t#")) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

impl DependencyManifest {
    /// Parse manifest text. Parsing stops at the first bad line.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let mut manifest = DependencyManifest::default();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (idx, raw) in content.lines().enumerate() {
            let line = idx + 1;
            let text = strip_comment(raw.trim_end_matches('\r')).trim();
            if text.is_empty() {
                continue;
            }
            if text.starts_with('-') {
                manifest.options.push(text.to_string());
                continue;
            }

            let requirement = parse_requirement(text, line)?;
            let key = requirement.normalized_name();
            if let Some(first) = seen.get(&key) {
                return Err(ManifestError::Duplicate {
                    name: requirement.name,
                    line,
                    first: *first,
                });
            }
            seen.insert(key, line);
            manifest.requirements.push(requirement);
        }

        Ok(manifest)
    }

    /// Read and parse a manifest file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Requirements that do not fix an exact version
    pub fn unpinned(&self) -> Vec<&Requirement> {
        self.requirements.iter().filter(|r| !r.is_pinned()).collect()
    }
}

fn parse_requirement(text: &str, line: usize) -> Result<Requirement, ManifestError> {
    let caps = requirement_regex()
        .captures(text)
        .ok_or_else(|| ManifestError::InvalidLine {
            line,
            content: text.to_string(),
        })?;

    let extras = caps
        .name("extras")
        .map(|m| {
            m.as_str()
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let specifier = caps.name("specifier").map(|m| m.as_str().trim()).unwrap_or("");
    let mut constraints = Vec::new();
    if !specifier.is_empty() {
        for clause in specifier.split(',') {
            let parsed = clause_regex().captures(clause).ok_or_else(|| {
                ManifestError::InvalidConstraint {
                    line,
                    clause: clause.trim().to_string(),
                }
            })?;
            constraints.push(Constraint {
                op: parsed["op"].to_string(),
                version: parsed["version"].to_string(),
            });
        }
    }

    Ok(Requirement {
        name: caps["name"].to_string(),
        extras,
        constraints,
        marker: caps.name("marker").map(|m| m.as_str().trim().to_string()),
        line,
    })
}

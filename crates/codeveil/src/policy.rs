//! Per-directory visibility policy.
//!
//! A project configuration maps directory names (relative to the input root)
//! to a [`DirectoryPolicy`]:
//!
//! ```toml
//! [lib]
//! visibility = "private"
//!
//! [models]
//! visibility = "public"
//! exceptions = [{ script = "registry.py", target = "def __get_registry_template" }]
//! ```
//!
//! The same mapping can be written as JSON.
//!
//! Names are relative paths below the input root. `./lib` and `lib/` are read
//! as `lib`; names that climb out of the root or are absolute are rejected.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use figment::{
    providers::{Format, Json, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::redact::Markers;

/// Name that refers to the input root itself.
pub const ROOT_DIRECTORY: &str = ".";

/// Project files looked for in the input root when none is given.
pub const PROJECT_FILE_NAMES: &[&str] = &["codeveil.toml", "codeveil.json"];

/// How much of a directory is redacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Only declarations listed as exceptions are redacted.
    Public,
    /// Every declaration body is redacted.
    Private,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
        }
    }
}

/// A single declaration to redact inside an otherwise public directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Exception {
    /// File name the exception applies to.
    pub script: String,
    /// Trigger pattern identifying the declaration.
    pub target: String,
}

/// Redaction policy for one configured directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoryPolicy {
    /// Directory visibility.
    pub visibility: Visibility,
    /// Declarations redacted despite public visibility.
    #[serde(default)]
    pub exceptions: Vec<Exception>,
}

impl DirectoryPolicy {
    /// A policy redacting everything.
    #[must_use]
    pub fn private() -> Self {
        Self {
            visibility: Visibility::Private,
            exceptions: Vec::new(),
        }
    }

    /// A policy redacting only the given exceptions.
    #[must_use]
    pub fn public(exceptions: Vec<Exception>) -> Self {
        Self {
            visibility: Visibility::Public,
            exceptions,
        }
    }

    /// Trigger patterns to apply to the named file.
    #[must_use]
    pub fn triggers_for<'a>(&'a self, file_name: &str, markers: &'a Markers) -> Vec<&'a str> {
        match self.visibility {
            Visibility::Private => vec![markers.declaration_keyword.as_str()],
            Visibility::Public => self
                .exceptions
                .iter()
                .filter(|exception| exception.script == file_name)
                .map(|exception| exception.target.as_str())
                .collect(),
        }
    }

    /// Exception scripts that do not appear among `existing` file names.
    #[must_use]
    pub fn missing_exceptions<'a>(&'a self, existing: &BTreeSet<String>) -> Vec<&'a Exception> {
        self.exceptions
            .iter()
            .filter(|exception| !existing.contains(&exception.script))
            .collect()
    }
}

/// Whether every component of `name` is a plain name or `.`.
fn is_relative_below(name: &str) -> bool {
    Path::new(name)
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

/// Canonical spelling of a directory name.
///
/// Drops `.` components and trailing separators. Names that are not plain
/// relative paths are returned as written so validation can report them.
fn normalize_name(name: &str) -> String {
    if name.is_empty() || !is_relative_below(name) {
        return name.to_string();
    }
    let parts: Vec<String> = Path::new(name)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        ROOT_DIRECTORY.to_string()
    } else {
        parts.join("/")
    }
}

/// Mapping of directory name to policy for one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectConfig {
    directories: BTreeMap<String, DirectoryPolicy>,
}

impl ProjectConfig {
    /// Create an empty project configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a directory entry.
    #[must_use]
    pub fn with_directory(mut self, name: impl Into<String>, policy: DirectoryPolicy) -> Self {
        self.directories.insert(normalize_name(&name.into()), policy);
        self
    }

    /// Rewrite every name in canonical form.
    fn normalized(self) -> Result<Self> {
        let mut directories = BTreeMap::new();
        let mut spelled: BTreeMap<String, String> = BTreeMap::new();
        for (name, policy) in self.directories {
            let normal = normalize_name(&name);
            if let Some(previous) = spelled.insert(normal.clone(), name.clone()) {
                return Err(Error::config_validation(format!(
                    "directories '{previous}' and '{name}' name the same path"
                )));
            }
            directories.insert(normal, policy);
        }
        Ok(Self { directories })
    }

    /// Load a project configuration from a TOML or JSON file.
    ///
    /// The format is chosen by extension; anything other than `.json` is read
    /// as TOML. An unknown visibility value fails here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigLoad`] if the file is missing or malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::config_validation(format!(
                "project configuration not found: {}",
                path.display()
            )));
        }

        let figment = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Figment::from(Json::file(path)),
            _ => Figment::from(Toml::file(path)),
        };
        let project = figment.extract::<Self>()?.normalized()?;
        debug!(
            path = %path.display(),
            directories = project.directories.len(),
            "Loaded project configuration"
        );
        Ok(project)
    }

    /// Find the project file inside an input root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] if none of [`PROJECT_FILE_NAMES`]
    /// exists in `input_root`.
    pub fn discover(input_root: &Path) -> Result<PathBuf> {
        PROJECT_FILE_NAMES
            .iter()
            .map(|name| input_root.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| {
                Error::config_validation(format!(
                    "no project configuration given and none of {} found in {}",
                    PROJECT_FILE_NAMES.join(", "),
                    input_root.display()
                ))
            })
    }

    /// Parse a project configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigLoad`] if the JSON is malformed, or
    /// [`Error::ConfigValidation`] if two names spell the same directory.
    pub fn from_json(json: &str) -> Result<Self> {
        Figment::from(Json::string(json)).extract::<Self>()?.normalized()
    }

    /// Parse a project configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigLoad`] if the TOML is malformed, or
    /// [`Error::ConfigValidation`] if two names spell the same directory.
    pub fn from_toml(toml: &str) -> Result<Self> {
        Figment::from(Toml::string(toml)).extract::<Self>()?.normalized()
    }

    /// Configured directories in name order.
    pub fn directories(&self) -> impl Iterator<Item = (&str, &DirectoryPolicy)> {
        self.directories
            .iter()
            .map(|(name, policy)| (name.as_str(), policy))
    }

    /// Policy for a directory name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DirectoryPolicy> {
        self.directories.get(name)
    }

    /// Number of configured directories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.directories.len()
    }

    /// Whether no directories are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }

    /// Relative paths of all configured directories except the root.
    #[must_use]
    pub fn claimed_paths(&self) -> BTreeSet<PathBuf> {
        self.directories
            .keys()
            .filter(|name| name.as_str() != ROOT_DIRECTORY)
            .map(PathBuf::from)
            .collect()
    }

    /// Check the configuration against an input root.
    ///
    /// # Errors
    ///
    /// Returns a configuration-class error if the mapping is empty, a name
    /// is empty or resolves outside `input_root`, two names spell the same
    /// directory, an entry has an empty exception field, or a directory does
    /// not exist.
    pub fn validate(&self, input_root: &Path) -> Result<()> {
        if self.is_empty() {
            return Err(Error::config_validation(
                "project configuration lists no directories",
            ));
        }

        let root = input_root.canonicalize().map_err(|err| {
            Error::config_validation(format!(
                "input root {} is not accessible: {err}",
                input_root.display()
            ))
        })?;
        let mut seen = BTreeSet::new();

        for (name, policy) in self.directories() {
            if name.is_empty() {
                return Err(Error::config_validation("directory name must not be empty"));
            }
            if !is_relative_below(name) {
                return Err(Error::config_validation(format!(
                    "directory '{name}' must be a relative path inside the input root"
                )));
            }
            if !seen.insert(normalize_name(name)) {
                return Err(Error::config_validation(format!(
                    "directory '{name}' is listed more than once"
                )));
            }

            for exception in &policy.exceptions {
                if exception.script.is_empty() || exception.target.is_empty() {
                    return Err(Error::config_validation(format!(
                        "directory '{name}' has an exception with an empty script or target"
                    )));
                }
            }

            let path = input_root.join(name);
            if !path.is_dir() {
                return Err(Error::MissingDirectory {
                    name: name.to_string(),
                    path,
                });
            }

            // Links may still lead out of the root
            if !path.canonicalize()?.starts_with(&root) {
                return Err(Error::config_validation(format!(
                    "directory '{name}' resolves outside the input root"
                )));
            }
        }

        Ok(())
    }
}

//! Configuration management for codeveil.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.
//!
//! This is the tool's own configuration. Which directories of a project are
//! public or private lives in a separate project file (see [`crate::policy`]).

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::redact::Markers;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "codeveil";

/// Browsers searched on `PATH` when none is configured.
pub const DEFAULT_BROWSERS: &[&str] = &["chromium", "chromium-browser", "google-chrome"];

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CODEVEIL_`)
/// 2. TOML config file at `~/.config/codeveil/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Redaction configuration.
    pub redaction: RedactionConfig,
    /// Directory walking configuration.
    pub walk: WalkConfig,
    /// Rendering engine configuration.
    pub render: RenderConfig,
    /// Output configuration.
    pub output: OutputConfig,
}

/// What to do when a file cannot be redacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Record the file as failed and continue with the rest.
    #[default]
    Skip,
    /// Stop the whole run.
    Abort,
}

/// Redaction-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    /// Markers the engine keys on.
    #[serde(flatten)]
    pub markers: Markers,
    /// Behavior on malformed input.
    pub on_malformed: MalformedPolicy,
}

/// Directory walking configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Extension of convertible source files, without the dot.
    pub source_extension: String,
    /// Module initializer file name, never converted.
    pub initializer_name: String,
    /// Subdirectory names never descended into.
    pub ignored_directories: Vec<String>,
}

/// Rendering engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Browser binary to use. Searched on `PATH` when unset.
    pub browser: Option<PathBuf>,
    /// Extra arguments passed to the browser.
    pub extra_args: Vec<String>,
    /// Per-document render timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum concurrent browser sessions.
    pub max_concurrent: usize,
    /// Render pages in landscape orientation.
    pub landscape: bool,
}

/// Output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory (under the output base) holding converted projects and archives.
    pub projects_dir: String,
    /// Keep the unpacked output tree next to the archive.
    pub keep_tree: bool,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            source_extension: "py".to_string(),
            initializer_name: "__init__.py".to_string(),
            ignored_directories: vec!["__pycache__".to_string(), ".git".to_string()],
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            browser: None,
            extra_args: Vec::new(),
            timeout_secs: 60,
            max_concurrent: 4,
            landscape: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            projects_dir: "projects".to_string(),
            keep_tree: true,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `CODEVEIL_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("CODEVEIL_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let markers = &self.redaction.markers;
        if markers.doc_delimiter.is_empty() {
            return Err(Error::config_validation("doc_delimiter must not be empty"));
        }

        if markers.declaration_keyword.is_empty() {
            return Err(Error::config_validation(
                "declaration_keyword must not be empty",
            ));
        }

        if self.walk.source_extension.is_empty() || self.walk.source_extension.starts_with('.') {
            return Err(Error::config_validation(format!(
                "source_extension must be a bare extension, got '{}'",
                self.walk.source_extension
            )));
        }

        if self.render.max_concurrent == 0 {
            return Err(Error::config_validation(
                "max_concurrent must be greater than 0",
            ));
        }

        if self.render.timeout_secs == 0 {
            return Err(Error::config_validation(
                "timeout_secs must be greater than 0",
            ));
        }

        if self.output.projects_dir.is_empty() {
            return Err(Error::config_validation("projects_dir must not be empty"));
        }

        Ok(())
    }
}

impl RenderConfig {
    /// Get the per-document render timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

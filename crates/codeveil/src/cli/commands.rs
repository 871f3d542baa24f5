//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::config::{Config, MalformedPolicy};

/// Run command arguments.
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Root directory of the project to convert
    pub input: PathBuf,

    /// Project configuration (TOML or JSON); defaults to codeveil.toml in the input
    #[arg(short, long, value_name = "FILE")]
    pub project: Option<PathBuf>,

    /// Directory receiving projects/<name>/ and the archive (default: current directory)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// What to do with a file that cannot be redacted
    #[arg(long, value_enum)]
    pub on_malformed: Option<MalformedArg>,

    /// Maximum concurrent browser sessions
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Headless browser binary
    #[arg(long, value_name = "PATH")]
    pub browser: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunCommand {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(on_malformed) = self.on_malformed {
            config.redaction.on_malformed = on_malformed.into();
        }
        if let Some(jobs) = self.jobs {
            config.render.max_concurrent = jobs;
        }
        if let Some(browser) = &self.browser {
            config.render.browser = Some(browser.clone());
        }
    }
}

/// Preview command arguments.
#[derive(Debug, Args)]
pub struct PreviewCommand {
    /// Source file to redact
    pub file: PathBuf,

    /// Redact only declarations containing this text (repeatable); redacts every declaration when omitted
    #[arg(short, long, value_name = "TEXT")]
    pub target: Vec<String>,

    /// Print the spans and redacted text as JSON
    #[arg(long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Malformed-input policy argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MalformedArg {
    /// Record the file as failed and continue
    Skip,
    /// Stop the run
    Abort,
}

impl From<MalformedArg> for MalformedPolicy {
    fn from(arg: MalformedArg) -> Self {
        match arg {
            MalformedArg::Skip => Self::Skip,
            MalformedArg::Abort => Self::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_command() -> RunCommand {
        RunCommand {
            input: PathBuf::from("demo"),
            project: None,
            output: None,
            on_malformed: None,
            jobs: None,
            browser: None,
            json: false,
        }
    }

    #[test]
    fn test_malformed_arg_conversion() {
        assert_eq!(MalformedPolicy::from(MalformedArg::Skip), MalformedPolicy::Skip);
        assert_eq!(MalformedPolicy::from(MalformedArg::Abort), MalformedPolicy::Abort);
    }

    #[test]
    fn test_apply_without_overrides_keeps_config() {
        let mut config = Config::default();
        run_command().apply(&mut config);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::default();
        let cmd = RunCommand {
            on_malformed: Some(MalformedArg::Abort),
            jobs: Some(8),
            browser: Some(PathBuf::from("/opt/chrome")),
            ..run_command()
        };
        cmd.apply(&mut config);
        assert_eq!(config.redaction.on_malformed, MalformedPolicy::Abort);
        assert_eq!(config.render.max_concurrent, 8);
        assert_eq!(config.render.browser, Some(PathBuf::from("/opt/chrome")));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }

    #[test]
    fn test_preview_command_debug() {
        let cmd = PreviewCommand {
            file: PathBuf::from("a.py"),
            target: vec!["def secret".to_string()],
            json: false,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("def secret"));
    }
}

//! Diagnostics output.
//!
//! Everything is logged through `tracing` to stderr. Stdout carries only
//! command results (previews, summaries, `--json`) so they can be piped.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How chatty a run is, from `-q` up to `-vv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only. The run summary still goes to stdout.
    Quiet,
    /// Progress per directory and warnings.
    #[default]
    Normal,
    /// Per-file decisions.
    Verbose,
    /// Redaction state transitions.
    Trace,
}

impl Verbosity {
    /// Most detailed level shown at this verbosity.
    #[must_use]
    pub fn level(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Install the stderr subscriber for the binary.
///
/// `RUST_LOG`, when set, replaces the filter derived from `verbosity`, which
/// only enables this crate's events. Calling it again is a no-op.
///
/// ```no_run
/// use codeveil::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    // A subscriber may already be installed
    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}

/// Filter directive scoped to this crate.
fn default_filter(verbosity: Verbosity) -> String {
    format!("codeveil={}", verbosity.level())
}

/// Route warnings from code under test into the test harness output.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

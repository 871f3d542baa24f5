//! Per-file outcomes and the run summary.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

/// What happened to one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    /// At least one declaration body was obscured.
    Redacted {
        /// Number of redacted spans.
        spans: usize,
        /// Number of lines wrapped in obscure markers.
        obscured_lines: usize,
    },
    /// Converted verbatim; nothing matched.
    Clean,
    /// Not converted by design.
    Skipped {
        /// Why the file was skipped.
        reason: String,
    },
    /// Conversion failed.
    Failed {
        /// What went wrong.
        reason: String,
    },
}

impl FileStatus {
    /// Short label for tables.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Redacted { .. } => "redacted",
            Self::Clean => "clean",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether this status counts as a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Outcome for one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    /// Source path relative to the input root.
    pub source: PathBuf,
    /// Exported document, when one was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<PathBuf>,
    /// Status.
    #[serde(flatten)]
    pub status: FileStatus,
}

impl FileOutcome {
    /// Record a failure, dropping any document path.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.document = None;
        self.status = FileStatus::Failed {
            reason: reason.into(),
        };
    }
}

/// Number of files per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// Files with redacted spans.
    pub redacted: usize,
    /// Files converted verbatim.
    pub clean: usize,
    /// Files skipped.
    pub skipped: usize,
    /// Files that failed.
    pub failed: usize,
}

/// Summary of one conversion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Input project root.
    pub input_root: PathBuf,
    /// Output tree root.
    pub output_root: PathBuf,
    /// Archive file, when packaging succeeded.
    pub archive: Option<PathBuf>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Outcome per source file, in visit order.
    pub files: Vec<FileOutcome>,
}

impl RunSummary {
    /// Count files by status.
    #[must_use]
    pub fn counts(&self) -> StatusCounts {
        self.files
            .iter()
            .fold(StatusCounts::default(), |mut counts, file| {
                match file.status {
                    FileStatus::Redacted { .. } => counts.redacted += 1,
                    FileStatus::Clean => counts.clean += 1,
                    FileStatus::Skipped { .. } => counts.skipped += 1,
                    FileStatus::Failed { .. } => counts.failed += 1,
                }
                counts
            })
    }

    /// Whether any file failed or the archive was not written.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.archive.is_none() || self.files.iter().any(|file| file.status.is_failure())
    }

    /// Files that failed.
    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|file| file.status.is_failure())
    }

    /// Pretty-printed JSON for `--json` output.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "codeveil run summary")?;
        writeln!(f, "--------------------")?;
        for file in &self.files {
            write!(f, "  {:<9} {}", file.status.label(), file.source.display())?;
            match &file.status {
                FileStatus::Redacted { spans, .. } => write!(f, " ({spans} span(s))")?,
                FileStatus::Skipped { reason } | FileStatus::Failed { reason } => {
                    write!(f, " ({reason})")?;
                }
                FileStatus::Clean => {}
            }
            writeln!(f)?;
        }
        let counts = self.counts();
        writeln!(f)?;
        writeln!(
            f,
            "Redacted: {}  Clean: {}  Skipped: {}  Failed: {}",
            counts.redacted, counts.clean, counts.skipped, counts.failed
        )?;
        match &self.archive {
            Some(archive) => write!(f, "Archive:  {}", archive.display()),
            None => write!(f, "Archive:  (not written)"),
        }
    }
}

//! Line-position redaction engine.
//!
//! The engine walks a line sequence with a small state machine:
//!
//! ```text
//! Searching ──trigger──▶ SkippingDoc ──closing delimiter──▶ InBody ──next declaration / EOF──▶ Searching
//!     │                       │
//!     └──EOF──▶ Done          └──EOF──▶ MalformedInput
//! ```
//!
//! Every transition checks its index against the input length before reading.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, trace};

use super::markers::{is_obscured, obscure, Markers};
use crate::error::{Error, Result};
use crate::scanner::{join_lines, SourceDocument};

/// Placeholder file name for in-memory redaction.
const MEMORY_SOURCE: &str = "<memory>";

/// Lines between a trigger and the first line searched for the closing doc delimiter.
const DOC_SEARCH_OFFSET: usize = 2;

/// Lines between the closing doc delimiter and the first body line.
const BODY_OFFSET: usize = 2;

/// A half-open range of line indices `[start, end)` marked for obscuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Span {
    /// First line of the body.
    pub start: usize,
    /// One past the last line of the body.
    pub end: usize,
}

impl Span {
    /// Number of lines covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span covers no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether a line index falls inside the span.
    #[must_use]
    pub fn contains(&self, line: usize) -> bool {
        (self.start..self.end).contains(&line)
    }
}

/// The output of a redaction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redaction {
    /// Rewritten lines, same count as the input.
    pub lines: Vec<String>,
    /// One span per trigger match, ordered by start line.
    pub spans: Vec<Span>,
    /// Indices of lines this redaction treats as obscured.
    ///
    /// Only these lines may be rendered blurred; obscure markers that occur
    /// anywhere else came from the source text.
    pub obscured: BTreeSet<usize>,
}

impl Redaction {
    /// A redaction that changes nothing.
    #[must_use]
    pub fn unchanged(lines: &[String]) -> Self {
        Self {
            lines: lines.to_vec(),
            spans: Vec::new(),
            obscured: BTreeSet::new(),
        }
    }

    /// The rewritten text, joined with `\n`.
    #[must_use]
    pub fn text(&self) -> String {
        join_lines(&self.lines)
    }

    /// Whether any trigger matched.
    #[must_use]
    pub fn is_redacted(&self) -> bool {
        !self.spans.is_empty()
    }

    /// Number of obscured lines.
    #[must_use]
    pub fn obscured_lines(&self) -> usize {
        self.obscured.len()
    }

    /// Whether the line at `index` is obscured.
    #[must_use]
    pub fn is_obscured_line(&self, index: usize) -> bool {
        self.obscured.contains(&index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Looking for the next trigger line at or after `pos`.
    Searching { pos: usize },
    /// Looking for the closing doc delimiter at or after `pos`.
    SkippingDoc { trigger_line: usize, pos: usize },
    /// Obscuring body lines from `start` up to the next declaration.
    InBody { start: usize },
    Done,
}

/// Redacts declaration bodies located by textual markers.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    markers: Markers,
}

impl Redactor {
    /// Create a redactor with the given markers.
    #[must_use]
    pub fn new(markers: Markers) -> Self {
        Self { markers }
    }

    /// The markers this redactor keys on.
    #[must_use]
    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    /// Redact every declaration whose line contains `trigger`.
    ///
    /// A trigger that never matches is not an error; the lines come back
    /// unchanged with no spans.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedInput`] if a matched declaration has no
    /// closing doc delimiter before end of input. The input is never modified.
    pub fn redact(&self, lines: &[String], trigger: &str) -> Result<Redaction> {
        self.redact_in(Path::new(MEMORY_SOURCE), lines, trigger)
    }

    /// Apply several triggers in order, merging their spans.
    ///
    /// # Errors
    ///
    /// Returns the first [`Error::MalformedInput`] encountered.
    pub fn redact_all<S: AsRef<str>>(&self, lines: &[String], triggers: &[S]) -> Result<Redaction> {
        self.redact_all_in(Path::new(MEMORY_SOURCE), lines, triggers)
    }

    /// Redact a source document, naming its path in any error.
    ///
    /// # Errors
    ///
    /// Returns the first [`Error::MalformedInput`] encountered.
    pub fn redact_document<S: AsRef<str>>(
        &self,
        document: &SourceDocument,
        triggers: &[S],
    ) -> Result<Redaction> {
        self.redact_all_in(document.path(), document.lines(), triggers)
    }

    fn redact_all_in<S: AsRef<str>>(
        &self,
        file: &Path,
        lines: &[String],
        triggers: &[S],
    ) -> Result<Redaction> {
        let mut redaction = Redaction::unchanged(lines);
        for trigger in triggers {
            let pass = self.redact_in(file, &redaction.lines, trigger.as_ref())?;
            redaction.lines = pass.lines;
            redaction.spans.extend(pass.spans);
            redaction.obscured.extend(pass.obscured);
        }
        redaction.spans.sort();
        redaction.spans.dedup();
        Ok(redaction)
    }

    fn redact_in(&self, file: &Path, lines: &[String], trigger: &str) -> Result<Redaction> {
        if trigger.is_empty() {
            return Err(Error::config_validation("redaction trigger must not be empty"));
        }

        let mut out = lines.to_vec();
        let mut spans = Vec::new();
        let mut obscured = BTreeSet::new();
        let mut state = ScanState::Searching { pos: 0 };

        while state != ScanState::Done {
            state = self.step(state, &mut out, trigger, &mut spans, &mut obscured, file)?;
        }

        debug!(
            file = %file.display(),
            trigger,
            spans = spans.len(),
            "Redaction pass complete"
        );
        Ok(Redaction {
            lines: out,
            spans,
            obscured,
        })
    }

    fn step(
        &self,
        state: ScanState,
        lines: &mut [String],
        trigger: &str,
        spans: &mut Vec<Span>,
        obscured: &mut BTreeSet<usize>,
        file: &Path,
    ) -> Result<ScanState> {
        let len = lines.len();
        match state {
            ScanState::Searching { pos } => Ok(lines
                .iter()
                .enumerate()
                .skip(pos)
                .find(|(_, line)| line.contains(trigger))
                .map_or(ScanState::Done, |(trigger_line, _)| {
                    trace!(line = trigger_line + 1, "Trigger matched");
                    ScanState::SkippingDoc {
                        trigger_line,
                        pos: trigger_line + DOC_SEARCH_OFFSET,
                    }
                })),

            ScanState::SkippingDoc { trigger_line, pos } => {
                let closing = lines
                    .iter()
                    .enumerate()
                    .skip(pos)
                    .find(|(_, line)| self.markers.is_doc_delimiter(line))
                    .map(|(index, _)| index)
                    .ok_or_else(|| Error::MalformedInput {
                        file: PathBuf::from(file),
                        trigger: trigger.to_string(),
                        line: trigger_line + 1,
                        marker: self.markers.doc_delimiter.clone(),
                    })?;
                Ok(ScanState::InBody {
                    start: (closing + BODY_OFFSET).min(len),
                })
            }

            ScanState::InBody { start } => {
                let end = lines
                    .iter()
                    .enumerate()
                    .skip(start)
                    .find(|(_, line)| self.markers.is_declaration(line))
                    .map_or(len, |(index, _)| index);

                for (index, line) in lines.iter_mut().enumerate().take(end).skip(start) {
                    if self.markers.is_scaffolding(line) {
                        continue;
                    }
                    // Already-wrapped lines are counted but never wrapped twice
                    if !is_obscured(line) {
                        *line = obscure(line);
                    }
                    obscured.insert(index);
                }

                trace!(start, end, "Body obscured");
                spans.push(Span { start, end });
                Ok(ScanState::Searching { pos: end })
            }

            ScanState::Done => Ok(ScanState::Done),
        }
    }
}

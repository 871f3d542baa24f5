//! Line scanning for source documents.
//!
//! A [`SourceDocument`] is the ordered sequence of lines of one file. It is
//! read once and never modified; redaction produces a new copy.

use std::path::{Path, PathBuf};

use tracing::trace;

use crate::error::{Error, Result};

/// Split text into lines on `\n`.
///
/// A trailing newline yields a trailing empty line, so [`join_lines`] restores
/// the input exactly (modulo `\r`, which is stripped from line ends).
#[must_use]
pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

/// Join lines back into text with `\n`.
#[must_use]
pub fn join_lines(lines: &[String]) -> String {
    lines.join("\n")
}

/// A source file as an ordered sequence of lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    path: PathBuf,
    lines: Vec<String>,
}

impl SourceDocument {
    /// Read a UTF-8 source file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceRead`] if the file cannot be read or is not UTF-8.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let text = std::fs::read_to_string(&path).map_err(|source| Error::SourceRead {
            path: path.clone(),
            source,
        })?;
        let document = Self::from_text(path, &text);
        trace!(path = %document.path.display(), lines = document.len(), "Read source document");
        Ok(document)
    }

    /// Build a document from in-memory text.
    #[must_use]
    pub fn from_text(path: impl Into<PathBuf>, text: &str) -> Self {
        Self {
            path: path.into(),
            lines: split_lines(text),
        }
    }

    /// Path the document was read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The document's lines.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the document has no content at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(String::is_empty)
    }

    /// The document text, re-joined with `\n`.
    #[must_use]
    pub fn text(&self) -> String {
        join_lines(&self.lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines_basic() {
        assert_eq!(split_lines("a\nb\nc"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_lines_trailing_newline() {
        assert_eq!(split_lines("a\n"), vec!["a", ""]);
    }

    #[test]
    fn test_split_lines_empty() {
        assert_eq!(split_lines(""), vec![""]);
    }

    #[test]
    fn test_split_lines_strips_carriage_returns() {
        assert_eq!(split_lines("a\r\n  b\r\n"), vec!["a", "  b", ""]);
    }

    #[test]
    fn test_split_then_join_preserves_text() {
        let text = "def f():\n    \"\"\"Doc.\"\"\"\n\n    return 1\n";
        assert_eq!(join_lines(&split_lines(text)), text);
    }

    #[test]
    fn test_document_from_text() {
        let doc = SourceDocument::from_text("lib/a.py", "x = 1\ny = 2");
        assert_eq!(doc.path(), Path::new("lib/a.py"));
        assert_eq!(doc.len(), 2);
        assert!(!doc.is_empty());
        assert_eq!(doc.text(), "x = 1\ny = 2");
    }

    #[test]
    fn test_document_is_empty() {
        assert!(SourceDocument::from_text("a.py", "").is_empty());
        assert!(SourceDocument::from_text("a.py", "\n\n").is_empty());
    }

    #[test]
    fn test_read_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");
        std::fs::write(&path, "import os\n").unwrap();

        let doc = SourceDocument::read(&path).unwrap();
        assert_eq!(doc.lines(), &["import os".to_string(), String::new()]);
    }

    #[test]
    fn test_read_missing_document() {
        let err = SourceDocument::read("/nonexistent/a.py").unwrap_err();
        assert!(matches!(err, Error::SourceRead { .. }));
        assert!(err.to_string().contains("/nonexistent/a.py"));
    }
}

//! Textual markers the redaction engine keys on.
//!
//! Redaction is purely positional: these strings are matched as substrings,
//! never parsed.

use serde::{Deserialize, Serialize};

/// Opening tag wrapped around an obscured line.
pub const OBSCURE_OPEN: &str = r#"<span class="blur">"#;

/// Closing tag wrapped around an obscured line.
pub const OBSCURE_CLOSE: &str = "</span>";

/// Default documentation block delimiter.
pub const DEFAULT_DOC_DELIMITER: &str = "\"\"\"";

/// Default declaration keyword; also the trigger for fully private files.
pub const DEFAULT_DECLARATION_KEYWORD: &str = "def ";

/// Default comment prefix.
pub const DEFAULT_COMMENT_PREFIX: &str = "#";

/// Default lines left visible inside a redacted body.
#[must_use]
pub fn default_noop_tokens() -> Vec<String> {
    vec!["@staticmethod".to_string()]
}

/// The set of markers used to locate documentation blocks and bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Markers {
    /// Delimiter that opens and closes a documentation block.
    pub doc_delimiter: String,

    /// Keyword that starts a declaration and ends the previous body.
    pub declaration_keyword: String,

    /// Whole-line tokens left visible inside a body.
    pub noop_tokens: Vec<String>,

    /// Prefix marking a comment line, left visible inside a body.
    pub comment_prefix: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            doc_delimiter: DEFAULT_DOC_DELIMITER.to_string(),
            declaration_keyword: DEFAULT_DECLARATION_KEYWORD.to_string(),
            noop_tokens: default_noop_tokens(),
            comment_prefix: DEFAULT_COMMENT_PREFIX.to_string(),
        }
    }
}

impl Markers {
    /// Whether a body line should stay visible.
    ///
    /// Blank lines, no-op tokens and comment lines are scaffolding, not content.
    #[must_use]
    pub fn is_scaffolding(&self, line: &str) -> bool {
        let trimmed = line.trim();
        trimmed.is_empty()
            || self.noop_tokens.iter().any(|token| token == trimmed)
            || (!self.comment_prefix.is_empty() && trimmed.starts_with(&self.comment_prefix))
    }

    /// Whether the line opens or closes a documentation block.
    #[must_use]
    pub fn is_doc_delimiter(&self, line: &str) -> bool {
        line.contains(&self.doc_delimiter)
    }

    /// Whether the line starts a declaration.
    #[must_use]
    pub fn is_declaration(&self, line: &str) -> bool {
        line.contains(&self.declaration_keyword)
    }
}

/// Whether a line is already wrapped in the obscure markers.
#[must_use]
pub fn is_obscured(line: &str) -> bool {
    line.starts_with(OBSCURE_OPEN) && line.ends_with(OBSCURE_CLOSE)
}

/// Wrap a line in the obscure markers, keeping its leading whitespace inside.
#[must_use]
pub fn obscure(line: &str) -> String {
    format!("{OBSCURE_OPEN}{line}{OBSCURE_CLOSE}")
}

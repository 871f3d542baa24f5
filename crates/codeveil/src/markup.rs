//! Markup rendering for redacted source.
//!
//! Redacted lines become a minimal HTML document: source text is escaped,
//! spaces become `&nbsp;` so fixed-width indentation survives, and lines
//! wrapped by the redaction engine keep a live `.blur` span.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::redact::{is_obscured, Redaction, OBSCURE_CLOSE, OBSCURE_OPEN};

/// Extension of written markup files.
pub const MARKUP_EXTENSION: &str = "html";

/// Font size of the rendered code, in CSS pixels.
const FONT_SIZE_PX: u32 = 13;

/// Height of one rendered line, in CSS pixels. Pinned by the stylesheet.
const LINE_HEIGHT_PX: u32 = 18;

/// Upper bound on the advance of one monospace character at `FONT_SIZE_PX`.
const CHAR_WIDTH_PX: u32 = 8;

/// Body margin on each side, in CSS pixels.
const BODY_MARGIN_PX: u32 = 24;

/// Total margin added around the content on each axis.
const PAGE_MARGIN_PX: u32 = 2 * BODY_MARGIN_PX;

/// Smallest page edge, in CSS pixels.
const MIN_PAGE_EDGE_PX: u32 = 600;

/// Page geometry for the exported document.
///
/// The page is sized to fit the whole file on one sheet so nothing is split
/// across pages. The estimate is exact for height because the stylesheet
/// fixes font size and line height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageLayout {
    /// Page width in CSS pixels.
    pub width_px: u32,
    /// Page height in CSS pixels.
    pub height_px: u32,
    /// Landscape orientation.
    pub landscape: bool,
}

impl PageLayout {
    /// Estimate a single-page layout for the given visible rows.
    #[must_use]
    pub fn for_rows(rows: &[&str], landscape: bool) -> Self {
        let longest = rows
            .iter()
            .map(|row| row.chars().map(char_columns).sum::<usize>())
            .max()
            .unwrap_or(0);
        let rows = u32::try_from(rows.len()).unwrap_or(u32::MAX);
        let columns = u32::try_from(longest).unwrap_or(u32::MAX);

        let content_width = columns.saturating_mul(CHAR_WIDTH_PX).saturating_add(PAGE_MARGIN_PX);
        let content_height = rows.saturating_mul(LINE_HEIGHT_PX).saturating_add(PAGE_MARGIN_PX);

        let mut width_px = content_width.max(MIN_PAGE_EDGE_PX);
        let mut height_px = content_height.max(MIN_PAGE_EDGE_PX);
        // Landscape keeps the long edge horizontal
        if landscape && height_px > width_px {
            width_px = height_px;
        } else if !landscape && width_px > height_px {
            height_px = width_px;
        }

        Self {
            width_px,
            height_px,
            landscape,
        }
    }

    /// The CSS `@page` rule for this layout.
    #[must_use]
    pub fn css(&self) -> String {
        format!(
            "@page{{size:{}px {}px;margin:0}}",
            self.width_px, self.height_px
        )
    }
}

/// Columns a character occupies once escaped (tabs expand to four).
fn char_columns(c: char) -> usize {
    if c == '\t' {
        4
    } else {
        1
    }
}

/// The stylesheet whose metrics `PageLayout` assumes.
fn stylesheet(layout: &PageLayout) -> String {
    format!(
        "{}\
         body{{margin:{BODY_MARGIN_PX}px;white-space:nowrap;\
         font:{FONT_SIZE_PX}px/{LINE_HEIGHT_PX}px monospace}}\
         code{{font:inherit}}\
         .blur{{-webkit-filter:blur(3px);filter:blur(3px)}}",
        layout.css()
    )
}

/// A rendered markup document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupDocument {
    /// Full HTML text.
    pub html: String,
    /// Page geometry embedded in the HTML.
    pub layout: PageLayout,
}

/// Escape source text for embedding in HTML, keeping indentation.
#[must_use]
pub fn escape_line(line: &str) -> String {
    let mut escaped = String::with_capacity(line.len());
    for c in line.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            ' ' => escaped.push_str("&nbsp;"),
            '\t' => escaped.push_str("&nbsp;&nbsp;&nbsp;&nbsp;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Visible text of each line and whether it is blurred.
///
/// Obscure markers are stripped only from lines the redaction obscured;
/// everywhere else they are source text and render escaped.
fn visible_rows(redaction: &Redaction) -> Vec<(&str, bool)> {
    redaction
        .lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            if !redaction.is_obscured_line(index) {
                (line.as_str(), false)
            } else if is_obscured(line) {
                (&line[OBSCURE_OPEN.len()..line.len() - OBSCURE_CLOSE.len()], true)
            } else {
                (line.as_str(), true)
            }
        })
        .collect()
}

/// Render a redaction into a styled HTML document.
#[must_use]
pub fn render(redaction: &Redaction, landscape: bool) -> MarkupDocument {
    let rows = visible_rows(redaction);
    let texts: Vec<&str> = rows.iter().map(|(text, _)| *text).collect();
    let layout = PageLayout::for_rows(&texts, landscape);

    let body = rows
        .iter()
        .map(|(text, blurred)| {
            if *blurred {
                format!("{OBSCURE_OPEN}{}{OBSCURE_CLOSE}", escape_line(text))
            } else {
                escape_line(text)
            }
        })
        .collect::<Vec<_>>()
        .join("<br>");

    let html = format!(
        "<html><head><meta charset=\"utf-8\"><style>{}</style></head>\
         <body><code>{body}</code></body></html>",
        stylesheet(&layout)
    );

    MarkupDocument { html, layout }
}

/// Path of the markup file written for a source file.
#[must_use]
pub fn markup_path(output_dir: &Path, source_name: &str) -> PathBuf {
    output_dir.join(Path::new(source_name).with_extension(MARKUP_EXTENSION))
}

/// Write a markup document next to its siblings in the output tree.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_markup(
    output_dir: &Path,
    source_name: &str,
    document: &MarkupDocument,
) -> Result<PathBuf> {
    if !output_dir.exists() {
        std::fs::create_dir_all(output_dir).map_err(|source| Error::DirectoryCreate {
            path: output_dir.to_path_buf(),
            source,
        })?;
    }

    let path = markup_path(output_dir, source_name);
    std::fs::write(&path, &document.html)?;
    debug!(path = %path.display(), "Wrote markup");
    Ok(path)
}

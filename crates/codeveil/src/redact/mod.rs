//! Redaction of declaration bodies in source text.
//!
//! This module provides the positional redaction engine:
//!
//! - **Trigger matching**: a declaration is selected when its line contains a
//!   trigger substring (the declaration keyword for private files, a named
//!   declaration for public exceptions).
//!
//! - **Doc skipping**: the documentation block after the declaration is left
//!   visible.
//!
//! - **Body obscuring**: every content line up to the next declaration is
//!   wrapped in obscure markers; blank, no-op and comment lines stay readable.
//!
//! # Example
//!
//! ```
//! use codeveil::redact::Redactor;
//! use codeveil::scanner::split_lines;
//!
//! let source = split_lines("def f():\n    \"\"\"\n    Doc.\n    \"\"\"\n\n    return 42");
//! let redaction = Redactor::default().redact(&source, "def ").unwrap();
//!
//! assert_eq!(redaction.spans.len(), 1);
//! assert_eq!(redaction.lines[5], r#"<span class="blur">    return 42</span>"#);
//! ```
//!
//! Nested declarations are not understood: a nested `def` ends the enclosing
//! body, and is then matched as a declaration of its own.

mod engine;
mod markers;

pub use engine::{Redaction, Redactor, Span};
pub use markers::{is_obscured, obscure, Markers, OBSCURE_CLOSE, OBSCURE_OPEN};

//! `codeveil` - Redacted, print-ready snapshots of a source tree
//!
//! This library walks a project's source directories, obscures declaration
//! bodies according to a per-directory visibility policy, renders the result
//! as styled markup, exports each file to a fixed-layout document through a
//! headless browser, and packages the output tree into an archive.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod markup;
pub mod pipeline;
pub mod policy;
pub mod redact;
pub mod scanner;
pub mod summary;
pub mod walker;

pub use config::{Config, MalformedPolicy};
pub use error::{Error, Result};
pub use export::{ChromiumEngine, RenderEngine};
pub use logging::init_logging;
pub use pipeline::Pipeline;
pub use policy::{DirectoryPolicy, Exception, ProjectConfig, Visibility};
pub use redact::{Redaction, Redactor, Span};
pub use scanner::SourceDocument;
pub use summary::{FileOutcome, FileStatus, RunSummary};

//! Headless Chromium rendering engine.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, trace};

use super::RenderEngine;
use crate::config::{RenderConfig, DEFAULT_BROWSERS};
use crate::error::{Error, Result};
use crate::markup::PageLayout;

/// Extension of the browser's in-progress output file.
const PARTIAL_EXTENSION: &str = "pdf.partial";

/// Maximum stderr characters kept in an error message.
const STDERR_TAIL: usize = 400;

/// Renders markup by printing it to PDF with a headless Chromium process.
///
/// Every call spawns its own browser process. The process is killed when the
/// call returns, times out, or is cancelled.
#[derive(Debug, Clone)]
pub struct ChromiumEngine {
    binary: PathBuf,
    extra_args: Vec<String>,
    timeout: Duration,
}

impl ChromiumEngine {
    /// Create an engine for a specific browser binary.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>, extra_args: Vec<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            extra_args,
            timeout,
        }
    }

    /// Create an engine from configuration, locating the browser if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BrowserNotFound`] if no browser is configured and none
    /// of the default candidates is on `PATH`.
    pub fn from_config(render: &RenderConfig) -> Result<Self> {
        let binary = match &render.browser {
            Some(binary) => binary.clone(),
            None => {
                let path = std::env::var_os("PATH").unwrap_or_default();
                locate(DEFAULT_BROWSERS, &path).ok_or_else(|| Error::BrowserNotFound {
                    tried: DEFAULT_BROWSERS.join(", "),
                })?
            }
        };
        debug!(binary = %binary.display(), "Using headless browser");
        Ok(Self::new(binary, render.extra_args.clone(), render.timeout()))
    }

    /// The browser binary.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, markup_url: &str, target: &Path, layout: &PageLayout) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-pdf-header-footer")
            .arg(format!("--window-size={},{}", layout.width_px, layout.height_px))
            .arg(format!("--print-to-pdf={}", target.display()))
            .args(&self.extra_args)
            .arg(markup_url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait::async_trait]
impl RenderEngine for ChromiumEngine {
    fn name(&self) -> &str {
        "chromium"
    }

    async fn render(&self, markup: &Path, layout: &PageLayout) -> Result<Vec<u8>> {
        let absolute = markup
            .canonicalize()
            .map_err(|err| Error::export(markup, format!("markup not readable: {err}")))?;
        let target = absolute.with_extension(PARTIAL_EXTENSION);
        let url = file_url(&absolute);

        trace!(url = %url, target = %target.display(), "Launching browser");
        let child = self
            .command(&url, &target, layout)
            .spawn()
            .map_err(|err| {
                Error::export(
                    markup,
                    format!("failed to launch {}: {err}", self.binary.display()),
                )
            })?;

        // Dropping the wait future drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output.map_err(|err| Error::export(markup, err.to_string()))?,
            Err(_) => {
                discard(&target).await;
                return Err(Error::Timeout {
                    operation: format!("render {}", markup.display()),
                });
            }
        };

        if !output.status.success() {
            discard(&target).await;
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::export(
                markup,
                format!("browser exited with {}: {}", output.status, tail(&stderr)),
            ));
        }

        let bytes = tokio::fs::read(&target)
            .await
            .map_err(|err| Error::export(markup, format!("browser wrote no document: {err}")))?;
        discard(&target).await;
        Ok(bytes)
    }
}

async fn discard(path: &Path) {
    let _ = tokio::fs::remove_file(path).await;
}

/// Find the first candidate binary present in a `PATH`-style list.
fn locate(candidates: &[&str], path: &OsString) -> Option<PathBuf> {
    std::env::split_paths(path).find_map(|dir| {
        candidates
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

/// Build a `file://` URL for an absolute path.
fn file_url(path: &Path) -> String {
    let mut url = String::from("file://");
    for c in path.to_string_lossy().chars() {
        match c {
            ' ' => url.push_str("%20"),
            '#' => url.push_str("%23"),
            '%' => url.push_str("%25"),
            '?' => url.push_str("%3F"),
            '\\' => url.push('/'),
            _ => url.push(c),
        }
    }
    url
}

/// The last `STDERR_TAIL` characters of browser output, trimmed.
fn tail(text: &str) -> &str {
    let text = text.trim();
    match text.char_indices().rev().nth(STDERR_TAIL - 1) {
        Some((index, _)) => &text[index..],
        None => text,
    }
}

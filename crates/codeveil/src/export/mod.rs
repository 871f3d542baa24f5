//! Fixed-layout document export.
//!
//! Markup documents are handed to a [`RenderEngine`], which turns one markup
//! file into PDF bytes. The engine is the only external-process boundary in
//! the pipeline; tests substitute a fake.
//!
//! Each markup file is deleted once its export has been attempted, whether
//! or not the engine succeeded.

mod chromium;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::markup::PageLayout;

pub use chromium::ChromiumEngine;

/// Extension of exported documents.
pub const DOCUMENT_EXTENSION: &str = "pdf";

/// A trait for engines that render markup into fixed-layout documents.
///
/// One call is one session: whatever process or connection the engine needs
/// is acquired and released inside `render`.
#[async_trait::async_trait]
pub trait RenderEngine: Send + Sync + std::fmt::Debug {
    /// Human-readable engine name for logging.
    fn name(&self) -> &str;

    /// Render the markup file at `markup` into document bytes.
    ///
    /// # Errors
    ///
    /// Returns an export-class error if the engine fails to load or render.
    async fn render(&self, markup: &Path, layout: &PageLayout) -> Result<Vec<u8>>;
}

/// One pending markup-to-document conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportJob {
    /// Source file the markup was rendered from.
    pub source: PathBuf,
    /// Markup file to render (deleted afterwards).
    pub markup: PathBuf,
    /// Document file to write.
    pub document: PathBuf,
    /// Page geometry.
    pub layout: PageLayout,
}

impl ExportJob {
    /// Create a job writing the document next to the markup.
    #[must_use]
    pub fn new(source: PathBuf, markup: PathBuf, layout: PageLayout) -> Self {
        let document = markup.with_extension(DOCUMENT_EXTENSION);
        Self {
            source,
            markup,
            document,
            layout,
        }
    }
}

/// The result of one export attempt.
#[derive(Debug)]
pub struct ExportOutcome {
    /// The job that was attempted.
    pub job: ExportJob,
    /// Path of the written document, or why it failed.
    pub result: Result<PathBuf>,
}

/// Export one document and delete its markup.
///
/// # Errors
///
/// Returns the engine's error, or an I/O error if the document cannot be
/// written. The markup file is removed in every case.
pub async fn export_document(engine: &dyn RenderEngine, job: &ExportJob) -> Result<PathBuf> {
    debug!(engine = engine.name(), markup = %job.markup.display(), "Exporting");

    let written = match engine.render(&job.markup, &job.layout).await {
        Ok(bytes) if bytes.is_empty() => Err(Error::export(
            &job.markup,
            "rendering engine produced an empty document",
        )),
        Ok(bytes) => tokio::fs::write(&job.document, &bytes)
            .await
            .map(|()| job.document.clone())
            .map_err(Error::from),
        Err(err) => Err(err),
    };

    remove_markup(&job.markup).await;

    match &written {
        Ok(path) => info!(document = %path.display(), "Exported"),
        Err(err) => warn!(markup = %job.markup.display(), error = %err, "Export failed"),
    }
    written
}

async fn remove_markup(markup: &Path) {
    match tokio::fs::remove_file(markup).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(markup = %markup.display(), error = %err, "Failed to remove markup"),
    }
}

/// Export many documents with at most `max_concurrent` engine sessions.
///
/// A failed document never stops the batch. Outcomes come back in job order.
pub async fn export_all(
    engine: Arc<dyn RenderEngine>,
    jobs: Vec<ExportJob>,
    max_concurrent: usize,
) -> Vec<ExportOutcome> {
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut set = JoinSet::new();

    for (index, job) in jobs.iter().cloned().enumerate() {
        let engine = Arc::clone(&engine);
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => export_document(engine.as_ref(), &job).await,
                Err(_) => Err(Error::internal("export semaphore closed")),
            };
            (index, ExportOutcome { job, result })
        });
    }

    let mut slots: Vec<Option<ExportOutcome>> = jobs.iter().map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, outcome)) => slots[index] = Some(outcome),
            Err(err) => warn!(error = %err, "Export task did not complete"),
        }
    }

    let mut outcomes = Vec::with_capacity(jobs.len());
    for (job, slot) in jobs.into_iter().zip(slots) {
        if let Some(outcome) = slot {
            outcomes.push(outcome);
        } else {
            remove_markup(&job.markup).await;
            outcomes.push(ExportOutcome {
                result: Err(Error::export(&job.markup, "export task panicked")),
                job,
            });
        }
    }
    outcomes
}

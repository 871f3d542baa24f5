//! The conversion pipeline for one project.
//!
//! A run validates the project configuration, walks every configured
//! directory into a mirrored output tree of markup, exports the markup to
//! documents, and packages the tree into an archive. Configuration errors
//! abort before anything is written; export failures are recorded per file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::archive::{archive_path, archive_tree};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::export::{export_all, RenderEngine};
use crate::policy::ProjectConfig;
use crate::summary::{FileOutcome, RunSummary};
use crate::walker::Walker;

/// Runs conversions with one configuration and rendering engine.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
    engine: Arc<dyn RenderEngine>,
}

impl Pipeline {
    /// Create a pipeline.
    #[must_use]
    pub fn new(config: Config, engine: Arc<dyn RenderEngine>) -> Self {
        Self { config, engine }
    }

    /// The pipeline configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Convert the project at `input_root` into
    /// `<output_base>/<projects_dir>/<basename>/` and its archive.
    ///
    /// # Errors
    ///
    /// Returns a configuration-class error before writing anything if the
    /// project configuration does not match the input. Returns
    /// [`Error::MalformedInput`] if a file is malformed and the configured
    /// policy is to abort. Export failures are not errors; they are recorded
    /// in the summary.
    pub async fn run(
        &self,
        input_root: &Path,
        project: &ProjectConfig,
        output_base: &Path,
    ) -> Result<RunSummary> {
        let started_at = Utc::now();
        let input_root = input_root.canonicalize().map_err(|err| {
            Error::config_validation(format!(
                "input directory {} is not accessible: {err}",
                input_root.display()
            ))
        })?;
        project.validate(&input_root)?;

        let basename = input_root.file_name().ok_or_else(|| {
            Error::config_validation(format!(
                "input directory {} has no name",
                input_root.display()
            ))
        })?;
        let projects = self.prepare_projects_dir(output_base)?;
        let output_root = projects.join(basename);
        if input_root.starts_with(&output_root) {
            return Err(Error::config_validation(format!(
                "input directory {} lies inside the output tree {}",
                input_root.display(),
                output_root.display()
            )));
        }
        reset_dir(&output_root)?;

        info!(
            input = %input_root.display(),
            output = %output_root.display(),
            directories = project.len(),
            "Starting conversion"
        );

        let walker = Walker::new(&self.config, input_root.clone(), output_root.clone())
            .with_claimed(project.claimed_paths())
            .with_excluded(BTreeSet::from([projects.clone()]));

        let mut files = Vec::new();
        let mut jobs = Vec::new();
        for (name, policy) in project.directories() {
            let report = walker.walk(name, policy)?;
            for missing in policy.missing_exceptions(&report.seen) {
                warn!(
                    directory = name,
                    script = %missing.script,
                    target = %missing.target,
                    "Exception names a file that does not exist"
                );
            }
            files.extend(report.outcomes);
            jobs.extend(report.jobs);
        }

        let exported = export_all(
            Arc::clone(&self.engine),
            jobs,
            self.config.render.max_concurrent,
        )
        .await;
        for outcome in exported {
            if let Err(err) = outcome.result {
                record_export_failure(&mut files, &outcome.job.document, &err);
            }
        }

        let archive = archive_path(&output_root);
        let archive = match archive_tree(&output_root, &archive) {
            Ok(_) => Some(archive),
            Err(err) => {
                error!(archive = %archive.display(), error = %err, "Failed to write archive");
                None
            }
        };

        if archive.is_some() && !self.config.output.keep_tree {
            std::fs::remove_dir_all(&output_root)?;
        }

        let summary = RunSummary {
            input_root,
            output_root,
            archive,
            started_at,
            finished_at: Utc::now(),
            files,
        };
        let counts = summary.counts();
        info!(
            redacted = counts.redacted,
            clean = counts.clean,
            skipped = counts.skipped,
            failed = counts.failed,
            "Conversion finished"
        );
        Ok(summary)
    }

    /// Create the projects directory and return its canonical path.
    fn prepare_projects_dir(&self, output_base: &Path) -> Result<PathBuf> {
        let projects = output_base.join(&self.config.output.projects_dir);
        std::fs::create_dir_all(&projects).map_err(|source| Error::DirectoryCreate {
            path: projects.clone(),
            source,
        })?;
        Ok(projects.canonicalize()?)
    }
}

/// Start from an empty output tree so stale documents never reach the archive.
fn reset_dir(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_dir_all(path)?;
    }
    std::fs::create_dir_all(path).map_err(|source| Error::DirectoryCreate {
        path: path.to_path_buf(),
        source,
    })
}

fn record_export_failure(files: &mut [FileOutcome], document: &Path, err: &Error) {
    match files
        .iter_mut()
        .find(|file| file.document.as_deref() == Some(document))
    {
        Some(file) => file.fail(err.to_string()),
        None => warn!(document = %document.display(), error = %err, "Export failed for unknown file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MalformedPolicy;
    use crate::markup::PageLayout;
    use crate::policy::{DirectoryPolicy, ROOT_DIRECTORY};
    use crate::summary::FileStatus;

    const SOURCE: &str = "def f():\n    \"\"\"\n    Doc.\n    \"\"\"\n\n    a = 1\n    b = 2\n    return a + b\n";

    /// Engine that returns the markup bytes, failing for listed file names.
    #[derive(Debug, Default)]
    struct FakeEngine {
        fail_on: Vec<String>,
    }

    #[async_trait::async_trait]
    impl RenderEngine for FakeEngine {
        fn name(&self) -> &str {
            "fake"
        }

        async fn render(&self, markup: &Path, _layout: &PageLayout) -> Result<Vec<u8>> {
            let name = markup.file_name().unwrap().to_string_lossy().to_string();
            if self.fail_on.contains(&name) {
                return Err(Error::export(markup, "render failed"));
            }
            Ok(std::fs::read(markup)?)
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        input: PathBuf,
        base: PathBuf,
    }

    fn fixture(files: &[(&str, &str)]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("demo");
        let base = dir.path().join("out");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::create_dir_all(&base).unwrap();
        for (path, content) in files {
            let path = input.join(path);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        Fixture {
            _dir: dir,
            input,
            base,
        }
    }

    fn pipeline(config: Config, engine: FakeEngine) -> Pipeline {
        Pipeline::new(config, Arc::new(engine))
    }

    #[tokio::test]
    async fn test_run_private_directory() {
        crate::logging::init_test_logging();
        let fx = fixture(&[("lib/a.py", SOURCE), ("lib/__init__.py", "")]);
        let project = ProjectConfig::new().with_directory("lib", DirectoryPolicy::private());

        let summary = pipeline(Config::default(), FakeEngine::default())
            .run(&fx.input, &project, &fx.base)
            .await
            .unwrap();

        let output = fx.base.canonicalize().unwrap().join("projects/demo");
        assert_eq!(summary.output_root, output);
        assert!(output.join("lib/a.pdf").exists());
        assert!(!output.join("lib/a.html").exists());
        assert_eq!(summary.archive, Some(output.with_extension("zip")));
        assert!(output.with_extension("zip").exists());
        assert!(!summary.has_failures());
        assert_eq!(summary.counts().redacted, 1);
        assert_eq!(summary.counts().skipped, 1);
    }

    #[tokio::test]
    async fn test_config_error_writes_nothing() {
        let fx = fixture(&[("lib/a.py", SOURCE)]);
        let project = ProjectConfig::new().with_directory("missing", DirectoryPolicy::private());

        let err = pipeline(Config::default(), FakeEngine::default())
            .run(&fx.input, &project, &fx.base)
            .await
            .unwrap_err();
        assert!(err.is_config_error());
        assert!(!fx.base.join("projects").exists());
    }

    #[tokio::test]
    async fn test_export_failure_is_recorded_and_archive_still_written() {
        let fx = fixture(&[("lib/a.py", SOURCE), ("lib/b.py", SOURCE)]);
        let project = ProjectConfig::new().with_directory("lib", DirectoryPolicy::private());
        let engine = FakeEngine {
            fail_on: vec!["a.html".to_string()],
        };

        let summary = pipeline(Config::default(), engine)
            .run(&fx.input, &project, &fx.base)
            .await
            .unwrap();

        assert!(summary.has_failures());
        assert_eq!(summary.counts().failed, 1);
        let failed: Vec<_> = summary.failures().map(|f| f.source.clone()).collect();
        assert_eq!(failed, vec![PathBuf::from("lib/a.py")]);
        assert!(!summary.output_root.join("lib/a.html").exists());
        assert!(summary.output_root.join("lib/b.pdf").exists());
        assert!(summary.archive.is_some());
    }

    #[tokio::test]
    async fn test_malformed_abort_policy() {
        let fx = fixture(&[("lib/a.py", "def broken():\n    pass\n")]);
        let project = ProjectConfig::new().with_directory("lib", DirectoryPolicy::private());
        let mut config = Config::default();
        config.redaction.on_malformed = MalformedPolicy::Abort;

        let err = pipeline(config, FakeEngine::default())
            .run(&fx.input, &project, &fx.base)
            .await
            .unwrap_err();
        assert!(err.is_malformed_input());
    }

    #[tokio::test]
    async fn test_malformed_skip_policy() {
        let fx = fixture(&[("lib/a.py", "def broken():\n    pass\n"), ("lib/b.py", SOURCE)]);
        let project = ProjectConfig::new().with_directory("lib", DirectoryPolicy::private());

        let summary = pipeline(Config::default(), FakeEngine::default())
            .run(&fx.input, &project, &fx.base)
            .await
            .unwrap();
        assert_eq!(summary.counts().failed, 1);
        assert_eq!(summary.counts().redacted, 1);
    }

    #[tokio::test]
    async fn test_root_entry_leaves_claimed_directories_to_their_policy() {
        let fx = fixture(&[("main.py", SOURCE), ("lib/a.py", SOURCE)]);
        let project = ProjectConfig::new()
            .with_directory(ROOT_DIRECTORY, DirectoryPolicy::public(Vec::new()))
            .with_directory("lib", DirectoryPolicy::private());

        let summary = pipeline(Config::default(), FakeEngine::default())
            .run(&fx.input, &project, &fx.base)
            .await
            .unwrap();

        assert_eq!(summary.files.len(), 2);
        let status_of = |source: &str| {
            summary
                .files
                .iter()
                .find(|f| f.source == Path::new(source))
                .map(|f| f.status.clone())
                .unwrap()
        };
        assert_eq!(status_of("main.py"), FileStatus::Clean);
        assert!(matches!(status_of("lib/a.py"), FileStatus::Redacted { .. }));
    }

    #[tokio::test]
    async fn test_output_inside_input_is_not_walked() {
        let fx = fixture(&[("main.py", SOURCE)]);
        let project =
            ProjectConfig::new().with_directory(ROOT_DIRECTORY, DirectoryPolicy::private());
        let pipeline = pipeline(Config::default(), FakeEngine::default());

        // Two runs: the second must not pick up the first run's output.
        pipeline.run(&fx.input, &project, &fx.input).await.unwrap();
        let summary = pipeline.run(&fx.input, &project, &fx.input).await.unwrap();
        assert_eq!(summary.files.len(), 1);
    }

    #[tokio::test]
    async fn test_rerun_replaces_stale_output() {
        let fx = fixture(&[("lib/a.py", SOURCE)]);
        let project = ProjectConfig::new().with_directory("lib", DirectoryPolicy::private());
        let pipeline = pipeline(Config::default(), FakeEngine::default());

        let first = pipeline.run(&fx.input, &project, &fx.base).await.unwrap();
        std::fs::write(first.output_root.join("lib/stale.pdf"), "old").unwrap();
        let second = pipeline.run(&fx.input, &project, &fx.base).await.unwrap();
        assert!(!second.output_root.join("lib/stale.pdf").exists());
    }

    #[tokio::test]
    async fn test_discard_tree_keeps_archive_only() {
        let fx = fixture(&[("lib/a.py", SOURCE)]);
        let project = ProjectConfig::new().with_directory("lib", DirectoryPolicy::private());
        let mut config = Config::default();
        config.output.keep_tree = false;

        let summary = pipeline(config, FakeEngine::default())
            .run(&fx.input, &project, &fx.base)
            .await
            .unwrap();
        assert!(!summary.output_root.exists());
        assert!(summary.archive.unwrap().exists());
    }

    #[test]
    fn test_record_export_failure() {
        let mut files = vec![FileOutcome {
            source: PathBuf::from("lib/a.py"),
            document: Some(PathBuf::from("/out/lib/a.pdf")),
            status: FileStatus::Clean,
        }];
        record_export_failure(
            &mut files,
            Path::new("/out/lib/a.pdf"),
            &Error::export("/out/lib/a.html", "boom"),
        );
        assert!(files[0].status.is_failure());
        assert!(files[0].document.is_none());
    }
}

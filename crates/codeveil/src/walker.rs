//! Directory walking and per-file conversion.
//!
//! Each directory is listed once and handled by up to two strategies:
//!
//! - [`Strategy::ConvertLeaf`] when it directly holds eligible source files:
//!   each file is redacted under the directory's policy and written as markup.
//! - [`Strategy::DescendChildren`] when it holds subdirectories: each one is
//!   walked with the same (inherited) policy.
//!
//! A directory with both files and subdirectories gets both.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{Config, MalformedPolicy};
use crate::error::{Error, Result};
use crate::export::ExportJob;
use crate::markup::{render, write_markup};
use crate::policy::{DirectoryPolicy, ROOT_DIRECTORY};
use crate::redact::{Redaction, Redactor};
use crate::scanner::SourceDocument;
use crate::summary::{FileOutcome, FileStatus};

/// Reason recorded for skipped module initializers.
const INITIALIZER_SKIP_REASON: &str = "module initializer";

/// How a directory is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Convert the eligible files the directory holds directly.
    ConvertLeaf,
    /// Walk every subdirectory with the inherited policy.
    DescendChildren,
}

impl Strategy {
    /// Strategies that apply to a listing, in execution order.
    #[must_use]
    pub fn for_listing(listing: &DirectoryListing) -> Vec<Self> {
        let mut strategies = Vec::with_capacity(2);
        if !listing.sources.is_empty() {
            strategies.push(Self::ConvertLeaf);
        }
        if !listing.subdirectories.is_empty() {
            strategies.push(Self::DescendChildren);
        }
        strategies
    }
}

/// The direct children of one directory, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    /// Eligible source file names.
    pub sources: Vec<String>,
    /// Module initializer files present.
    pub initializers: Vec<String>,
    /// Subdirectory names, after ignore rules.
    pub subdirectories: Vec<String>,
}

/// Everything produced by walking one configured directory.
#[derive(Debug, Default)]
pub struct WalkReport {
    /// Per-file outcomes in visit order.
    pub outcomes: Vec<FileOutcome>,
    /// Markup waiting to be exported, one per converted file.
    pub jobs: Vec<ExportJob>,
    /// Names of every eligible file seen.
    pub seen: BTreeSet<String>,
}

/// Walks configured directories and writes redacted markup.
#[derive(Debug)]
pub struct Walker<'a> {
    config: &'a Config,
    redactor: Redactor,
    input_root: PathBuf,
    output_root: PathBuf,
    claimed: BTreeSet<PathBuf>,
    excluded: BTreeSet<PathBuf>,
}

impl<'a> Walker<'a> {
    /// Create a walker mirroring `input_root` into `output_root`.
    #[must_use]
    pub fn new(config: &'a Config, input_root: PathBuf, output_root: PathBuf) -> Self {
        Self {
            config,
            redactor: Redactor::new(config.redaction.markers.clone()),
            input_root,
            output_root,
            claimed: BTreeSet::new(),
            excluded: BTreeSet::new(),
        }
    }

    /// Relative directories left to their own policy when met while descending.
    #[must_use]
    pub fn with_claimed(mut self, claimed: BTreeSet<PathBuf>) -> Self {
        self.claimed = claimed;
        self
    }

    /// Absolute directories never descended into (such as the output tree).
    #[must_use]
    pub fn with_excluded(mut self, excluded: BTreeSet<PathBuf>) -> Self {
        self.excluded = excluded;
        self
    }

    /// Walk one configured directory (relative to the input root).
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be listed or created, or if a
    /// file is malformed and the policy is [`MalformedPolicy::Abort`].
    pub fn walk(&self, name: &str, policy: &DirectoryPolicy) -> Result<WalkReport> {
        let mut report = WalkReport::default();
        info!(directory = name, visibility = %policy.visibility, "Converting directory");
        // The input root walks as the empty relative path
        let rel = if name == ROOT_DIRECTORY {
            Path::new("")
        } else {
            Path::new(name)
        };
        self.walk_dir(rel, policy, &mut report)?;
        Ok(report)
    }

    fn walk_dir(&self, rel: &Path, policy: &DirectoryPolicy, report: &mut WalkReport) -> Result<()> {
        let listing = self.list(&self.input_root.join(rel))?;

        for initializer in &listing.initializers {
            report.outcomes.push(FileOutcome {
                source: rel.join(initializer),
                document: None,
                status: FileStatus::Skipped {
                    reason: INITIALIZER_SKIP_REASON.to_string(),
                },
            });
        }

        for strategy in Strategy::for_listing(&listing) {
            debug!(directory = %rel.display(), ?strategy, "Applying strategy");
            match strategy {
                Strategy::ConvertLeaf => self.convert_leaf(rel, &listing, policy, report)?,
                Strategy::DescendChildren => self.descend_children(rel, &listing, policy, report)?,
            }
        }
        Ok(())
    }

    fn convert_leaf(
        &self,
        rel: &Path,
        listing: &DirectoryListing,
        policy: &DirectoryPolicy,
        report: &mut WalkReport,
    ) -> Result<()> {
        let output_dir = self.output_root.join(rel);
        for name in &listing.sources {
            report.seen.insert(name.clone());
            let source = rel.join(name);
            match self.convert_file(rel, name, policy, &output_dir) {
                Ok((status, job)) => {
                    report.outcomes.push(FileOutcome {
                        source,
                        document: Some(job.document.clone()),
                        status,
                    });
                    report.jobs.push(job);
                }
                Err(err) if self.is_fatal(&err) => return Err(err),
                Err(err) => {
                    warn!(file = %source.display(), error = %err, "Skipping file");
                    report.outcomes.push(FileOutcome {
                        source,
                        document: None,
                        status: FileStatus::Failed {
                            reason: err.to_string(),
                        },
                    });
                }
            }
        }
        Ok(())
    }

    fn convert_file(
        &self,
        rel: &Path,
        name: &str,
        policy: &DirectoryPolicy,
        output_dir: &Path,
    ) -> Result<(FileStatus, ExportJob)> {
        let input_path = self.input_root.join(rel).join(name);
        let document = SourceDocument::read(&input_path)?;

        let triggers = policy.triggers_for(name, self.redactor.markers());
        let redaction = if triggers.is_empty() {
            Redaction::unchanged(document.lines())
        } else {
            self.redactor.redact_document(&document, &triggers)?
        };

        let status = if redaction.is_redacted() {
            FileStatus::Redacted {
                spans: redaction.spans.len(),
                obscured_lines: redaction.obscured_lines(),
            }
        } else {
            FileStatus::Clean
        };

        let markup = render(&redaction, self.config.render.landscape);
        let markup_path = write_markup(output_dir, name, &markup)?;
        debug!(file = %input_path.display(), status = status.label(), "Converted");
        Ok((status, ExportJob::new(input_path, markup_path, markup.layout)))
    }

    fn descend_children(
        &self,
        rel: &Path,
        listing: &DirectoryListing,
        policy: &DirectoryPolicy,
        report: &mut WalkReport,
    ) -> Result<()> {
        for name in &listing.subdirectories {
            let child = rel.join(name);
            if self.claimed.contains(&child) {
                debug!(directory = %child.display(), "Configured separately, not descending");
                continue;
            }
            if self.excluded.contains(&self.input_root.join(&child)) {
                debug!(directory = %child.display(), "Excluded, not descending");
                continue;
            }

            let output_dir = self.output_root.join(&child);
            std::fs::create_dir_all(&output_dir).map_err(|source| Error::DirectoryCreate {
                path: output_dir.clone(),
                source,
            })?;
            self.walk_dir(&child, policy, report)?;
        }
        Ok(())
    }

    /// Only malformed input may be downgraded to a per-file failure.
    fn is_fatal(&self, err: &Error) -> bool {
        match self.config.redaction.on_malformed {
            MalformedPolicy::Abort => true,
            MalformedPolicy::Skip => !(err.is_malformed_input() || matches!(err, Error::SourceRead { .. })),
        }
    }

    /// List the direct children of a directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn list(&self, dir: &Path) -> Result<DirectoryListing> {
        let walk = &self.config.walk;
        let mut listing = DirectoryListing::default();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                if !walk.ignored_directories.contains(&name) {
                    listing.subdirectories.push(name);
                }
            } else if file_type.is_file() {
                let has_extension = Path::new(&name)
                    .extension()
                    .is_some_and(|ext| ext == walk.source_extension.as_str());
                if !has_extension {
                    continue;
                }
                if name == walk.initializer_name {
                    listing.initializers.push(name);
                } else {
                    listing.sources.push(name);
                }
            }
        }

        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redact::OBSCURE_OPEN;

    const PRIVATE_SOURCE: &str = "def f():\n    \"\"\"\n    Doc.\n    \"\"\"\n\n    a = 1\n    b = 2\n    return a + b\n";

    struct Fixture {
        _dir: tempfile::TempDir,
        input: PathBuf,
        output: PathBuf,
    }

    fn fixture(files: &[(&str, &str)]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::create_dir_all(&output).unwrap();
        for (path, content) in files {
            let path = input.join(path);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        Fixture {
            _dir: dir,
            input,
            output,
        }
    }

    #[test]
    fn test_strategy_for_listing() {
        let leaf = DirectoryListing {
            sources: vec!["a.py".into()],
            ..DirectoryListing::default()
        };
        let container = DirectoryListing {
            subdirectories: vec!["sub".into()],
            ..DirectoryListing::default()
        };
        let both = DirectoryListing {
            sources: vec!["a.py".into()],
            subdirectories: vec!["sub".into()],
            ..DirectoryListing::default()
        };
        assert_eq!(Strategy::for_listing(&leaf), vec![Strategy::ConvertLeaf]);
        assert_eq!(Strategy::for_listing(&container), vec![Strategy::DescendChildren]);
        assert_eq!(
            Strategy::for_listing(&both),
            vec![Strategy::ConvertLeaf, Strategy::DescendChildren]
        );
        assert!(Strategy::for_listing(&DirectoryListing::default()).is_empty());
    }

    #[test]
    fn test_list_filters_and_sorts() {
        let fx = fixture(&[
            ("lib/b.py", ""),
            ("lib/a.py", ""),
            ("lib/__init__.py", ""),
            ("lib/notes.txt", ""),
            ("lib/__pycache__/a.cpython.pyc", ""),
            ("lib/sub/c.py", ""),
        ]);
        let config = Config::default();
        let walker = Walker::new(&config, fx.input.clone(), fx.output.clone());

        let listing = walker.list(&fx.input.join("lib")).unwrap();
        assert_eq!(listing.sources, vec!["a.py", "b.py"]);
        assert_eq!(listing.initializers, vec!["__init__.py"]);
        assert_eq!(listing.subdirectories, vec!["sub"]);
    }

    #[test]
    fn test_private_leaf_directory() {
        let fx = fixture(&[("lib/a.py", PRIVATE_SOURCE), ("lib/__init__.py", "x = 1\n")]);
        let config = Config::default();
        let walker = Walker::new(&config, fx.input.clone(), fx.output.clone());

        let report = walker.walk("lib", &DirectoryPolicy::private()).unwrap();

        assert_eq!(report.jobs.len(), 1);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0].source, PathBuf::from("lib/__init__.py"));
        assert!(matches!(report.outcomes[0].status, FileStatus::Skipped { .. }));
        assert_eq!(
            report.outcomes[1].status,
            FileStatus::Redacted {
                spans: 1,
                obscured_lines: 3
            }
        );

        let html = std::fs::read_to_string(fx.output.join("lib/a.html")).unwrap();
        assert_eq!(html.matches(r#"<span class="blur">"#).count(), 3);
        assert!(!fx.output.join("lib/__init__.html").exists());
    }

    #[test]
    fn test_public_directory_without_exceptions_is_clean() {
        let fx = fixture(&[("lib/a.py", PRIVATE_SOURCE)]);
        let config = Config::default();
        let walker = Walker::new(&config, fx.input.clone(), fx.output.clone());

        let report = walker.walk("lib", &DirectoryPolicy::public(Vec::new())).unwrap();
        assert_eq!(report.outcomes[0].status, FileStatus::Clean);
        let html = std::fs::read_to_string(fx.output.join("lib/a.html")).unwrap();
        assert!(!html.contains(OBSCURE_OPEN));
    }

    #[test]
    fn test_container_directory_descends() {
        let fx = fixture(&[("pkg/one/a.py", PRIVATE_SOURCE), ("pkg/two/b.py", PRIVATE_SOURCE)]);
        let config = Config::default();
        let walker = Walker::new(&config, fx.input.clone(), fx.output.clone());

        let report = walker.walk("pkg", &DirectoryPolicy::private()).unwrap();
        let sources: Vec<_> = report.outcomes.iter().map(|o| o.source.clone()).collect();
        assert_eq!(
            sources,
            vec![PathBuf::from("pkg/one/a.py"), PathBuf::from("pkg/two/b.py")]
        );
        assert!(fx.output.join("pkg/one/a.html").exists());
        assert!(fx.output.join("pkg/two/b.html").exists());
    }

    #[test]
    fn test_leaf_and_container_at_once() {
        let fx = fixture(&[("lib/a.py", PRIVATE_SOURCE), ("lib/sub/b.py", PRIVATE_SOURCE)]);
        let config = Config::default();
        let walker = Walker::new(&config, fx.input.clone(), fx.output.clone());

        let report = walker.walk("lib", &DirectoryPolicy::private()).unwrap();
        assert_eq!(report.jobs.len(), 2);
        assert!(fx.output.join("lib/a.html").exists());
        assert!(fx.output.join("lib/sub/b.html").exists());
    }

    #[test]
    fn test_claimed_children_are_left_alone() {
        let fx = fixture(&[("a.py", PRIVATE_SOURCE), ("models/b.py", PRIVATE_SOURCE)]);
        let config = Config::default();
        let walker = Walker::new(&config, fx.input.clone(), fx.output.clone())
            .with_claimed([PathBuf::from("models")].into_iter().collect());

        let report = walker.walk(ROOT_DIRECTORY, &DirectoryPolicy::private()).unwrap();
        assert_eq!(report.jobs.len(), 1);
        assert!(!fx.output.join("models").exists());
    }

    #[test]
    fn test_excluded_children_are_left_alone() {
        let fx = fixture(&[("a.py", PRIVATE_SOURCE), ("projects/old/b.py", PRIVATE_SOURCE)]);
        let config = Config::default();
        let walker = Walker::new(&config, fx.input.clone(), fx.output.clone())
            .with_excluded([fx.input.join("projects")].into_iter().collect());

        let report = walker.walk(ROOT_DIRECTORY, &DirectoryPolicy::private()).unwrap();
        assert_eq!(report.jobs.len(), 1);
    }

    #[test]
    fn test_malformed_file_skipped_by_default() {
        crate::logging::init_test_logging();
        let fx = fixture(&[("lib/a.py", "def broken():\n    pass\n"), ("lib/b.py", PRIVATE_SOURCE)]);
        let config = Config::default();
        let walker = Walker::new(&config, fx.input.clone(), fx.output.clone());

        let report = walker.walk("lib", &DirectoryPolicy::private()).unwrap();
        assert!(report.outcomes[0].status.is_failure());
        assert!(report.outcomes[0].document.is_none());
        assert!(!fx.output.join("lib/a.html").exists());
        assert!(matches!(report.outcomes[1].status, FileStatus::Redacted { .. }));
        assert_eq!(report.jobs.len(), 1);
    }

    #[test]
    fn test_malformed_file_aborts_when_configured() {
        let fx = fixture(&[("lib/a.py", "def broken():\n    pass\n")]);
        let mut config = Config::default();
        config.redaction.on_malformed = MalformedPolicy::Abort;
        let walker = Walker::new(&config, fx.input.clone(), fx.output.clone());

        let err = walker.walk("lib", &DirectoryPolicy::private()).unwrap_err();
        assert!(err.is_malformed_input());
    }

    #[test]
    fn test_walk_records_seen_files() {
        let fx = fixture(&[("lib/a.py", PRIVATE_SOURCE), ("lib/sub/b.py", PRIVATE_SOURCE)]);
        let config = Config::default();
        let walker = Walker::new(&config, fx.input.clone(), fx.output.clone());

        let report = walker.walk("lib", &DirectoryPolicy::public(Vec::new())).unwrap();
        let seen: Vec<&str> = report.seen.iter().map(String::as_str).collect();
        assert_eq!(seen, vec!["a.py", "b.py"]);
    }

    #[test]
    fn test_root_entry_uses_bare_relative_paths() {
        let fx = fixture(&[("main.py", PRIVATE_SOURCE), ("pkg/b.py", PRIVATE_SOURCE)]);
        let config = Config::default();
        let walker = Walker::new(&config, fx.input.clone(), fx.output.clone());

        let report = walker.walk(ROOT_DIRECTORY, &DirectoryPolicy::private()).unwrap();
        let sources: Vec<_> = report.outcomes.iter().map(|o| o.source.clone()).collect();
        assert_eq!(sources, vec![PathBuf::from("main.py"), PathBuf::from("pkg/b.py")]);
        assert!(fx.output.join("main.html").exists());
        assert!(fx.output.join("pkg/b.html").exists());
    }
}

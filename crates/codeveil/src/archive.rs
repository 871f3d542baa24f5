//! Packaging the output tree into a single archive.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Error, Result};

/// Extension of written archives.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Path of the archive for an output tree: a sibling `<name>.zip`.
#[must_use]
pub fn archive_path(root: &Path) -> PathBuf {
    root.with_extension(ARCHIVE_EXTENSION)
}

/// Zip every file under `root` into `archive`, replacing any existing archive.
///
/// Entry names are relative to `root` and `/`-separated. Directories are
/// stored as explicit entries so empty ones survive.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked or the archive written.
/// A partially written archive is removed.
pub fn archive_tree(root: &Path, archive: &Path) -> Result<u64> {
    if archive.starts_with(root) {
        return Err(Error::internal(format!(
            "archive {} must not be inside the tree it packages",
            archive.display()
        )));
    }

    let partial = archive.with_extension(format!("{ARCHIVE_EXTENSION}.partial"));
    let written = write_archive(root, &partial);
    let entries = match written {
        Ok(entries) => entries,
        Err(err) => {
            let _ = std::fs::remove_file(&partial);
            return Err(err);
        }
    };

    std::fs::rename(&partial, archive)?;
    info!(archive = %archive.display(), entries, "Wrote archive");
    Ok(entries)
}

fn write_archive(root: &Path, target: &Path) -> Result<u64> {
    let file = File::create(target)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries = 0;
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let name = entry_name(root, entry.path())?;

        if entry.file_type().is_dir() {
            zip.add_directory(name.as_str(), options)?;
        } else if entry.file_type().is_file() {
            debug!(entry = %name, "Adding to archive");
            zip.start_file(name.as_str(), options)?;
            let mut source = File::open(entry.path())?;
            std::io::copy(&mut source, &mut zip)?;
        } else {
            continue;
        }
        entries += 1;
    }

    let mut writer = zip.finish()?;
    writer.flush()?;
    Ok(entries)
}

/// Archive entry name for a path under `root`.
fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| Error::internal(format!("{} is outside {}", path.display(), root.display())))?;
    let parts: Vec<_> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect();
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_archive(path: &Path) -> Vec<(String, String)> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut entries = Vec::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).unwrap();
            let mut content = String::new();
            if file.is_file() {
                file.read_to_string(&mut content).unwrap();
            }
            entries.push((file.name().to_string(), content));
        }
        entries
    }

    #[test]
    fn test_archive_path() {
        assert_eq!(
            archive_path(Path::new("/out/projects/demo")),
            PathBuf::from("/out/projects/demo.zip")
        );
    }

    #[test]
    fn test_archive_tree_relative_names() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("demo");
        std::fs::create_dir_all(root.join("lib/sub")).unwrap();
        std::fs::write(root.join("lib/a.pdf"), "A").unwrap();
        std::fs::write(root.join("lib/sub/b.pdf"), "B").unwrap();
        let archive = archive_path(&root);

        let count = archive_tree(&root, &archive).unwrap();
        assert_eq!(count, 4);

        let entries = read_archive(&archive);
        let names: Vec<&str> = entries.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["lib/", "lib/a.pdf", "lib/sub/", "lib/sub/b.pdf"]);
        assert_eq!(entries[1].1, "A");
        assert_eq!(entries[3].1, "B");
    }

    #[test]
    fn test_archive_tree_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("demo");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("a.pdf"), "new").unwrap();
        let archive = archive_path(&root);
        std::fs::write(&archive, "stale, not a zip").unwrap();

        archive_tree(&root, &archive).unwrap();
        let entries = read_archive(&archive);
        assert_eq!(entries, vec![("a.pdf".to_string(), "new".to_string())]);
        assert!(!archive.with_extension("zip.partial").exists());
    }

    #[test]
    fn test_archive_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("empty");
        std::fs::create_dir_all(&root).unwrap();
        let archive = archive_path(&root);

        assert_eq!(archive_tree(&root, &archive).unwrap(), 0);
        assert!(read_archive(&archive).is_empty());
    }

    #[test]
    fn test_archive_inside_tree_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = archive_tree(dir.path(), &dir.path().join("self.zip")).unwrap_err();
        assert!(err.to_string().contains("must not be inside"));
    }

    #[test]
    fn test_archive_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("missing");
        let archive = archive_path(&root);
        assert!(archive_tree(&root, &archive).is_err());
        assert!(!archive.exists());
    }
}

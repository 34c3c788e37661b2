//! Safe zip extraction.
//!
//! Every entry name is resolved lexically against the destination before
//! anything touches the filesystem. An entry that would land outside the
//! destination aborts the whole extraction; entries written before it are
//! left for the caller to clean up with the directory.

use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::{ArtifactError, Result};

/// Counts of what an extraction wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// Regular files written.
    pub files: usize,
    /// Directory entries created.
    pub directories: usize,
}

/// Extracts zip bundles into a working directory.
#[derive(Debug, Default)]
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// Creates a new extractor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Extracts `archive` into `dest`.
    ///
    /// # Errors
    ///
    /// Returns `PathTraversal` for an entry resolving outside `dest`,
    /// `InvalidArchive` if the bytes are not a readable zip, and
    /// `Extraction` if writing an entry fails.
    pub fn extract(&self, archive: &[u8], dest: &Path) -> Result<ExtractionSummary> {
        let mut archive = ZipArchive::new(Cursor::new(archive)).map_err(|e| {
            ArtifactError::InvalidArchive {
                message: e.to_string(),
            }
        })?;

        debug!("Extracting {} entries into {}", archive.len(), dest.display());
        let mut summary = ExtractionSummary::default();

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(|e| ArtifactError::InvalidArchive {
                message: e.to_string(),
            })?;

            let name = entry.name().to_string();
            let Some(path) = resolve_within(dest, &name) else {
                warn!("Rejecting archive entry outside destination: {name}");
                return Err(ArtifactError::PathTraversal { entry: name }.into());
            };

            if entry.is_dir() {
                fs::create_dir_all(&path).map_err(|e| ArtifactError::extraction(&path, e))?;
                summary.directories += 1;
                continue;
            }

            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| ArtifactError::extraction(parent, e))?;
            }

            if fs::symlink_metadata(&path).is_ok_and(|meta| !meta.is_dir()) {
                fs::remove_file(&path).map_err(|e| ArtifactError::extraction(&path, e))?;
            }

            let mut out = File::create(&path).map_err(|e| ArtifactError::extraction(&path, e))?;
            io::copy(&mut entry, &mut out).map_err(|e| ArtifactError::extraction(&path, e))?;
            drop(out);

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&path, fs::Permissions::from_mode(mode & 0o7777))
                    .map_err(|e| ArtifactError::extraction(&path, e))?;
            }

            summary.files += 1;
        }

        info!(
            "Extracted {} files and {} directories into {}",
            summary.files,
            summary.directories,
            dest.display()
        );
        Ok(summary)
    }
}

/// Resolves `relative` against `root` without touching the filesystem.
///
/// `.` components are skipped and `..` removes the previous component.
/// Returns `None` for absolute paths, for paths that climb above `root`,
/// and for paths that resolve to `root` itself.
#[must_use]
pub fn resolve_within(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if parts.is_empty() {
        return None;
    }

    let mut resolved = root.to_path_buf();
    resolved.extend(parts);
    Some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunnerError;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, Option<&[u8]>)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            let options = SimpleFileOptions::default().unix_permissions(0o644);
            match content {
                Some(bytes) => {
                    writer.start_file(*name, options).unwrap();
                    writer.write_all(bytes).unwrap();
                }
                None => writer.add_directory(*name, options).unwrap(),
            }
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_resolve_within() {
        let root = Path::new("/work");
        assert_eq!(
            resolve_within(root, "environments/dev/main.tf"),
            Some(PathBuf::from("/work/environments/dev/main.tf"))
        );
        assert_eq!(
            resolve_within(root, "./a/../b.tf"),
            Some(PathBuf::from("/work/b.tf"))
        );
        assert_eq!(resolve_within(root, "../escape.tf"), None);
        assert_eq!(resolve_within(root, "a/../../escape.tf"), None);
        assert_eq!(resolve_within(root, "/etc/passwd"), None);
        assert_eq!(resolve_within(root, "./"), None);
        assert_eq!(resolve_within(root, ""), None);
    }

    #[test]
    fn test_extracts_files_and_directories() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let archive = build_zip(&[
            ("environments/", None),
            ("environments/dev/", None),
            ("environments/dev/main.tf", Some(b"terraform {}".as_slice())),
            ("modules/vpc/main.tf", Some(b"resource {}".as_slice())),
            ("metadata.json", Some(b"{}".as_slice())),
        ]);

        let summary = ArchiveExtractor::new()
            .extract(&archive, dir.path())
            .expect("extraction should succeed");

        assert_eq!(summary, ExtractionSummary { files: 3, directories: 2 });
        assert_eq!(
            fs::read_to_string(dir.path().join("environments/dev/main.tf")).unwrap(),
            "terraform {}"
        );
        assert!(dir.path().join("modules/vpc/main.tf").is_file());
        assert!(dir.path().join("metadata.json").is_file());
    }

    #[test]
    fn test_rejects_parent_traversal() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let dest = dir.path().join("bundle");
        fs::create_dir_all(&dest).unwrap();

        let archive = build_zip(&[
            ("ok.tf", Some(b"ok".as_slice())),
            ("../evil.tf", Some(b"evil".as_slice())),
        ]);

        let err = ArchiveExtractor::new().extract(&archive, &dest).unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Artifact(ArtifactError::PathTraversal { ref entry }) if entry == "../evil.tf"
        ));
        assert!(!dir.path().join("evil.tf").exists());
        assert!(dest.join("ok.tf").exists());
    }

    #[test]
    fn test_rejects_absolute_entry() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let archive = build_zip(&[("/tmp/evil.tf", Some(b"evil".as_slice()))]);

        let err = ArchiveExtractor::new().extract(&archive, dir.path()).unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Artifact(ArtifactError::PathTraversal { .. })
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let err = ArchiveExtractor::new()
            .extract(b"definitely not a zip", dir.path())
            .unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Artifact(ArtifactError::InvalidArchive { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("scripts/run.sh", SimpleFileOptions::default().unix_permissions(0o755))
            .unwrap();
        writer.write_all(b"#!/bin/sh\n").unwrap();
        let archive = writer.finish().unwrap().into_inner();

        ArchiveExtractor::new()
            .extract(&archive, dir.path())
            .expect("extraction should succeed");

        let mode = fs::metadata(dir.path().join("scripts/run.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[cfg(unix)]
    #[test]
    fn test_overwrites_read_only_file() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let archive = |body: &[u8], mode: u32| {
            let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
            writer
                .start_file("main.tf", SimpleFileOptions::default().unix_permissions(mode))
                .unwrap();
            writer.write_all(body).unwrap();
            writer.finish().unwrap().into_inner()
        };

        let extractor = ArchiveExtractor::new();
        extractor.extract(&archive(b"old", 0o444), dir.path()).unwrap();
        extractor.extract(&archive(b"new", 0o644), dir.path()).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("main.tf")).unwrap(), "new");
    }
}

//! Build provenance metadata shipped inside the source bundle.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::artifact::resolve_within;
use crate::error::{ArtifactError, ParameterError, Result};

/// Descriptive provenance of the bundle being planned.
///
/// Absent fields read as empty strings; the file itself is mandatory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// Full commit SHA.
    pub commit_sha: String,
    /// Abbreviated commit SHA.
    pub short_sha: String,
    /// Source branch.
    pub branch: String,
    /// Commit author name.
    pub author: String,
    /// Commit author email.
    pub author_email: String,
    /// Commit message.
    pub commit_message: String,
    /// Pull request number, if the build came from one.
    pub pr_number: String,
    /// Identifier of the upstream CI run.
    #[serde(rename = "github_run_id", alias = "external_run_id")]
    pub external_run_id: String,
    /// URL of the upstream CI run.
    #[serde(rename = "github_run_url", alias = "external_run_url")]
    pub external_run_url: String,
    /// Build timestamp as written by the producer.
    pub timestamp: String,
}

impl Metadata {
    /// Loads metadata from `relative` inside the extracted bundle `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path escapes `root`, the file does not exist,
    /// or it is not valid metadata JSON.
    pub fn load(root: &Path, relative: &str) -> Result<Self> {
        let path = metadata_file(root, relative)?;
        debug!("Reading metadata from {}", path.display());

        let content = std::fs::read_to_string(&path).map_err(|source| {
            ArtifactError::MetadataUnreadable {
                path: path.clone(),
                source,
            }
        })?;

        let metadata: Self =
            serde_json::from_str(&content).map_err(|e| ArtifactError::InvalidMetadata {
                path: path.clone(),
                message: e.to_string(),
            })?;

        info!(
            "Loaded metadata: commit={}, branch={}, author={}",
            metadata.short_or_full_sha(),
            metadata.branch,
            metadata.author
        );
        Ok(metadata)
    }

    /// Returns the short SHA, or the full SHA when no short form was recorded.
    #[must_use]
    pub fn short_or_full_sha(&self) -> &str {
        if self.short_sha.is_empty() {
            &self.commit_sha
        } else {
            &self.short_sha
        }
    }
}

fn metadata_file(root: &Path, relative: &str) -> Result<PathBuf> {
    resolve_within(root, relative).ok_or_else(|| {
        ParameterError::InvalidMetadataPath {
            path: relative.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunnerError;
    use tempfile::TempDir;

    #[test]
    fn test_load_metadata() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(
            dir.path().join("metadata.json"),
            r#"{
                "timestamp": "2024-05-01T10:00:00Z",
                "commit_sha": "0123456789abcdef",
                "short_sha": "0123456",
                "branch": "main",
                "author": "dev",
                "author_email": "dev@example.com",
                "commit_message": "Add bucket",
                "pr_number": "17",
                "github_run_id": "99",
                "github_run_url": "https://ci.example.com/runs/99"
            }"#,
        )
        .expect("Failed to write metadata");

        let metadata = Metadata::load(dir.path(), "metadata.json").expect("metadata should load");
        assert_eq!(metadata.branch, "main");
        assert_eq!(metadata.external_run_id, "99");
        assert_eq!(metadata.short_or_full_sha(), "0123456");
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::create_dir_all(dir.path().join("ci")).expect("Failed to create dir");
        std::fs::write(dir.path().join("ci/meta.json"), r#"{"commit_sha":"abc"}"#)
            .expect("Failed to write metadata");

        let metadata = Metadata::load(dir.path(), "ci/meta.json").expect("metadata should load");
        assert_eq!(metadata.commit_sha, "abc");
        assert!(metadata.branch.is_empty());
        assert_eq!(metadata.short_or_full_sha(), "abc");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let err = Metadata::load(dir.path(), "metadata.json").unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Artifact(ArtifactError::MetadataUnreadable { .. })
        ));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("metadata.json"), "not json").expect("write");
        let err = Metadata::load(dir.path(), "metadata.json").unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Artifact(ArtifactError::InvalidMetadata { .. })
        ));
    }

    #[test]
    fn test_escaping_path_is_rejected() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let err = Metadata::load(dir.path(), "../etc/passwd").unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Parameter(ParameterError::InvalidMetadataPath { .. })
        ));
    }
}

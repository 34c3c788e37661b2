//! Error types for the plan runner.
//!
//! The hierarchy mirrors the phases of a pipeline job: parameters, artifacts,
//! credentials, workspace discovery, planning, packaging and reporting. Each
//! phase has its own enum so the runner can decide, by type, whether a
//! failure still produces a result bundle.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// The main error type for the plan runner.
///
/// Every variant is transparent: the nested error already carries the
/// human-readable context that ends up in the pipeline failure message.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Invocation parameter errors.
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// Artifact fetch, extraction and upload errors.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// Credential and secret resolution errors.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Workspace discovery errors.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// Planning tool errors.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Result bundle packaging errors.
    #[error(transparent)]
    Packaging(#[from] PackagingError),

    /// Job status reporting errors.
    #[error(transparent)]
    Report(#[from] ReportError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Invocation parameter errors.
#[derive(Debug, Error)]
pub enum ParameterError {
    /// The pipeline event could not be decoded.
    #[error("Failed to parse pipeline event: {message}")]
    InvalidEvent {
        /// Description of the decode error.
        message: String,
    },

    /// The action configuration has no user parameters entry.
    #[error("UserParameters not found in action configuration")]
    MissingUserParameters,

    /// The user parameters string is not valid JSON for the schema.
    #[error("Failed to parse user parameters: {message}")]
    InvalidUserParameters {
        /// Description of the parse error.
        message: String,
    },

    /// A required parameter is present but empty.
    #[error("Missing required parameter: {field}")]
    MissingField {
        /// Name of the parameter.
        field: String,
    },

    /// The job has no input artifact.
    #[error("No input artifacts found")]
    MissingInputArtifact,

    /// The job has no output artifact.
    #[error("No output artifacts found")]
    MissingOutputArtifact,

    /// An artifact entry has no bucket or object key.
    #[error("Artifact '{name}' has an incomplete location")]
    IncompleteArtifactLocation {
        /// Artifact name.
        name: String,
    },

    /// The metadata path points outside the extracted bundle.
    #[error("Metadata path escapes the bundle root: {path}")]
    InvalidMetadataPath {
        /// The rejected path.
        path: String,
    },
}

/// Artifact fetch, extraction and upload errors.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Downloading an artifact failed.
    #[error("Failed to download s3://{bucket}/{key}: {message}")]
    Fetch {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Description of the failure.
        message: String,
    },

    /// Uploading an artifact failed.
    #[error("Failed to upload s3://{bucket}/{key}: {message}")]
    Put {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Description of the failure.
        message: String,
    },

    /// The archive could not be read.
    #[error("Invalid archive: {message}")]
    InvalidArchive {
        /// Description of the archive error.
        message: String,
    },

    /// An archive entry resolves outside the destination directory.
    #[error("Illegal file path in archive: {entry}")]
    PathTraversal {
        /// Name of the offending entry.
        entry: String,
    },

    /// Writing an extracted entry failed.
    #[error("Failed to extract {}: {source}", .path.display())]
    Extraction {
        /// Destination path of the entry.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The working directory could not be created.
    #[error("Failed to create temp dir: {source}")]
    WorkDir {
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The metadata file is missing or unreadable.
    #[error("Failed to read metadata file {}: {source}", .path.display())]
    MetadataUnreadable {
        /// Path of the metadata file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The metadata file is not valid JSON for the schema.
    #[error("Failed to parse metadata JSON {}: {message}", .path.display())]
    InvalidMetadata {
        /// Path of the metadata file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },
}

/// Credential and secret resolution errors.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Looking up the current execution identity failed.
    #[error("Failed to get caller identity: {message}")]
    IdentityLookup {
        /// Description of the failure.
        message: String,
    },

    /// A configuration value needed for role assumption is missing.
    #[error("{name} not set")]
    MissingConfiguration {
        /// Name of the missing setting.
        name: String,
    },

    /// Assuming the cross-account role failed.
    #[error("Failed to assume role {role_arn}: {message}")]
    AssumeRole {
        /// ARN of the role.
        role_arn: String,
        /// Description of the failure.
        message: String,
    },

    /// Pipeline-supplied credentials are incomplete.
    #[error("Artifact credentials are missing {field}")]
    MissingField {
        /// Name of the missing field.
        field: String,
    },

    /// Loading secret parameters failed.
    #[error("Failed to load parameters from {prefix}: {message}")]
    Secrets {
        /// Parameter path prefix.
        prefix: String,
        /// Description of the failure.
        message: String,
    },
}

/// Workspace discovery errors.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// None of the candidate directories exist.
    #[error(
        "Environment directory for '{environment}' not found in any of: {}",
        display_paths(.candidates)
    )]
    NotFound {
        /// Requested environment.
        environment: String,
        /// Every candidate that was tried, in priority order.
        candidates: Vec<PathBuf>,
    },
}

/// The planning tool stage an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStage {
    /// Workspace initialization.
    Init,
    /// Plan computation.
    Plan,
    /// Plan rendering.
    Show,
}

impl std::fmt::Display for PlanStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Plan => "plan",
            Self::Show => "show",
        };
        write!(f, "{name}")
    }
}

/// Planning tool errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The tool binary does not exist.
    #[error("{tool} binary not found at {}", .path.display())]
    ToolNotFound {
        /// Display name of the tool.
        tool: String,
        /// Configured path of the binary.
        path: PathBuf,
    },

    /// A stage could not be started.
    #[error("Failed to start {tool} {stage}: {message}")]
    Spawn {
        /// Display name of the tool.
        tool: String,
        /// Stage that failed to start.
        stage: PlanStage,
        /// Description of the failure.
        message: String,
    },

    /// `init` exited non-zero.
    #[error("{tool} init failed: {output}")]
    InitializationFailed {
        /// Display name of the tool.
        tool: String,
        /// Combined stdout and stderr of the stage.
        output: String,
    },

    /// `plan` exited non-zero.
    #[error("{tool} plan failed: {output}")]
    PlanComputationFailed {
        /// Display name of the tool.
        tool: String,
        /// Combined stdout and stderr of the stage.
        output: String,
    },
}

/// Result bundle packaging errors.
#[derive(Debug, Error)]
pub enum PackagingError {
    /// The summary could not be serialized or parsed.
    #[error("Failed to marshal summary: {message}")]
    Summary {
        /// Description of the serialization error.
        message: String,
    },

    /// The zip writer or reader failed.
    #[error("Failed to build result bundle: {message}")]
    Archive {
        /// Description of the archive error.
        message: String,
    },
}

/// Job status reporting errors.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The report request could not be built.
    #[error("Invalid report for job {job_id}: {message}")]
    InvalidRequest {
        /// Job identifier.
        job_id: String,
        /// Description of the problem.
        message: String,
    },

    /// The orchestrator rejected or did not receive the report.
    #[error("Failed to report job {job_id}: {message}")]
    Request {
        /// Job identifier.
        job_id: String,
        /// Description of the failure.
        message: String,
    },
}

/// Result type alias for plan runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;

fn display_paths(paths: &[PathBuf]) -> String {
    let items: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    format!("[{}]", items.join(", "))
}

impl RunnerError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl ArtifactError {
    /// Creates a fetch error for an artifact location.
    #[must_use]
    pub fn fetch(bucket: &str, key: &str, message: impl Into<String>) -> Self {
        Self::Fetch {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Creates an upload error for an artifact location.
    #[must_use]
    pub fn put(bucket: &str, key: &str, message: impl Into<String>) -> Self {
        Self::Put {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Creates an extraction error for a destination path.
    #[must_use]
    pub fn extraction(path: &Path, source: std::io::Error) -> Self {
        Self::Extraction {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl PlanError {
    /// Returns the console output captured before the failure.
    ///
    /// Empty when the failing stage never produced output.
    #[must_use]
    pub fn captured_output(&self) -> &str {
        match self {
            Self::InitializationFailed { output, .. }
            | Self::PlanComputationFailed { output, .. } => output,
            Self::ToolNotFound { .. } | Self::Spawn { .. } => "",
        }
    }

    /// Returns the stage the failure belongs to, if a stage was reached.
    #[must_use]
    pub const fn stage(&self) -> Option<PlanStage> {
        match self {
            Self::ToolNotFound { .. } => None,
            Self::Spawn { stage, .. } => Some(*stage),
            Self::InitializationFailed { .. } => Some(PlanStage::Init),
            Self::PlanComputationFailed { .. } => Some(PlanStage::Plan),
        }
    }
}

impl ReportError {
    /// Creates a request error for a job.
    #[must_use]
    pub fn request(job_id: &str, message: impl Into<String>) -> Self {
        Self::Request {
            job_id: job_id.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_not_found_lists_candidates() {
        let err = WorkspaceError::NotFound {
            environment: "dev".to_string(),
            candidates: vec![PathBuf::from("/w/environments/dev"), PathBuf::from("/w/dev")],
        };
        let message = err.to_string();
        assert!(message.contains("/w/environments/dev"));
        assert!(message.contains("/w/dev"));
    }

    #[test]
    fn test_plan_error_exposes_output_and_stage() {
        let err = PlanError::InitializationFailed {
            tool: "tofu".to_string(),
            output: "module not found".to_string(),
        };
        assert_eq!(err.captured_output(), "module not found");
        assert_eq!(err.stage(), Some(PlanStage::Init));
        assert_eq!(err.to_string(), "tofu init failed: module not found");

        let missing = PlanError::ToolNotFound {
            tool: "terraform".to_string(),
            path: PathBuf::from("/opt/bin/terraform"),
        };
        assert_eq!(missing.captured_output(), "");
        assert_eq!(missing.stage(), None);
        assert_eq!(
            missing.to_string(),
            "terraform binary not found at /opt/bin/terraform"
        );
    }

    #[test]
    fn test_transparent_display() {
        let err = RunnerError::from(ParameterError::MissingInputArtifact);
        assert_eq!(err.to_string(), "No input artifacts found");
    }
}

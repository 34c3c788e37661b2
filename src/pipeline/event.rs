//! Pipeline job event types.
//!
//! These mirror the subset of the CodePipeline job event the runner consumes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ParameterError, Result};

/// Top-level invocation event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineEvent {
    /// The job being executed.
    #[serde(rename = "CodePipeline.job")]
    pub job: PipelineJob,
}

/// A single pipeline job.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineJob {
    /// Job identifier used for status reports.
    pub id: String,
    /// Job payload.
    pub data: JobData,
}

/// Job payload.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobData {
    /// Action configuration.
    #[serde(default)]
    pub action_configuration: ActionConfiguration,
    /// Input artifacts, in pipeline order.
    #[serde(default)]
    pub input_artifacts: Vec<Artifact>,
    /// Output artifacts, in pipeline order.
    #[serde(default)]
    pub output_artifacts: Vec<Artifact>,
    /// Temporary credentials for the artifact bucket.
    #[serde(default)]
    pub artifact_credentials: Option<ArtifactCredentials>,
}

/// Action configuration map.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ActionConfiguration {
    /// Free-form configuration values.
    #[serde(default)]
    pub configuration: HashMap<String, String>,
}

/// A named artifact.
///
/// Location fields default to empty so a malformed entry still decodes and
/// the job can be reported as failed.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Artifact {
    /// Artifact name.
    #[serde(default)]
    pub name: String,
    /// Artifact location.
    #[serde(default)]
    pub location: ArtifactLocation,
}

/// Where an artifact lives.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactLocation {
    /// Object storage location.
    #[serde(default)]
    pub s3_location: ArtifactRef,
}

/// Object storage reference (container + key).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRef {
    /// Bucket name.
    #[serde(default)]
    pub bucket_name: String,
    /// Object key.
    #[serde(default)]
    pub object_key: String,
}

/// Orchestrator-supplied temporary credentials.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactCredentials {
    /// Access key id.
    #[serde(default)]
    pub access_key_id: String,
    /// Secret access key.
    #[serde(default)]
    pub secret_access_key: String,
    /// Session token.
    #[serde(default)]
    pub session_token: String,
}

impl std::fmt::Debug for ArtifactCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .finish()
    }
}

impl ArtifactRef {
    /// Creates a new reference.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket.into(),
            object_key: key.into(),
        }
    }

    /// Returns true if both the bucket and the key are set.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.bucket_name.trim().is_empty() && !self.object_key.trim().is_empty()
    }
}

impl Artifact {
    /// Returns the storage location, rejecting incomplete ones.
    fn storage(&self) -> Result<&ArtifactRef> {
        let location = &self.location.s3_location;
        if location.is_complete() {
            Ok(location)
        } else {
            Err(ParameterError::IncompleteArtifactLocation {
                name: self.name.clone(),
            }
            .into())
        }
    }
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket_name, self.object_key)
    }
}

impl PipelineEvent {
    /// Decodes an event from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a pipeline job.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| {
            ParameterError::InvalidEvent {
                message: e.to_string(),
            }
            .into()
        })
    }
}

impl JobData {
    /// Returns the first input artifact location.
    ///
    /// # Errors
    ///
    /// Returns an error if the job has no input artifact or its location
    /// is incomplete.
    pub fn input_ref(&self) -> Result<&ArtifactRef> {
        self.input_artifacts
            .first()
            .ok_or(ParameterError::MissingInputArtifact)?
            .storage()
    }

    /// Returns the first output artifact location.
    ///
    /// # Errors
    ///
    /// Returns an error if the job has no output artifact or its location
    /// is incomplete.
    pub fn output_ref(&self) -> Result<&ArtifactRef> {
        self.output_artifacts
            .first()
            .ok_or(ParameterError::MissingOutputArtifact)?
            .storage()
    }
}

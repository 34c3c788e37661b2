//! Pipeline orchestrator integration.
//!
//! This module holds the job event the orchestrator sends and the reporter
//! that sends the terminal status back.

mod event;
mod reporter;

pub use event::{
    ActionConfiguration, Artifact, ArtifactCredentials, ArtifactLocation, ArtifactRef, JobData,
    PipelineEvent, PipelineJob,
};
pub use reporter::{
    submit, truncate_message, CodePipelineReporter, JobReporter, Verdict,
    MAX_FAILURE_MESSAGE_CHARS, TRUNCATION_MARKER,
};

#[cfg(test)]
pub(crate) use reporter::MockJobReporter;

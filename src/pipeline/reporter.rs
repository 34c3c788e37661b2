//! Terminal job status reporting.
//!
//! A job receives exactly one report. The orchestrator caps failure
//! messages, so long messages are cut to the cap with a visible marker
//! before any reporter implementation sees them.

use async_trait::async_trait;
use aws_sdk_codepipeline::Client;
use aws_sdk_codepipeline::error::DisplayErrorContext;
use aws_sdk_codepipeline::types::{FailureDetails, FailureType};
use std::borrow::Cow;
use tracing::{error, info};

use crate::error::{ReportError, Result};

/// Maximum failure message length accepted by the orchestrator, in characters.
pub const MAX_FAILURE_MESSAGE_CHARS: usize = 5000;

/// Marker appended to truncated failure messages.
pub const TRUNCATION_MARKER: &str = "... (truncated)";

/// Final status of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The job succeeded.
    Success,
    /// The job failed with a human-readable message.
    Failure(String),
}

impl Verdict {
    /// Returns true for a successful verdict.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Reports terminal job status to the orchestrator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobReporter: Send + Sync {
    /// Marks the job as succeeded.
    async fn report_success(&self, job_id: &str) -> Result<()>;

    /// Marks the job as failed.
    ///
    /// `message` is already within [`MAX_FAILURE_MESSAGE_CHARS`].
    async fn report_failure(&self, job_id: &str, message: &str) -> Result<()>;
}

/// Cuts `message` to the orchestrator limit.
///
/// Messages over the limit come back exactly [`MAX_FAILURE_MESSAGE_CHARS`]
/// characters long, ending in [`TRUNCATION_MARKER`].
#[must_use]
pub fn truncate_message(message: &str) -> Cow<'_, str> {
    if message.chars().count() <= MAX_FAILURE_MESSAGE_CHARS {
        return Cow::Borrowed(message);
    }

    let keep = MAX_FAILURE_MESSAGE_CHARS - TRUNCATION_MARKER.chars().count();
    let cut = message
        .char_indices()
        .nth(keep)
        .map_or(message.len(), |(idx, _)| idx);

    let mut truncated = String::with_capacity(cut + TRUNCATION_MARKER.len());
    truncated.push_str(&message[..cut]);
    truncated.push_str(TRUNCATION_MARKER);
    Cow::Owned(truncated)
}

/// Sends `verdict` for `job_id` through `reporter`, truncating failures.
///
/// Takes the verdict by reference and performs exactly one reporter call.
///
/// # Errors
///
/// Returns the reporter's error; callers log it and move on.
pub async fn submit<R>(reporter: &R, job_id: &str, verdict: &Verdict) -> Result<()>
where
    R: JobReporter + ?Sized,
{
    match verdict {
        Verdict::Success => {
            info!("Reporting SUCCESS for job {job_id}");
            reporter.report_success(job_id).await
        }
        Verdict::Failure(message) => {
            info!("Reporting FAILURE for job {job_id}: {message}");
            let message = truncate_message(message);
            reporter.report_failure(job_id, &message).await
        }
    }
}

/// `CodePipeline` job reporter.
#[derive(Debug, Clone)]
pub struct CodePipelineReporter {
    /// `CodePipeline` client.
    client: Client,
    /// External execution id attached to failure reports.
    execution_id: Option<String>,
}

impl CodePipelineReporter {
    /// Creates a reporter from an existing client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self {
            client,
            execution_id: None,
        }
    }

    /// Creates a reporter from shared SDK configuration.
    #[must_use]
    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }

    /// Sets the external execution id sent with failure reports.
    #[must_use]
    pub fn with_execution_id(mut self, execution_id: Option<String>) -> Self {
        self.execution_id = execution_id;
        self
    }
}

#[async_trait]
impl JobReporter for CodePipelineReporter {
    async fn report_success(&self, job_id: &str) -> Result<()> {
        self.client
            .put_job_success_result()
            .job_id(job_id)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                error!("Failed to report success for job {job_id}: {message}");
                ReportError::request(job_id, message)
            })?;

        Ok(())
    }

    async fn report_failure(&self, job_id: &str, message: &str) -> Result<()> {
        let mut details = FailureDetails::builder()
            .r#type(FailureType::JobFailed)
            .message(message);
        if let Some(execution_id) = &self.execution_id {
            details = details.external_execution_id(execution_id);
        }
        let details = details.build().map_err(|e| ReportError::InvalidRequest {
            job_id: job_id.to_string(),
            message: e.to_string(),
        })?;

        self.client
            .put_job_failure_result()
            .job_id(job_id)
            .failure_details(details)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                error!("Failed to report failure for job {job_id}: {message}");
                ReportError::request(job_id, message)
            })?;

        Ok(())
    }
}

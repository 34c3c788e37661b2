//! Result bundle packaging.
//!
//! A result bundle is a zip holding exactly two documents: `summary.json`
//! with the structured outcome, and `plan_output.txt` with the raw console
//! text. Both are written whether or not the plan succeeded.

use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::config::{InvocationParameters, Metadata};
use crate::error::{PackagingError, Result};

/// Name of the structured summary inside a result bundle.
pub const SUMMARY_FILE: &str = "summary.json";

/// Name of the plain-text plan output inside a result bundle.
pub const PLAN_OUTPUT_FILE: &str = "plan_output.txt";

/// Structured outcome of one plan invocation.
///
/// Field order is the serialization order of `summary.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOutcome {
    /// Environment that was planned.
    pub env: String,
    /// Target account, when one was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    /// Commit the bundle was built from.
    pub commit_sha: String,
    /// Branch the bundle was built from.
    pub branch: String,
    /// Commit author.
    pub author: String,
    /// Whether the plan succeeded.
    pub success: bool,
    /// Failure description; present exactly when `success` is false.
    #[serde(default, rename = "error", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Console output of the plan, possibly empty.
    #[serde(rename = "plan_output")]
    pub plan_text: String,
}

impl PlanOutcome {
    /// Creates a successful outcome.
    #[must_use]
    pub fn succeeded(
        params: &InvocationParameters,
        metadata: &Metadata,
        plan_text: impl Into<String>,
    ) -> Self {
        Self {
            env: params.env.clone(),
            account_id: params.account_id.clone(),
            commit_sha: metadata.commit_sha.clone(),
            branch: metadata.branch.clone(),
            author: metadata.author.clone(),
            success: true,
            error_message: None,
            plan_text: plan_text.into(),
        }
    }

    /// Creates a failed outcome that keeps whatever output was captured.
    #[must_use]
    pub fn failed(
        params: &InvocationParameters,
        metadata: &Metadata,
        error_message: impl Into<String>,
        plan_text: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error_message: Some(error_message.into()),
            ..Self::succeeded(params, metadata, plan_text)
        }
    }
}

/// Builds and reads result bundles.
#[derive(Debug, Default)]
pub struct ResultPackager;

impl ResultPackager {
    /// Creates a new packager.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Packages `outcome` into zip bytes.
    ///
    /// # Errors
    ///
    /// Returns an error only if serialization or the zip writer fails,
    /// which for a well-formed outcome indicates a bug.
    pub fn package(&self, outcome: &PlanOutcome) -> Result<Vec<u8>> {
        let summary = serde_json::to_string_pretty(outcome).map_err(|e| PackagingError::Summary {
            message: e.to_string(),
        })?;

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        write_entry(&mut writer, SUMMARY_FILE, summary.as_bytes(), options)?;
        write_entry(&mut writer, PLAN_OUTPUT_FILE, outcome.plan_text.as_bytes(), options)?;

        let bytes = writer.finish().map_err(archive_error)?.into_inner();
        debug!(
            "Packaged result bundle: {} bytes (success={})",
            bytes.len(),
            outcome.success
        );
        Ok(bytes)
    }

    /// Reads the summary back out of a result bundle.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a bundle or the summary does
    /// not parse.
    pub fn read_summary(&self, bundle: &[u8]) -> Result<PlanOutcome> {
        let summary = read_entry(bundle, SUMMARY_FILE)?;
        let outcome = serde_json::from_str(&summary).map_err(|e| PackagingError::Summary {
            message: e.to_string(),
        })?;
        Ok(outcome)
    }

    /// Reads the plain-text plan output out of a result bundle.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a bundle or the entry is missing.
    pub fn read_plan_output(&self, bundle: &[u8]) -> Result<String> {
        read_entry(bundle, PLAN_OUTPUT_FILE)
    }
}

fn write_entry(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    name: &str,
    content: &[u8],
    options: SimpleFileOptions,
) -> Result<()> {
    writer.start_file(name, options).map_err(archive_error)?;
    writer.write_all(content).map_err(|e| PackagingError::Archive {
        message: format!("failed to write {name}: {e}"),
    })?;
    Ok(())
}

fn read_entry(bundle: &[u8], name: &str) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(bundle)).map_err(archive_error)?;
    let mut entry = archive.by_name(name).map_err(archive_error)?;

    let mut content = String::new();
    entry.read_to_string(&mut content).map_err(|e| PackagingError::Archive {
        message: format!("failed to read {name}: {e}"),
    })?;
    Ok(content)
}

fn archive_error(e: zip::result::ZipError) -> PackagingError {
    PackagingError::Archive {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> InvocationParameters {
        InvocationParameters::parse(r#"{"env":"dev","account_id":"123456789012"}"#).unwrap()
    }

    fn metadata() -> Metadata {
        Metadata {
            commit_sha: "0123456789abcdef".to_string(),
            branch: "main".to_string(),
            author: "dev".to_string(),
            ..Metadata::default()
        }
    }

    fn entry_names(bundle: &[u8]) -> Vec<String> {
        let archive = ZipArchive::new(Cursor::new(bundle)).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    #[test]
    fn test_success_bundle_round_trips() {
        let outcome = PlanOutcome::succeeded(&params(), &metadata(), "No changes.");
        let packager = ResultPackager::new();

        let bundle = packager.package(&outcome).expect("packaging should succeed");

        let mut names = entry_names(&bundle);
        names.sort();
        assert_eq!(names, vec![PLAN_OUTPUT_FILE.to_string(), SUMMARY_FILE.to_string()]);
        assert_eq!(packager.read_summary(&bundle).unwrap(), outcome);
        assert_eq!(packager.read_plan_output(&bundle).unwrap(), "No changes.");
    }

    #[test]
    fn test_failure_bundle_keeps_output() {
        let outcome = PlanOutcome::failed(
            &params(),
            &metadata(),
            "tofu init failed: module not found",
            "module not found",
        );
        let packager = ResultPackager::new();

        let bundle = packager.package(&outcome).expect("packaging should succeed");
        let summary = packager.read_summary(&bundle).unwrap();

        assert!(!summary.success);
        assert_eq!(
            summary.error_message.as_deref(),
            Some("tofu init failed: module not found")
        );
        assert_eq!(packager.read_plan_output(&bundle).unwrap(), "module not found");
    }

    #[test]
    fn test_summary_field_order_and_names() {
        let outcome = PlanOutcome::failed(&params(), &metadata(), "boom", "");
        let bundle = ResultPackager::new().package(&outcome).unwrap();
        let summary = read_entry(&bundle, SUMMARY_FILE).unwrap();

        let keys = [
            "\"env\"",
            "\"account_id\"",
            "\"commit_sha\"",
            "\"branch\"",
            "\"author\"",
            "\"success\"",
            "\"error\"",
            "\"plan_output\"",
        ];
        let positions: Vec<usize> = keys
            .iter()
            .map(|k| summary.find(k).unwrap_or_else(|| panic!("missing {k}")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let params = InvocationParameters::parse(r#"{"env":"tools"}"#).unwrap();
        let outcome = PlanOutcome::succeeded(&params, &Metadata::default(), "");
        let bundle = ResultPackager::new().package(&outcome).unwrap();
        let summary = read_entry(&bundle, SUMMARY_FILE).unwrap();

        assert!(!summary.contains("account_id"));
        assert!(!summary.contains("\"error\""));
        assert_eq!(ResultPackager::new().read_summary(&bundle).unwrap(), outcome);
    }

    #[test]
    fn test_plan_text_is_not_escaped() {
        let text = "  # aws_s3_bucket.logs will be created\n  + resource \"aws_s3_bucket\" \"logs\" {\n";
        let outcome = PlanOutcome::succeeded(&params(), &metadata(), text);
        let bundle = ResultPackager::new().package(&outcome).unwrap();
        assert_eq!(read_entry(&bundle, PLAN_OUTPUT_FILE).unwrap(), text);
    }
}

//! Artifact handling for the plan runner.
//!
//! This module covers the artifact side of a job: fetching and uploading
//! objects, unpacking the source bundle safely, and packaging results.

mod extract;
mod package;
mod s3;
mod store;

pub use extract::{resolve_within, ArchiveExtractor, ExtractionSummary};
pub use package::{PlanOutcome, ResultPackager, PLAN_OUTPUT_FILE, SUMMARY_FILE};
pub use s3::{S3ArtifactStore, S3Connector};
pub use store::{ArtifactStore, ArtifactStoreConnector};

// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # tf-plan-runner
//!
//! Runs an OpenTofu/Terraform `plan` for one CodePipeline job and reports the
//! result back to the pipeline.
//!
//! ## Overview
//!
//! A pipeline stage invokes the runner with a job event. The runner:
//!
//! - Downloads and safely extracts the source bundle named by the first input artifact
//! - Resolves credentials for the target account and secret `TF_VAR_` variables
//! - Locates the environment directory and runs `init`, `plan` and `show`
//! - Uploads a result bundle (`summary.json` + `plan_output.txt`) to the first output artifact
//! - Reports exactly one terminal status for the job
//!
//! ## Architecture
//!
//! A plan failure still produces a result bundle so reviewers can read the
//! tool output; every other failure is reported straight away.
//!
//! ## Modules
//!
//! - [`artifact`]: Archive extraction, result bundles and artifact storage (S3)
//! - [`config`]: Process configuration, invocation parameters and commit metadata
//! - [`credentials`]: Credential resolution, role assumption and secret variables
//! - [`pipeline`]: Job events and status reporting
//! - [`planner`]: Planning tool execution
//! - [`workspace`]: Environment directory discovery
//! - [`runner`]: Job orchestration
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```json
//! {"env": "dev", "account_id": "123456789012", "metadata_path": "metadata.json"}
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod artifact;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod pipeline;
pub mod planner;
pub mod runner;
pub mod workspace;

// ============================================================================
// Re-exports
// ============================================================================

pub use artifact::{ArchiveExtractor, ArtifactStore, PlanOutcome, ResultPackager, S3Connector};
pub use cli::{Cli, Commands};
pub use config::{InvocationParameters, Metadata, RunnerConfig};
pub use credentials::{CredentialSet, ParameterStoreSecrets, StsIdentityService};
pub use error::{Result, RunnerError};
pub use pipeline::{CodePipelineReporter, PipelineEvent, Verdict};
pub use planner::{PlanExecutor, ProcessRunner};
pub use runner::{PlanRunner, RunPhase, RunReport};
pub use workspace::WorkspaceLocator;

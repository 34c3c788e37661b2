//! Credential resolution and secret variables.
//!
//! This module provides:
//! - Credential sets for the artifact store and the plan subprocess
//! - Identity lookup and cross-account role assumption
//! - Secret `TF_VAR_` variables from the parameter store

mod resolver;
mod secrets;
mod sts;

pub use resolver::{
    AccountCredentialResolver, CredentialResolver, CredentialSet, PipelineCredentialResolver,
    StaticCredentials,
};
pub use secrets::{
    load_secret_variables, secret_variables, ParameterStoreSecrets, SecretSource, TF_VAR_PREFIX,
};
pub use sts::{IdentityService, StsIdentityService};

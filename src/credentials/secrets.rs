//! Secret plan variables from the parameter store.
//!
//! Every parameter under the configured prefix becomes a `TF_VAR_<name>`
//! variable for the plan subprocess, where `<name>` is the parameter path
//! below the prefix with `/` replaced by `_`.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ssm::Client;
use aws_sdk_ssm::error::DisplayErrorContext;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{CredentialError, Result};

/// Prefix for variables the planning tool reads as input variables.
pub const TF_VAR_PREFIX: &str = "TF_VAR_";

/// Source of secret parameters.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Returns every `(full name, value)` pair under `prefix`.
    async fn parameters(&self, prefix: &str) -> Result<Vec<(String, String)>>;
}

/// Converts raw parameters under `prefix` into `TF_VAR_` variables.
///
/// Parameters outside the prefix or with an empty relative name are skipped.
#[must_use]
pub fn secret_variables(prefix: &str, parameters: &[(String, String)]) -> BTreeMap<String, String> {
    let base = prefix.trim_end_matches('/');

    parameters
        .iter()
        .filter_map(|(name, value)| {
            let relative = if base.is_empty() {
                name.strip_prefix('/')?
            } else {
                name.strip_prefix(base)?.strip_prefix('/')?
            };
            let relative = relative.trim_start_matches('/');
            if relative.is_empty() {
                return None;
            }
            Some((format!("{TF_VAR_PREFIX}{}", relative.replace('/', "_")), value.clone()))
        })
        .collect()
}

/// Loads secret variables when a prefix is configured.
///
/// # Errors
///
/// Returns an error if the source fails.
pub async fn load_secret_variables<S>(
    source: &S,
    prefix: Option<&str>,
) -> Result<BTreeMap<String, String>>
where
    S: SecretSource + ?Sized,
{
    let Some(prefix) = prefix else {
        debug!("No parameter prefix configured; skipping secret variables");
        return Ok(BTreeMap::new());
    };

    let parameters = source.parameters(prefix).await?;
    let vars = secret_variables(prefix, &parameters);
    info!("Loaded {} parameters from {prefix}", vars.len());
    Ok(vars)
}

/// SSM Parameter Store secret source.
#[derive(Debug, Clone)]
pub struct ParameterStoreSecrets {
    /// SSM client.
    client: Client,
}

impl ParameterStoreSecrets {
    /// Creates a source from an existing client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a source from shared SDK configuration.
    #[must_use]
    pub fn from_conf(config: &SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

#[async_trait]
impl SecretSource for ParameterStoreSecrets {
    async fn parameters(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let mut pages = self
            .client
            .get_parameters_by_path()
            .path(prefix)
            .recursive(true)
            .with_decryption(true)
            .into_paginator()
            .send();

        let mut found = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CredentialError::Secrets {
                prefix: prefix.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

            for parameter in page.parameters() {
                if let (Some(name), Some(value)) = (parameter.name(), parameter.value()) {
                    found.push((name.to_string(), value.to_string()));
                }
            }
        }

        debug!("Fetched {} parameters under {prefix}", found.len());
        Ok(found)
    }
}

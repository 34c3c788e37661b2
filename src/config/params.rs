//! Invocation parameter parsing.
//!
//! The orchestrator passes a JSON document as an opaque string under the
//! `UserParameters` configuration key. Both the `env` and the older
//! `environment` spelling are accepted.

use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{ParameterError, Result};

/// Configuration key holding the parameter JSON.
pub const USER_PARAMETERS_KEY: &str = "UserParameters";

/// Metadata file used when the parameters do not name one.
pub const DEFAULT_METADATA_PATH: &str = "metadata.json";

/// Parameters of one plan invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvocationParameters {
    /// Target environment identifier.
    #[serde(alias = "environment")]
    pub env: String,

    /// Account the plan should run against.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub account_id: Option<String>,

    /// Metadata file path, relative to the bundle root.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub metadata_path: Option<String>,

    /// Organization tag.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub org: Option<String>,
}

impl InvocationParameters {
    /// Parses parameters from their JSON string form.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, `env` is missing, or `env`
    /// is blank.
    pub fn parse(raw: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(raw).map_err(|e| {
            ParameterError::InvalidUserParameters {
                message: e.to_string(),
            }
        })?;

        if params.env.trim().is_empty() {
            return Err(ParameterError::MissingField {
                field: String::from("env"),
            }
            .into());
        }

        debug!(
            "Parsed parameters: env={}, account_id={:?}, metadata_path={:?}, org={:?}",
            params.env, params.account_id, params.metadata_path, params.org
        );
        Ok(params)
    }

    /// Parses parameters from an action configuration map.
    ///
    /// # Errors
    ///
    /// Returns an error if the `UserParameters` key is absent or its value
    /// does not parse.
    pub fn from_configuration(configuration: &HashMap<String, String>) -> Result<Self> {
        let raw = configuration
            .get(USER_PARAMETERS_KEY)
            .ok_or(ParameterError::MissingUserParameters)?;
        Self::parse(raw)
    }

    /// Returns the metadata path, falling back to `metadata.json`.
    #[must_use]
    pub fn metadata_path(&self) -> &str {
        self.metadata_path.as_deref().unwrap_or(DEFAULT_METADATA_PATH)
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

//! Credential resolution.
//!
//! A job needs credentials twice: once for the artifact bucket and once for
//! the plan subprocess. Both come from a [`CredentialResolver`], which has
//! two variants: the account resolver (ambient identity or an assumed role)
//! and the pipeline resolver (temporary keys passed in with the job).

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{CredentialError, Result};
use crate::pipeline::ArtifactCredentials;

use super::sts::IdentityService;

/// Static AWS credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Session token for temporary credentials.
    pub session_token: Option<String>,
    /// Expiry as seconds since the Unix epoch, when known.
    pub expires_at: Option<i64>,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A usable credential set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSet {
    /// The identity the process already runs as.
    Ambient,
    /// Explicit credentials that override the ambient identity.
    Explicit(StaticCredentials),
}

impl CredentialSet {
    /// Flattens the credentials into environment variables.
    ///
    /// Ambient credentials contribute nothing; the subprocess inherits the
    /// process environment.
    #[must_use]
    pub fn env_vars(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        if let Self::Explicit(creds) = self {
            vars.insert("AWS_ACCESS_KEY_ID".to_string(), creds.access_key_id.clone());
            vars.insert(
                "AWS_SECRET_ACCESS_KEY".to_string(),
                creds.secret_access_key.clone(),
            );
            if let Some(token) = &creds.session_token {
                vars.insert("AWS_SESSION_TOKEN".to_string(), token.clone());
            }
        }
        vars
    }

    /// Short description for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Ambient => "ambient",
            Self::Explicit(_) => "explicit",
        }
    }
}

/// Produces a credential set for one target context.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Resolves the credentials.
    async fn resolve(&self) -> Result<CredentialSet>;
}

/// Resolves credentials for a target account.
///
/// Same account as the caller: ambient credentials. Otherwise a configured
/// role in the target account is assumed.
pub struct AccountCredentialResolver<'a> {
    /// Identity collaborator.
    identity: &'a dyn IdentityService,
    /// Account the plan runs against.
    target_account: String,
    /// Role assumed in other accounts.
    role_name: Option<String>,
    /// Session name recorded on the assumed role.
    session_name: String,
}

impl<'a> AccountCredentialResolver<'a> {
    /// Creates a resolver for `target_account`.
    #[must_use]
    pub fn new(
        identity: &'a dyn IdentityService,
        target_account: impl Into<String>,
        role_name: Option<String>,
    ) -> Self {
        Self {
            identity,
            target_account: target_account.into(),
            role_name,
            session_name: format!("tf-plan-{}", chrono::Utc::now().timestamp()),
        }
    }

    /// Overrides the role session name.
    #[must_use]
    pub fn with_session_name(mut self, session_name: impl Into<String>) -> Self {
        self.session_name = session_name.into();
        self
    }

    /// Returns the ARN of the role assumed in the target account.
    fn role_arn(&self, role_name: &str) -> String {
        format!("arn:aws:iam::{}:role/{role_name}", self.target_account)
    }
}

#[async_trait]
impl<'a> CredentialResolver for AccountCredentialResolver<'a> {
    async fn resolve(&self) -> Result<CredentialSet> {
        let current = self.identity.caller_account().await?;
        if current == self.target_account {
            info!("Target account {current} is the current account; using ambient credentials");
            return Ok(CredentialSet::Ambient);
        }

        let role_name = self.role_name.as_deref().ok_or_else(|| {
            CredentialError::MissingConfiguration {
                name: crate::config::CROSS_ACCOUNT_ROLE_VAR.to_string(),
            }
        })?;

        let role_arn = self.role_arn(role_name);
        info!(
            "Assuming {role_arn} (caller account {current}, target {})",
            self.target_account
        );
        let creds = self.identity.assume_role(&role_arn, &self.session_name).await?;

        if let Some(expires) = creds
            .expires_at
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        {
            debug!("Assumed role credentials expire at {}", expires.to_rfc3339());
        }
        Ok(CredentialSet::Explicit(creds))
    }
}

/// Uses temporary credentials supplied by the orchestrator as-is.
#[derive(Debug, Clone)]
pub struct PipelineCredentialResolver {
    /// Supplied credentials.
    supplied: ArtifactCredentials,
}

impl PipelineCredentialResolver {
    /// Creates a resolver over supplied credentials.
    #[must_use]
    pub const fn new(supplied: ArtifactCredentials) -> Self {
        Self { supplied }
    }
}

#[async_trait]
impl CredentialResolver for PipelineCredentialResolver {
    async fn resolve(&self) -> Result<CredentialSet> {
        let field = |name: &str, value: &str| {
            if value.trim().is_empty() {
                Err(CredentialError::MissingField {
                    field: name.to_string(),
                })
            } else {
                Ok(value.to_string())
            }
        };

        let access_key_id = field("accessKeyId", &self.supplied.access_key_id)?;
        let secret_access_key = field("secretAccessKey", &self.supplied.secret_access_key)?;
        let session_token = Some(self.supplied.session_token.clone()).filter(|t| !t.is_empty());

        debug!("Using pipeline-supplied credentials {access_key_id}");
        Ok(CredentialSet::Explicit(StaticCredentials {
            access_key_id,
            secret_access_key,
            session_token,
            expires_at: None,
        }))
    }
}

//! Identity lookup and role assumption through STS.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sts::Client;
use aws_sdk_sts::error::DisplayErrorContext;
use tracing::debug;

use crate::error::{CredentialError, Result};

use super::resolver::StaticCredentials;

/// External identity collaborator.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Returns the account id of the current execution identity.
    async fn caller_account(&self) -> Result<String>;

    /// Assumes `role_arn` and returns its temporary credentials.
    async fn assume_role(&self, role_arn: &str, session_name: &str) -> Result<StaticCredentials>;
}

/// STS-backed identity service.
#[derive(Debug, Clone)]
pub struct StsIdentityService {
    /// STS client.
    client: Client,
}

impl StsIdentityService {
    /// Creates a service from an existing client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a service from shared SDK configuration.
    #[must_use]
    pub fn from_conf(config: &SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

#[async_trait]
impl IdentityService for StsIdentityService {
    async fn caller_account(&self) -> Result<String> {
        let identity = self
            .client
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| CredentialError::IdentityLookup {
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let account = identity
            .account()
            .ok_or_else(|| CredentialError::IdentityLookup {
                message: String::from("response did not include an account id"),
            })?
            .to_string();

        debug!("Caller account: {account}");
        Ok(account)
    }

    async fn assume_role(&self, role_arn: &str, session_name: &str) -> Result<StaticCredentials> {
        let output = self
            .client
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .send()
            .await
            .map_err(|e| CredentialError::AssumeRole {
                role_arn: role_arn.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let creds = output.credentials().ok_or_else(|| CredentialError::AssumeRole {
            role_arn: role_arn.to_string(),
            message: String::from("response did not include credentials"),
        })?;

        Ok(StaticCredentials {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: Some(creds.session_token().to_string()),
            expires_at: Some(creds.expiration().secs()),
        })
    }
}

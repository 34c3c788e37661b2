//! S3-based artifact store.
//!
//! Pipeline artifacts live in an S3 bucket owned by the orchestrator. The
//! store either uses the ambient SDK configuration or the temporary
//! credentials handed over with the job.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use tracing::{debug, info};

use crate::credentials::CredentialSet;
use crate::error::{ArtifactError, Result};
use crate::pipeline::ArtifactRef;

use super::store::{ArtifactStore, ArtifactStoreConnector};

/// Content type of uploaded result bundles.
const BUNDLE_CONTENT_TYPE: &str = "application/zip";

/// Provider name recorded on static credentials.
const CREDENTIALS_PROVIDER: &str = "pipeline-job";

/// S3-based artifact store.
#[derive(Debug, Clone)]
pub struct S3ArtifactStore {
    /// S3 client.
    client: Client,
}

impl S3ArtifactStore {
    /// Creates a new S3 artifact store with an existing client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Creates a store from shared SDK configuration and a credential set.
    ///
    /// Explicit credentials replace the configured provider; ambient
    /// credentials keep it.
    #[must_use]
    pub fn from_conf(config: &SdkConfig, credentials: &CredentialSet) -> Self {
        let client = match credentials {
            CredentialSet::Ambient => Client::new(config),
            CredentialSet::Explicit(creds) => {
                let provider = Credentials::new(
                    creds.access_key_id.clone(),
                    creds.secret_access_key.clone(),
                    creds.session_token.clone(),
                    None,
                    CREDENTIALS_PROVIDER,
                );
                let s3_config = aws_sdk_s3::config::Builder::from(config)
                    .credentials_provider(provider)
                    .build();
                Client::from_conf(s3_config)
            }
        };

        Self::with_client(client)
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn fetch(&self, location: &ArtifactRef) -> Result<Vec<u8>> {
        info!("Downloading artifact from {location}");

        let response = self
            .client
            .get_object()
            .bucket(&location.bucket_name)
            .key(&location.object_key)
            .send()
            .await
            .map_err(|e| {
                ArtifactError::fetch(
                    &location.bucket_name,
                    &location.object_key,
                    DisplayErrorContext(&e).to_string(),
                )
            })?;

        let bytes = response.body.collect().await.map_err(|e| {
            ArtifactError::fetch(
                &location.bucket_name,
                &location.object_key,
                format!("failed to read object body: {e}"),
            )
        })?;

        let bytes = bytes.to_vec();
        debug!("Downloaded {} bytes from {location}", bytes.len());
        Ok(bytes)
    }

    async fn put(&self, location: &ArtifactRef, body: Vec<u8>) -> Result<()> {
        info!("Uploading {} bytes to {location}", body.len());

        self.client
            .put_object()
            .bucket(&location.bucket_name)
            .key(&location.object_key)
            .body(body.into())
            .content_type(BUNDLE_CONTENT_TYPE)
            .send()
            .await
            .map_err(|e| {
                ArtifactError::put(
                    &location.bucket_name,
                    &location.object_key,
                    DisplayErrorContext(&e).to_string(),
                )
            })?;

        debug!("Upload to {location} complete");
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "s3"
    }
}

/// Connects S3 stores from a shared SDK configuration.
#[derive(Debug, Clone)]
pub struct S3Connector {
    /// Base SDK configuration.
    config: SdkConfig,
}

impl S3Connector {
    /// Creates a connector from shared SDK configuration.
    #[must_use]
    pub const fn new(config: SdkConfig) -> Self {
        Self { config }
    }
}

impl ArtifactStoreConnector for S3Connector {
    fn connect(&self, credentials: &CredentialSet) -> Box<dyn ArtifactStore> {
        Box::new(S3ArtifactStore::from_conf(&self.config, credentials))
    }
}

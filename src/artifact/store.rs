//! Artifact store trait definition.
//!
//! This module defines the common interface for artifact storage backends
//! and the connector that binds a backend to a resolved credential set.

use async_trait::async_trait;

use crate::credentials::CredentialSet;
use crate::error::Result;
use crate::pipeline::ArtifactRef;

/// Trait for artifact storage backends.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fetches the full contents of an artifact.
    async fn fetch(&self, location: &ArtifactRef) -> Result<Vec<u8>>;

    /// Writes an artifact, replacing any existing object.
    async fn put(&self, location: &ArtifactRef, body: Vec<u8>) -> Result<()>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl ArtifactStore for Box<dyn ArtifactStore> {
    async fn fetch(&self, location: &ArtifactRef) -> Result<Vec<u8>> {
        (**self).fetch(location).await
    }

    async fn put(&self, location: &ArtifactRef, body: Vec<u8>) -> Result<()> {
        (**self).put(location, body).await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}

/// Creates artifact stores bound to a credential set.
pub trait ArtifactStoreConnector: Send + Sync {
    /// Returns a store that authenticates with `credentials`.
    fn connect(&self, credentials: &CredentialSet) -> Box<dyn ArtifactStore>;
}

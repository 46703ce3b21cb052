use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ArtifactFilter, ArtifactType, BumpConfig, ResolvedArtifact};

use super::ubuntu::UbuntuResolver;

/// Finds the single newest artifact matching a filter.
#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    async fn latest(&self, filter: &ArtifactFilter) -> Result<ResolvedArtifact>;
}

/// Resolver for each supported [`ArtifactType`].
pub enum ArtifactSource {
    Ubuntu(UbuntuResolver),
}

impl ArtifactSource {
    pub fn for_config(config: &BumpConfig) -> Result<Self> {
        match config.artifact_type {
            ArtifactType::Ubuntu => Ok(ArtifactSource::Ubuntu(UbuntuResolver::new(
                &config.endpoints.ubuntu_locator_url,
            )?)),
        }
    }
}

#[async_trait]
impl ArtifactResolver for ArtifactSource {
    async fn latest(&self, filter: &ArtifactFilter) -> Result<ResolvedArtifact> {
        match self {
            ArtifactSource::Ubuntu(resolver) => resolver.latest(filter).await,
        }
    }
}

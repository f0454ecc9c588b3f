//! Docker image publisher

use std::sync::Arc;

use tracing::debug;

use crate::artifact::error::{PublisherError, RegistryError};
use crate::artifact::publisher::ArtifactSourcePublisher;
use crate::artifact::registries::DockerImageSource;
use crate::artifact::types::{ArtifactType, DeliveryArtifact, DeliveryConfig, PublishedArtifact};
use crate::artifact::versioning::{Versioning, VersioningStrategy};

/// Artifact type name claimed by [`DockerArtifactPublisher`]
pub const DOCKER: &str = "docker";

/// Metadata key holding the resolved image digest
pub const DIGEST_METADATA_KEY: &str = "digest";

/// Publisher for docker images
///
/// Receives pushed docker artifacts like every publisher, and resolves the
/// latest image of a repository by listing its tags and ordering them with
/// the artifact's docker versioning strategy.
pub struct DockerArtifactPublisher {
    source: Arc<dyn DockerImageSource>,
}

impl DockerArtifactPublisher {
    pub fn new(source: Arc<dyn DockerImageSource>) -> Self {
        Self { source }
    }
}

#[async_trait::async_trait]
impl ArtifactSourcePublisher for DockerArtifactPublisher {
    fn supported_artifact(&self) -> ArtifactType {
        ArtifactType::new(DOCKER)
    }

    fn supported_versioning_strategies(&self) -> Vec<&'static str> {
        vec!["docker"]
    }

    async fn get_latest_artifact(
        &self,
        delivery_config: &DeliveryConfig,
        artifact: &DeliveryArtifact,
    ) -> Result<Option<PublishedArtifact>, PublisherError> {
        let Versioning::Docker(_) = &artifact.versioning_strategy else {
            return Err(PublisherError::UnsupportedArtifact {
                publisher: DOCKER.to_string(),
                artifact: artifact.to_string(),
            });
        };

        let mut tags = match self
            .source
            .find_tags(&artifact.name, &delivery_config.service_account)
            .await
        {
            Ok(tags) => tags,
            Err(RegistryError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        tags.sort();
        tags.dedup();
        artifact.versioning_strategy.sort_newest_first(&mut tags);

        let Some(latest_tag) = tags.into_iter().next() else {
            debug!("No tags found for {}", artifact);
            return Ok(None);
        };

        let image = self
            .source
            .find_image(
                &artifact.name,
                &latest_tag,
                &delivery_config.service_account,
            )
            .await?;

        Ok(image.map(|image| {
            let published = PublishedArtifact::new(&image.repository, DOCKER, &image.tag);
            match image.digest {
                Some(digest) => published.with_metadata(DIGEST_METADATA_KEY, digest),
                None => published,
            }
        }))
    }
}

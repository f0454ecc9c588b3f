//! Publisher selection by artifact type
//!
//! Exactly one publisher may claim each artifact type. The claims are
//! validated once when the registry is built, so a lookup never has to
//! choose between competing publishers.

use std::collections::HashMap;
use std::sync::Arc;

use crate::artifact::publisher::ArtifactSourcePublisher;
use crate::artifact::types::{ArtifactType, DeliveryArtifact};
use crate::artifact::versioning::VersioningStrategy;
use crate::sync::error::{DispatchError, SyncError};

/// Maps each claimed artifact type to the publisher handling it
#[derive(Clone)]
pub struct PublisherRegistry {
    publishers: HashMap<ArtifactType, Arc<dyn ArtifactSourcePublisher>>,
}

impl PublisherRegistry {
    /// Build the registry, rejecting an empty set or two publishers claiming the same type
    pub fn new(
        publishers: Vec<Arc<dyn ArtifactSourcePublisher>>,
    ) -> Result<Self, DispatchError> {
        if publishers.is_empty() {
            return Err(DispatchError::NoPublishers);
        }

        let mut by_type = HashMap::new();
        for publisher in publishers {
            let artifact_type = publisher.supported_artifact();
            if by_type.contains_key(&artifact_type) {
                return Err(DispatchError::DuplicateClaim(artifact_type));
            }
            by_type.insert(artifact_type, publisher);
        }

        Ok(Self {
            publishers: by_type,
        })
    }

    /// Ensure every listed artifact type has a publisher
    pub fn require<'a>(
        &self,
        artifact_types: impl IntoIterator<Item = &'a ArtifactType>,
    ) -> Result<(), DispatchError> {
        for artifact_type in artifact_types {
            if !self.supports(artifact_type) {
                return Err(DispatchError::Unclaimed(artifact_type.clone()));
            }
        }
        Ok(())
    }

    pub fn supports(&self, artifact_type: &ArtifactType) -> bool {
        self.publishers.contains_key(artifact_type)
    }

    /// Get the publisher claiming an artifact type
    pub fn supporting(
        &self,
        artifact_type: &ArtifactType,
    ) -> Result<&Arc<dyn ArtifactSourcePublisher>, SyncError> {
        self.publishers
            .get(artifact_type)
            .ok_or_else(|| SyncError::UnsupportedArtifactType(artifact_type.clone()))
    }

    /// Get the publisher for a registered artifact, checking it understands the
    /// artifact's versioning strategy
    pub fn supporting_artifact(
        &self,
        artifact: &DeliveryArtifact,
    ) -> Result<&Arc<dyn ArtifactSourcePublisher>, SyncError> {
        let publisher = self.supporting(&artifact.artifact_type)?;
        let strategy = artifact.versioning_strategy.name();

        if !publisher
            .supported_versioning_strategies()
            .contains(&strategy)
        {
            return Err(SyncError::UnsupportedVersioningStrategy {
                artifact_type: artifact.artifact_type.clone(),
                strategy: strategy.to_string(),
            });
        }
        Ok(publisher)
    }

    /// Claimed artifact types, sorted
    pub fn artifact_types(&self) -> Vec<ArtifactType> {
        let mut types: Vec<_> = self.publishers.keys().cloned().collect();
        types.sort();
        types
    }
}

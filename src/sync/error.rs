use thiserror::Error;

use crate::artifact::error::{PublisherError, RepositoryError};
use crate::artifact::types::ArtifactType;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid system state: {0}")]
    InvalidSystemState(String),

    #[error("No publisher supports artifact type '{0}'")]
    UnsupportedArtifactType(ArtifactType),

    #[error("Publisher for '{artifact_type}' does not support versioning strategy '{strategy}'")]
    UnsupportedVersioningStrategy {
        artifact_type: ArtifactType,
        strategy: String,
    },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Publisher error: {0}")]
    Publisher(#[from] PublisherError),
}

/// Misconfigured publisher set, detected at startup
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("No artifact publishers configured")]
    NoPublishers,

    #[error("More than one publisher claims artifact type '{0}'")]
    DuplicateClaim(ArtifactType),

    #[error("No publisher claims artifact type '{0}'")]
    Unclaimed(ArtifactType),
}

use thiserror::Error;

use crate::artifact::types::ArtifactKey;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Artifact {0} is not registered")]
    NotRegistered(ArtifactKey),

    #[error("Delivery config not found: {0}")]
    DeliveryConfigNotFound(String),

    #[error("Repository lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Rate limited: retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Repository not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Artifact {artifact} is not supported by the {publisher} publisher")]
    UnsupportedArtifact { publisher: String, artifact: String },
}

//! Persistence traits for artifacts, their versions and delivery configs

use crate::artifact::error::RepositoryError;
use crate::artifact::types::{
    ArtifactKey, ArtifactType, ArtifactVersion, DeliveryArtifact, DeliveryConfig,
};

/// Trait for storing registered artifacts and their known versions
///
/// Implementations must be safe to share between concurrent sync tasks:
/// concurrent `store` calls never corrupt state and never report the same
/// version as new twice.
pub trait ArtifactRepository: Send + Sync + 'static {
    /// Register an artifact
    ///
    /// Registering the same artifact twice is a no-op. Returns true if this
    /// call registered it.
    fn register(&self, artifact: &DeliveryArtifact) -> Result<bool, RepositoryError>;

    /// Check if any artifact with this name and type is registered
    fn is_registered(
        &self,
        name: &str,
        artifact_type: &ArtifactType,
    ) -> Result<bool, RepositoryError>;

    /// Store a version of a registered artifact
    ///
    /// Returns true iff this call inserted a version string not seen before
    /// for the artifact. Storing a known version is a no-op returning false.
    fn store(&self, version: &ArtifactVersion) -> Result<bool, RepositoryError>;

    /// Get all stored version strings of an artifact, in no particular order
    fn versions(&self, artifact: &DeliveryArtifact) -> Result<Vec<String>, RepositoryError>;

    /// Get a single stored version with its metadata
    fn get_version(
        &self,
        artifact: &ArtifactKey,
        version: &str,
    ) -> Result<Option<ArtifactVersion>, RepositoryError>;

    /// Get every registered artifact sharing a version history key
    fn get_artifacts(&self, key: &ArtifactKey) -> Result<Vec<DeliveryArtifact>, RepositoryError>;

    /// Get every registered artifact
    fn get_all_artifacts(&self) -> Result<Vec<DeliveryArtifact>, RepositoryError>;
}

/// Trait for looking up delivery configs by name
pub trait DeliveryConfigRepository: Send + Sync + 'static {
    /// Insert or replace a delivery config
    fn store_delivery_config(&self, config: &DeliveryConfig) -> Result<(), RepositoryError>;

    /// Get a delivery config, `DeliveryConfigNotFound` if it does not exist
    fn get_delivery_config(&self, name: &str) -> Result<DeliveryConfig, RepositoryError>;
}

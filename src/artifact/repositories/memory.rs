//! In-memory repository

use std::sync::{Mutex, MutexGuard};

use indexmap::IndexMap;

use crate::artifact::error::RepositoryError;
use crate::artifact::repository::{ArtifactRepository, DeliveryConfigRepository};
use crate::artifact::types::{
    ArtifactKey, ArtifactType, ArtifactVersion, DeliveryArtifact, DeliveryConfig,
};

/// (name, type, reference, delivery config name)
type Identity = (String, ArtifactType, String, Option<String>);

fn identity_of(artifact: &DeliveryArtifact) -> Identity {
    (
        artifact.name.clone(),
        artifact.artifact_type.clone(),
        artifact.reference.clone(),
        artifact.delivery_config_name.clone(),
    )
}

#[derive(Default)]
struct State {
    artifacts: IndexMap<Identity, DeliveryArtifact>,
    versions: IndexMap<ArtifactKey, Vec<ArtifactVersion>>,
    delivery_configs: IndexMap<String, DeliveryConfig>,
}

/// Repository keeping everything in process memory
///
/// All state sits behind one lock, so every operation is atomic with
/// respect to every other.
#[derive(Default)]
pub struct InMemoryArtifactRepository {
    state: Mutex<State>,
}

impl InMemoryArtifactRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, State>, RepositoryError> {
        self.state.lock().map_err(|_| RepositoryError::LockPoisoned)
    }

    /// Remove all artifacts, versions and delivery configs
    pub fn drop_all(&self) -> Result<(), RepositoryError> {
        let mut state = self.lock_state()?;
        state.artifacts.clear();
        state.versions.clear();
        state.delivery_configs.clear();
        Ok(())
    }
}

impl ArtifactRepository for InMemoryArtifactRepository {
    fn register(&self, artifact: &DeliveryArtifact) -> Result<bool, RepositoryError> {
        let mut state = self.lock_state()?;
        state.versions.entry(artifact.key()).or_default();
        match state.artifacts.entry(identity_of(artifact)) {
            indexmap::map::Entry::Occupied(_) => Ok(false),
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert(artifact.clone());
                Ok(true)
            }
        }
    }

    fn is_registered(
        &self,
        name: &str,
        artifact_type: &ArtifactType,
    ) -> Result<bool, RepositoryError> {
        let state = self.lock_state()?;
        Ok(state
            .artifacts
            .values()
            .any(|a| a.name == name && &a.artifact_type == artifact_type))
    }

    fn store(&self, version: &ArtifactVersion) -> Result<bool, RepositoryError> {
        let mut state = self.lock_state()?;
        let versions = state
            .versions
            .get_mut(&version.artifact)
            .ok_or_else(|| RepositoryError::NotRegistered(version.artifact.clone()))?;

        if versions.iter().any(|v| v.version == version.version) {
            return Ok(false);
        }
        versions.push(version.clone());
        Ok(true)
    }

    fn versions(&self, artifact: &DeliveryArtifact) -> Result<Vec<String>, RepositoryError> {
        let state = self.lock_state()?;
        Ok(state
            .versions
            .get(&artifact.key())
            .map(|versions| versions.iter().map(|v| v.version.clone()).collect())
            .unwrap_or_default())
    }

    fn get_version(
        &self,
        artifact: &ArtifactKey,
        version: &str,
    ) -> Result<Option<ArtifactVersion>, RepositoryError> {
        let state = self.lock_state()?;
        Ok(state
            .versions
            .get(artifact)
            .and_then(|versions| versions.iter().find(|v| v.version == version))
            .cloned())
    }

    fn get_artifacts(&self, key: &ArtifactKey) -> Result<Vec<DeliveryArtifact>, RepositoryError> {
        let state = self.lock_state()?;
        Ok(state
            .artifacts
            .values()
            .filter(|a| a.name == key.name && a.artifact_type == key.artifact_type)
            .cloned()
            .collect())
    }

    fn get_all_artifacts(&self) -> Result<Vec<DeliveryArtifact>, RepositoryError> {
        let state = self.lock_state()?;
        Ok(state.artifacts.values().cloned().collect())
    }
}

impl DeliveryConfigRepository for InMemoryArtifactRepository {
    fn store_delivery_config(&self, config: &DeliveryConfig) -> Result<(), RepositoryError> {
        let mut state = self.lock_state()?;
        state
            .delivery_configs
            .insert(config.name.clone(), config.clone());
        Ok(())
    }

    fn get_delivery_config(&self, name: &str) -> Result<DeliveryConfig, RepositoryError> {
        let state = self.lock_state()?;
        state
            .delivery_configs
            .get(name)
            .cloned()
            .ok_or_else(|| RepositoryError::DeliveryConfigNotFound(name.to_string()))
    }
}

//! Shared fixtures for integration tests

#![allow(dead_code)]

pub mod capture;
pub mod publisher;

use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use artifact_sync::artifact::repositories::{InMemoryArtifactRepository, SqliteArtifactRepository};
use artifact_sync::artifact::repository::{ArtifactRepository, DeliveryConfigRepository};
use artifact_sync::artifact::strategies::TagVersionStrategy;
use artifact_sync::artifact::types::{DeliveryArtifact, DeliveryConfig};
use artifact_sync::artifact::versioning::Versioning;
use artifact_sync::sync::events::{ArtifactVersionUpdated, EventPublisher};

pub const CONFIG_NAME: &str = "myapp-manifest";
pub const SERVICE_ACCOUNT: &str = "myapp@example.com";

/// Event publisher remembering every update it was handed
#[derive(Default)]
pub struct RecordingEventPublisher {
    updates: Mutex<Vec<ArtifactVersionUpdated>>,
}

impl RecordingEventPublisher {
    pub fn updates(&self) -> Vec<ArtifactVersionUpdated> {
        self.updates.lock().unwrap().clone()
    }
}

impl EventPublisher for RecordingEventPublisher {
    fn publish(&self, event: ArtifactVersionUpdated) {
        self.updates.lock().unwrap().push(event);
    }
}

pub fn docker_artifact(name: &str) -> DeliveryArtifact {
    DeliveryArtifact::new(
        name,
        "docker",
        Versioning::docker(TagVersionStrategy::SemverJobCommitByJob),
    )
    .with_delivery_config(CONFIG_NAME)
}

pub fn delivery_config() -> DeliveryConfig {
    DeliveryConfig::new(CONFIG_NAME, "myapp", SERVICE_ACCOUNT)
}

/// Create a SQLite repository in a temp directory holding the test delivery config
pub fn create_test_repository() -> (TempDir, Arc<SqliteArtifactRepository>) {
    let temp_dir = TempDir::new().unwrap();
    let repository = SqliteArtifactRepository::new(&temp_dir.path().join("artifacts.db")).unwrap();
    repository.store_delivery_config(&delivery_config()).unwrap();
    (temp_dir, Arc::new(repository))
}

/// Create an in-memory repository holding the test delivery config and the given artifacts
pub fn create_memory_repository(artifacts: &[DeliveryArtifact]) -> Arc<InMemoryArtifactRepository> {
    let repository = InMemoryArtifactRepository::new();
    repository.store_delivery_config(&delivery_config()).unwrap();
    for artifact in artifacts {
        repository.register(artifact).unwrap();
    }
    Arc::new(repository)
}

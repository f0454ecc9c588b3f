//! Publisher test double

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use artifact_sync::artifact::error::{PublisherError, RegistryError};
use artifact_sync::artifact::publisher::ArtifactSourcePublisher;
use artifact_sync::artifact::types::{
    ArtifactType, DeliveryArtifact, DeliveryConfig, PublishedArtifact,
};

/// Docker publisher serving latest versions from a map
#[derive(Default)]
pub struct FakePublisher {
    latest: Mutex<HashMap<String, String>>,
    failing: HashSet<String>,
    delay: Duration,
    fetches: AtomicUsize,
}

impl FakePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latest(self, name: &str, version: &str) -> Self {
        self.set_latest(name, version);
        self
    }

    /// Fetches for this artifact fail with a registry error
    pub fn with_failure(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// Every fetch takes this long
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_latest(&self, name: &str, version: &str) {
        self.latest
            .lock()
            .unwrap()
            .insert(name.to_string(), version.to_string());
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactSourcePublisher for FakePublisher {
    fn supported_artifact(&self) -> ArtifactType {
        ArtifactType::new("docker")
    }

    fn supported_versioning_strategies(&self) -> Vec<&'static str> {
        vec!["docker"]
    }

    async fn get_latest_artifact(
        &self,
        _delivery_config: &DeliveryConfig,
        artifact: &DeliveryArtifact,
    ) -> Result<Option<PublishedArtifact>, PublisherError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(fetched = %artifact.name, "Fetching latest version");
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.contains(&artifact.name) {
            return Err(
                RegistryError::InvalidResponse(format!("{} is unavailable", artifact.name)).into(),
            );
        }

        let latest = self.latest.lock().unwrap().get(&artifact.name).cloned();
        Ok(latest.map(|version| PublishedArtifact::new(&artifact.name, "docker", &version)))
    }
}

//! Inbound events driving the coordinator and outbound version notifications

#[cfg(test)]
use mockall::automock;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::artifact::types::{ArtifactKey, ArtifactType, DeliveryArtifact, PublishedArtifact};

/// Events the coordinator reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactEvent {
    /// The process is ready to serve; enables periodic syncing
    ApplicationUp,
    /// The process is shutting down; disables periodic syncing
    ApplicationDown,
    /// A source pushed new artifact observations
    Published(Vec<PublishedArtifact>),
    /// An artifact was registered by a delivery config
    Registered(DeliveryArtifact),
    /// Request a sweep outside the regular schedule
    SyncRequested { controller_triggered: bool },
}

/// Emitted whenever a previously unknown version of an artifact is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactVersionUpdated {
    pub name: String,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
}

impl From<&ArtifactKey> for ArtifactVersionUpdated {
    fn from(key: &ArtifactKey) -> Self {
        Self {
            name: key.name.clone(),
            artifact_type: key.artifact_type.clone(),
        }
    }
}

/// Trait for delivering version notifications to the rest of the system
#[cfg_attr(test, automock)]
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: ArtifactVersionUpdated);
}

/// [`EventPublisher`] fanning notifications out over a broadcast channel
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<ArtifactVersionUpdated>,
}

impl BroadcastEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ArtifactVersionUpdated> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventPublisher for BroadcastEventPublisher {
    fn publish(&self, event: ArtifactVersionUpdated) {
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            debug!(
                "No subscribers for version update of {}:{}",
                event.artifact_type, event.name
            );
        }
    }
}

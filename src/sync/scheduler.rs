//! Periodic sweep task

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::artifact::repository::{ArtifactRepository, DeliveryConfigRepository};
use crate::sync::coordinator::ArtifactSyncCoordinator;

/// Spawn a task running a sweep every `period` until `shutdown` flips to true
///
/// The first sweep runs immediately. A sweep outlasting the period delays
/// the next tick instead of queueing a burst. Sweeps are still subject to
/// the coordinator's enable flag.
pub fn spawn_periodic_sync<R>(
    coordinator: Arc<ArtifactSyncCoordinator<R>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    R: ArtifactRepository + DeliveryConfigRepository,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Starting periodic artifact sync every {:?}", period);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = coordinator.sync_artifact_versions().await;
                    debug!("Periodic sweep checked {} artifacts", report.results.len());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Stopping periodic artifact sync");
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::repositories::InMemoryArtifactRepository;
    use crate::sync::dispatch::PublisherRegistry;
    use crate::sync::events::BroadcastEventPublisher;
    use crate::artifact::error::PublisherError;
    use crate::artifact::publisher::ArtifactSourcePublisher;
    use crate::artifact::types::{
        ArtifactType, DeliveryArtifact, DeliveryConfig, PublishedArtifact,
    };
    use crate::artifact::versioning::Versioning;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPublisher {
        fetches: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ArtifactSourcePublisher for CountingPublisher {
        fn supported_artifact(&self) -> ArtifactType {
            ArtifactType::new("deb")
        }

        fn supported_versioning_strategies(&self) -> Vec<&'static str> {
            vec!["semver"]
        }

        async fn get_latest_artifact(
            &self,
            _delivery_config: &DeliveryConfig,
            _artifact: &DeliveryArtifact,
        ) -> Result<Option<PublishedArtifact>, PublisherError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_every_tick_until_shutdown() {
        let publisher = Arc::new(CountingPublisher {
            fetches: AtomicUsize::new(0),
        });
        let repository = Arc::new(InMemoryArtifactRepository::new());
        repository
            .store_delivery_config(&DeliveryConfig::new("config", "myapp", "svc"))
            .unwrap();
        repository
            .register(
                &DeliveryArtifact::new("myapp", "deb", Versioning::semver())
                    .with_delivery_config("config"),
            )
            .unwrap();
        let coordinator = Arc::new(
            ArtifactSyncCoordinator::new(
                repository,
                PublisherRegistry::new(vec![publisher.clone()]).unwrap(),
                Arc::new(BroadcastEventPublisher::default()),
            )
            .with_fetch_stagger(Duration::ZERO),
        );
        coordinator.on_application_up();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = spawn_periodic_sync(coordinator, Duration::from_secs(60), shutdown_rx);
        tokio::time::sleep(Duration::from_secs(150)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(publisher.fetches.load(Ordering::SeqCst), 3);
    }
}

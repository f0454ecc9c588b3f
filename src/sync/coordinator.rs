//! Artifact version synchronization
//!
//! Three paths keep a registered artifact's version history complete:
//! - Push: a source reports newly published artifacts, which are stored
//!   if their type is claimed and the artifact is registered
//! - Backfill: a freshly registered artifact with no history gets the
//!   source's current latest version
//! - Sweep: every registered artifact is compared against its source and
//!   the source's latest version is stored when it is strictly newer than
//!   the newest recorded one
//!
//! Only the sweep is gated by the enable flag. Every path that stores a
//! version not seen before emits one [`ArtifactVersionUpdated`].

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{Instrument, debug, error, info, warn};

use crate::artifact::error::RepositoryError;
use crate::artifact::publisher::ArtifactSourcePublisher;
use crate::artifact::repository::{ArtifactRepository, DeliveryConfigRepository};
use crate::artifact::types::{
    ArtifactKey, ArtifactVersion, DeliveryArtifact, DeliveryConfig, PublishedArtifact,
};
use crate::artifact::versioning::{Versioning, VersioningStrategy};
use crate::config::DEFAULT_FETCH_STAGGER_MS;
use crate::sync::context::{SyncTrigger, TracingContext};
use crate::sync::dispatch::PublisherRegistry;
use crate::sync::error::SyncError;
use crate::sync::events::{ArtifactEvent, ArtifactVersionUpdated, EventPublisher};

/// Result of checking one artifact during a sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum SyncOutcome {
    /// A newer version was found and stored
    Stored { version: String },
    /// The source's latest version is already known or not newer
    UpToDate { version: String },
    /// The source has no version of the artifact
    NoVersion,
    /// Another task was already checking the artifact
    Skipped,
    /// The check failed; retried by the next sweep
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSyncResult {
    pub artifact: ArtifactKey,
    pub context: TracingContext,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

/// Per-artifact results of one sweep, in completion order
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub results: Vec<ArtifactSyncResult>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn stored(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Stored { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Skipped))
    }

    pub fn outcome_of(&self, artifact: &ArtifactKey) -> Option<&SyncOutcome> {
        self.results
            .iter()
            .find(|r| &r.artifact == artifact)
            .map(|r| &r.outcome)
    }

    fn count(&self, predicate: impl Fn(&SyncOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| predicate(&r.outcome)).count()
    }
}

/// Whether `latest` should be stored given the newest recorded version
///
/// With no history anything is new. Otherwise `latest` must differ from the
/// recorded version and sort strictly after it.
pub fn is_newer(strategy: &dyn VersioningStrategy, recorded: Option<&str>, latest: &str) -> bool {
    match recorded {
        None => true,
        Some(recorded) if recorded == latest => false,
        Some(recorded) => strategy.compare(recorded, latest) == Ordering::Less,
    }
}

/// Removes its key from the in-flight set when dropped
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<ArtifactKey>>,
    key: ArtifactKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

pub struct ArtifactSyncCoordinator<R> {
    repository: Arc<R>,
    publishers: PublisherRegistry,
    events: Arc<dyn EventPublisher>,
    enabled: AtomicBool,
    in_flight: Mutex<HashSet<ArtifactKey>>,
    fetch_stagger: Duration,
}

impl<R> ArtifactSyncCoordinator<R>
where
    R: ArtifactRepository + DeliveryConfigRepository,
{
    /// Creates a disabled coordinator; see [`Self::on_application_up`]
    pub fn new(
        repository: Arc<R>,
        publishers: PublisherRegistry,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            repository,
            publishers,
            events,
            enabled: AtomicBool::new(false),
            in_flight: Mutex::new(HashSet::new()),
            fetch_stagger: Duration::from_millis(DEFAULT_FETCH_STAGGER_MS),
        }
    }

    /// Delay between the starts of consecutive per-artifact checks in a sweep
    pub fn with_fetch_stagger(mut self, fetch_stagger: Duration) -> Self {
        self.fetch_stagger = fetch_stagger;
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn publishers(&self) -> &PublisherRegistry {
        &self.publishers
    }

    pub fn on_application_up(&self) {
        info!("Application up, enabling scheduled artifact syncing");
        self.enabled.store(true, AtomicOrdering::Release);
    }

    pub fn on_application_down(&self) {
        info!("Application down, disabling scheduled artifact syncing");
        self.enabled.store(false, AtomicOrdering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(AtomicOrdering::Acquire)
    }

    /// Store pushed artifact observations
    ///
    /// Observations of unclaimed types or unregistered artifacts are
    /// dropped. A failure on one observation is logged and does not stop
    /// the others. Returns the versions that were new.
    pub fn on_artifact_published(&self, artifacts: &[PublishedArtifact]) -> Vec<ArtifactVersion> {
        debug!("Received artifact published event with {} artifacts", artifacts.len());

        let mut stored = Vec::new();
        for artifact in artifacts
            .iter()
            .filter(|a| self.publishers.supports(&a.normalized_type()))
        {
            let context = TracingContext::for_artifact(&artifact.key(), SyncTrigger::Published);
            let _span = context.span().entered();

            match self.store_published(artifact) {
                Ok(Some(version)) => stored.push(version),
                Ok(None) => {}
                Err(e) => error!(
                    "Failed to store published artifact {} {}: {}",
                    artifact.name, artifact.version, e
                ),
            }
        }
        stored
    }

    fn store_published(
        &self,
        artifact: &PublishedArtifact,
    ) -> Result<Option<ArtifactVersion>, SyncError> {
        let key = artifact.key();
        if !self
            .repository
            .is_registered(&key.name, &key.artifact_type)?
        {
            debug!("Ignoring published artifact {}: not registered", key);
            return Ok(None);
        }

        let Some(registered) = self.repository.get_artifacts(&key)?.into_iter().next() else {
            return Ok(None);
        };
        let publisher = self.publishers.supporting(&key.artifact_type)?;
        let version = to_artifact_version(
            publisher.as_ref(),
            key,
            &registered.versioning_strategy,
            artifact,
        );

        info!(
            "Registering version {} ({}) of {}",
            version.version, version.release_status, version.artifact
        );
        self.store_and_announce(version)
    }

    /// Backfill the latest version of a newly registered artifact
    ///
    /// Does nothing when the artifact already has any stored version.
    pub async fn on_artifact_registered(
        &self,
        artifact: &DeliveryArtifact,
    ) -> Result<Option<ArtifactVersion>, SyncError> {
        let context = TracingContext::for_artifact(&artifact.key(), SyncTrigger::Registered);
        context.attach(self.backfill(artifact)).await
    }

    async fn backfill(
        &self,
        artifact: &DeliveryArtifact,
    ) -> Result<Option<ArtifactVersion>, SyncError> {
        if !self.repository.versions(artifact)?.is_empty() {
            debug!("Artifact {} already has versions, skipping backfill", artifact);
            return Ok(None);
        }

        let publisher = self.publishers.supporting_artifact(artifact)?;
        let delivery_config = self.delivery_config_of(artifact)?;

        debug!("Retrieving latest version of registered artifact {}", artifact);
        let Some(latest) = publisher
            .get_latest_artifact(&delivery_config, artifact)
            .await?
        else {
            warn!("No versions found for registered artifact {}", artifact);
            return Ok(None);
        };

        let version = to_artifact_version(
            publisher.as_ref(),
            artifact.key(),
            &artifact.versioning_strategy,
            &latest,
        );
        debug!("Storing latest version {} of {}", version.version, artifact);
        self.store_and_announce(version)
    }

    /// Upsert a delivery config and register its artifacts
    ///
    /// Every artifact is checked against the publisher set before anything
    /// is written. Newly registered artifacts are backfilled concurrently; a
    /// failed backfill is logged and left to the next sweep. Returns the
    /// artifacts this call registered.
    pub async fn apply_delivery_config(
        &self,
        delivery_config: DeliveryConfig,
    ) -> Result<Vec<DeliveryArtifact>, SyncError> {
        let delivery_config = delivery_config.normalized();
        for artifact in &delivery_config.artifacts {
            self.publishers.supporting_artifact(artifact)?;
        }

        self.repository.store_delivery_config(&delivery_config)?;
        info!(
            "Applied delivery config {} with {} artifacts",
            delivery_config.name,
            delivery_config.artifacts.len()
        );

        let mut registered = Vec::new();
        for artifact in &delivery_config.artifacts {
            if self.repository.register(artifact)? {
                info!("Registered artifact {}", artifact);
                registered.push(artifact.clone());
            }
        }

        let backfills = registered.iter().map(|artifact| async move {
            if let Err(e) = self.on_artifact_registered(artifact).await {
                error!("Failed to backfill versions of {}: {}", artifact, e);
            }
        });
        join_all(backfills).await;

        Ok(registered)
    }

    /// Explicit request to sync every registered artifact
    pub async fn trigger_artifact_sync(self: &Arc<Self>, controller_triggered: bool) -> SweepReport {
        if controller_triggered {
            info!("Fetching latest version of all registered artifacts...");
        }
        self.sync_artifact_versions().await
    }

    /// Check every registered artifact against its source
    ///
    /// One task per artifact, started `fetch_stagger` apart. Waits for all
    /// of them; a failing or panicking task only affects its own result.
    /// A no-op while disabled.
    pub async fn sync_artifact_versions(self: &Arc<Self>) -> SweepReport {
        if !self.is_enabled() {
            debug!("Scheduled artifact syncing is disabled, skipping sweep");
            return SweepReport::default();
        }

        let artifacts = match self.repository.get_all_artifacts() {
            Ok(artifacts) => artifacts,
            Err(e) => {
                error!("Failed to load registered artifacts: {}", e);
                return SweepReport::default();
            }
        };
        if artifacts.is_empty() {
            debug!("No registered artifacts to sync");
            return SweepReport::default();
        }
        info!("Syncing {} registered artifacts", artifacts.len());

        let mut tasks = JoinSet::new();
        let mut spawned = HashMap::new();
        for (index, artifact) in artifacts.into_iter().enumerate() {
            let coordinator = Arc::clone(self);
            let context = TracingContext::for_artifact(&artifact.key(), SyncTrigger::Sweep);
            let delay = stagger_delay(self.fetch_stagger, index);
            let task_context = context.clone();

            let handle = tasks.spawn(
                async move {
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                    let outcome = coordinator.check_artifact(&artifact).await;
                    ArtifactSyncResult {
                        artifact: artifact.key(),
                        context: task_context,
                        outcome,
                    }
                }
                .instrument(context.span()),
            );
            spawned.insert(handle.id(), context);
        }

        let mut report = SweepReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => report.results.push(result),
                Err(e) => {
                    error!("Artifact sync task failed: {}", e);
                    if let Some(context) = spawned.remove(&e.id()) {
                        let artifact = artifact_key_of(&context);
                        report.results.push(ArtifactSyncResult {
                            artifact,
                            context,
                            outcome: SyncOutcome::Failed {
                                error: e.to_string(),
                            },
                        });
                    }
                }
            }
        }

        info!(
            "Artifact sync finished: {} checked, {} stored, {} failed",
            report.results.len(),
            report.stored(),
            report.failed()
        );
        report
    }

    async fn check_artifact(&self, artifact: &DeliveryArtifact) -> SyncOutcome {
        let Some(_guard) = self.try_start_check(artifact.key()) else {
            info!("Skipping {}: already being checked", artifact);
            return SyncOutcome::Skipped;
        };

        match self.check_latest(artifact).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to sync versions of {}: {}", artifact, e);
                SyncOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    fn try_start_check(&self, key: ArtifactKey) -> Option<InFlightGuard<'_>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            in_flight: &self.in_flight,
            key,
        })
    }

    async fn check_latest(&self, artifact: &DeliveryArtifact) -> Result<SyncOutcome, SyncError> {
        let mut versions = self.repository.versions(artifact)?;
        artifact.versioning_strategy.sort_newest_first(&mut versions);
        let last_recorded = versions.into_iter().next();
        debug!("Last recorded version of {}: {:?}", artifact, last_recorded);

        let publisher = self.publishers.supporting_artifact(artifact)?;
        let delivery_config = self.delivery_config_of(artifact)?;
        let Some(latest) = publisher
            .get_latest_artifact(&delivery_config, artifact)
            .await?
        else {
            debug!("No version of {} found at the source", artifact);
            return Ok(SyncOutcome::NoVersion);
        };

        let latest_version = publisher.get_full_version_string(&latest);
        debug!("Latest version of {} at the source: {}", artifact, latest_version);

        if !is_newer(
            &artifact.versioning_strategy,
            last_recorded.as_deref(),
            &latest_version,
        ) {
            return Ok(SyncOutcome::UpToDate {
                version: latest_version,
            });
        }

        debug!("Artifact {} has a missing version {}, persisting", artifact, latest_version);
        let version = to_artifact_version(
            publisher.as_ref(),
            artifact.key(),
            &artifact.versioning_strategy,
            &latest,
        );
        Ok(match self.store_and_announce(version)? {
            Some(version) => SyncOutcome::Stored {
                version: version.version,
            },
            None => SyncOutcome::UpToDate {
                version: latest_version,
            },
        })
    }

    fn delivery_config_of(&self, artifact: &DeliveryArtifact) -> Result<DeliveryConfig, SyncError> {
        let name = artifact.delivery_config_name.as_deref().ok_or_else(|| {
            SyncError::InvalidSystemState(format!(
                "Delivery config name missing in artifact {}",
                artifact
            ))
        })?;

        match self.repository.get_delivery_config(name) {
            Ok(delivery_config) => Ok(delivery_config),
            Err(RepositoryError::DeliveryConfigNotFound(_)) => Err(SyncError::InvalidSystemState(
                format!("Delivery config {} of artifact {} does not exist", name, artifact),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn store_and_announce(
        &self,
        version: ArtifactVersion,
    ) -> Result<Option<ArtifactVersion>, SyncError> {
        if !self.repository.store(&version)? {
            debug!("Version {} of {} already known", version.version, version.artifact);
            return Ok(None);
        }

        info!("Stored new version {} of {}", version.version, version.artifact);
        self.events
            .publish(ArtifactVersionUpdated::from(&version.artifact));
        Ok(Some(version))
    }

    /// React to one inbound event
    pub async fn handle_event(self: &Arc<Self>, event: ArtifactEvent) {
        match event {
            ArtifactEvent::ApplicationUp => self.on_application_up(),
            ArtifactEvent::ApplicationDown => self.on_application_down(),
            ArtifactEvent::Published(artifacts) => {
                self.on_artifact_published(&artifacts);
            }
            ArtifactEvent::Registered(artifact) => {
                if let Err(e) = self.on_artifact_registered(&artifact).await {
                    error!("Failed to backfill versions of {}: {}", artifact, e);
                }
            }
            ArtifactEvent::SyncRequested {
                controller_triggered,
            } => {
                self.trigger_artifact_sync(controller_triggered).await;
            }
        }
    }

    /// Handle events in arrival order until every sender is dropped
    pub async fn run_event_loop(self: Arc<Self>, mut events: mpsc::Receiver<ArtifactEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        debug!("Artifact event channel closed");
    }
}

fn to_artifact_version(
    publisher: &dyn ArtifactSourcePublisher,
    key: ArtifactKey,
    versioning: &Versioning,
    artifact: &PublishedArtifact,
) -> ArtifactVersion {
    ArtifactVersion::new(
        key,
        &publisher.get_full_version_string(artifact),
        publisher.get_release_status(Some(artifact)),
    )
    .with_build(publisher.get_build_metadata(artifact, versioning))
    .with_git(publisher.get_git_metadata(artifact, versioning))
}

/// Start delay of the `index`th task of a sweep, saturating instead of overflowing
fn stagger_delay(stagger: Duration, index: usize) -> Duration {
    stagger.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX))
}

/// Recover the artifact key from a context's `type:name` identifier
fn artifact_key_of(context: &TracingContext) -> ArtifactKey {
    match context.artifact_id().split_once(':') {
        Some((artifact_type, name)) => ArtifactKey::new(name, artifact_type),
        None => ArtifactKey::new(context.artifact_id(), ""),
    }
}

//! Process wiring: logging, storage, publishers and lifecycle

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::artifact::publisher::ArtifactSourcePublisher;
use crate::artifact::publishers::DockerArtifactPublisher;
use crate::artifact::registries::DockerRegistryClient;
use crate::artifact::repositories::{InMemoryArtifactRepository, SqliteArtifactRepository};
use crate::artifact::repository::{ArtifactRepository, DeliveryConfigRepository};
use crate::artifact::types::{ArtifactType, ArtifactVersion, DeliveryConfig, PublishedArtifact};
use crate::config::{
    LOG_ENV, LogFormat, MAX_FETCH_STAGGER_MS, RegistriesConfig, SyncConfig, data_dir, db_path,
    load_config, log_path,
};
use crate::sync::coordinator::{ArtifactSyncCoordinator, SweepReport};
use crate::sync::dispatch::PublisherRegistry;
use crate::sync::events::{ArtifactVersionUpdated, BroadcastEventPublisher, EventPublisher};
use crate::sync::scheduler::spawn_periodic_sync;

/// How long a running sweep may continue after shutdown before it is abandoned
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Install the global subscriber writing to the log file in the data directory
///
/// The returned guard flushes buffered lines when dropped and must be held
/// for the life of the process.
pub fn init_logging(format: LogFormat) -> anyhow::Result<WorkerGuard> {
    let log_dir = data_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create data directory {:?}", log_dir))?;

    let file_name = log_path()
        .file_name()
        .map(|name| name.to_owned())
        .unwrap_or_else(|| "artifact-sync.log".into());
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&log_dir, file_name));

    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(writer).with_ansi(false))
            .try_init()?,
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(writer).with_ansi(false))
            .try_init()?,
    }

    Ok(guard)
}

/// Read a delivery config manifest from a JSON file
pub fn load_manifest(path: &Path) -> anyhow::Result<DeliveryConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {:?}", path))?;
    let delivery_config: DeliveryConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse manifest {:?}", path))?;
    Ok(delivery_config.normalized())
}

/// Read a batch of pushed artifacts from a JSON array file
pub fn load_published(path: &Path) -> anyhow::Result<Vec<PublishedArtifact>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read published artifacts {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse published artifacts {:?}", path))
}

/// Create one publisher per enabled registry
pub fn create_publishers(config: &RegistriesConfig) -> Vec<Arc<dyn ArtifactSourcePublisher>> {
    let mut publishers: Vec<Arc<dyn ArtifactSourcePublisher>> = Vec::new();

    if config.docker.enabled {
        let client = DockerRegistryClient::new(&config.docker.base_url)
            .with_token(config.docker.token.clone());
        publishers.push(Arc::new(DockerArtifactPublisher::new(Arc::new(client))));
    }

    publishers
}

/// Build a coordinator over `repository` and apply the given manifests
///
/// Fails before anything is written if an artifact type in use, stored or
/// in a manifest, has no publisher.
pub async fn build_coordinator<R>(
    config: &SyncConfig,
    repository: Arc<R>,
    events: Arc<dyn EventPublisher>,
    manifests: &[PathBuf],
) -> anyhow::Result<Arc<ArtifactSyncCoordinator<R>>>
where
    R: ArtifactRepository + DeliveryConfigRepository,
{
    anyhow::ensure!(
        config.sync.fetch_stagger <= MAX_FETCH_STAGGER_MS,
        "sync.fetchStagger must be at most {} ms",
        MAX_FETCH_STAGGER_MS
    );

    let delivery_configs = manifests
        .iter()
        .map(|path| load_manifest(path))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let publishers = PublisherRegistry::new(create_publishers(&config.registries))?;
    let mut in_use: Vec<ArtifactType> = repository
        .get_all_artifacts()?
        .into_iter()
        .map(|artifact| artifact.artifact_type)
        .collect();
    in_use.extend(
        delivery_configs
            .iter()
            .flat_map(|c| c.artifacts.iter().map(|a| a.artifact_type.clone())),
    );
    publishers.require(&in_use)?;
    info!(
        "Publishers configured for artifact types: {:?}",
        publishers.artifact_types()
    );

    let coordinator = Arc::new(
        ArtifactSyncCoordinator::new(repository, publishers, events)
            .with_fetch_stagger(Duration::from_millis(config.sync.fetch_stagger)),
    );

    for delivery_config in delivery_configs {
        let name = delivery_config.name.clone();
        let registered = coordinator.apply_delivery_config(delivery_config).await?;
        info!(
            "Delivery config {} registered {} new artifacts",
            name,
            registered.len()
        );
    }

    Ok(coordinator)
}

/// Run the daemon until Ctrl-C
pub async fn run_server(config_path: Option<PathBuf>, manifests: Vec<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config_path.as_deref())?;
    let _guard = init_logging(config.log.format)?;
    info!("Starting artifact-sync");

    if config.storage.in_memory {
        serve(&config, Arc::new(InMemoryArtifactRepository::new()), &manifests).await
    } else {
        let repository = SqliteArtifactRepository::new(&db_path())?;
        serve(&config, Arc::new(repository), &manifests).await
    }
}

async fn serve<R>(config: &SyncConfig, repository: Arc<R>, manifests: &[PathBuf]) -> anyhow::Result<()>
where
    R: ArtifactRepository + DeliveryConfigRepository,
{
    anyhow::ensure!(config.sync.interval > 0, "sync.interval must be positive");

    let events = Arc::new(BroadcastEventPublisher::default());
    spawn_update_logger(events.subscribe());
    let coordinator = build_coordinator(config, repository, events, manifests).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    coordinator.on_application_up();
    let mut sweeper = spawn_periodic_sync(
        Arc::clone(&coordinator),
        Duration::from_millis(config.sync.interval),
        shutdown_rx,
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down");

    coordinator.on_application_down();
    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(SHUTDOWN_GRACE, &mut sweeper).await.is_err() {
        warn!("Abandoning in-flight sweep");
        sweeper.abort();
    }

    Ok(())
}

fn spawn_update_logger(mut updates: broadcast::Receiver<ArtifactVersionUpdated>) {
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => info!(
                    "Artifact version updated: {}:{}",
                    update.artifact_type, update.name
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Missed {} artifact version updates", skipped)
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Apply manifests, run one sweep and return its report
pub async fn run_once(
    config_path: Option<PathBuf>,
    manifests: Vec<PathBuf>,
) -> anyhow::Result<SweepReport> {
    let config = load_config(config_path.as_deref())?;
    let _guard = init_logging(config.log.format)?;

    if config.storage.in_memory {
        sweep_once(&config, Arc::new(InMemoryArtifactRepository::new()), &manifests).await
    } else {
        let repository = SqliteArtifactRepository::new(&db_path())?;
        sweep_once(&config, Arc::new(repository), &manifests).await
    }
}

/// One sweep over everything registered after applying `manifests`
pub async fn sweep_once<R>(
    config: &SyncConfig,
    repository: Arc<R>,
    manifests: &[PathBuf],
) -> anyhow::Result<SweepReport>
where
    R: ArtifactRepository + DeliveryConfigRepository,
{
    let events = Arc::new(BroadcastEventPublisher::default());
    let coordinator = build_coordinator(config, repository, events, manifests).await?;

    coordinator.on_application_up();
    let report = coordinator.trigger_artifact_sync(true).await;
    coordinator.on_application_down();

    Ok(report)
}

/// Apply manifests and store a batch of pushed artifacts from a file
pub async fn run_publish(
    config_path: Option<PathBuf>,
    manifests: Vec<PathBuf>,
    published_path: PathBuf,
) -> anyhow::Result<Vec<ArtifactVersion>> {
    let config = load_config(config_path.as_deref())?;
    let _guard = init_logging(config.log.format)?;
    let published = load_published(&published_path)?;

    if config.storage.in_memory {
        publish_batch(&config, Arc::new(InMemoryArtifactRepository::new()), &manifests, &published).await
    } else {
        let repository = SqliteArtifactRepository::new(&db_path())?;
        publish_batch(&config, Arc::new(repository), &manifests, &published).await
    }
}

/// Store pushed artifacts after applying `manifests`, returning the new versions
pub async fn publish_batch<R>(
    config: &SyncConfig,
    repository: Arc<R>,
    manifests: &[PathBuf],
    published: &[PublishedArtifact],
) -> anyhow::Result<Vec<ArtifactVersion>>
where
    R: ArtifactRepository + DeliveryConfigRepository,
{
    let events = Arc::new(BroadcastEventPublisher::default());
    let coordinator = build_coordinator(config, repository, events, manifests).await?;

    Ok(coordinator.on_artifact_published(published))
}

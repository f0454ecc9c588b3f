//! Synchronization tests against real repositories

mod helper;

use std::sync::Arc;
use std::time::Duration;

use artifact_sync::artifact::repository::ArtifactRepository;
use artifact_sync::artifact::types::{BuildMetadata, GitMetadata, PublishedArtifact};
use artifact_sync::sync::context::SyncTrigger;
use artifact_sync::sync::{ArtifactSyncCoordinator, PublisherRegistry, SyncOutcome};

use helper::capture::fetch_capture;
use helper::publisher::FakePublisher;
use helper::{
    RecordingEventPublisher, create_memory_repository, create_test_repository, docker_artifact,
};

fn coordinator<R>(
    repository: Arc<R>,
    publisher: Arc<FakePublisher>,
    events: Arc<RecordingEventPublisher>,
) -> Arc<ArtifactSyncCoordinator<R>>
where
    R: ArtifactRepository + artifact_sync::artifact::repository::DeliveryConfigRepository,
{
    Arc::new(
        ArtifactSyncCoordinator::new(
            repository,
            PublisherRegistry::new(vec![publisher]).unwrap(),
            events,
        )
        .with_fetch_stagger(Duration::ZERO),
    )
}

#[tokio::test]
async fn registered_artifact_is_backfilled_then_updated_by_pushes() {
    let (_temp_dir, repository) = create_test_repository();
    let publisher = Arc::new(FakePublisher::new().with_latest("myapp", "myapp-1.0.42-h120.abcdef"));
    let events = Arc::new(RecordingEventPublisher::default());
    let coordinator = coordinator(repository.clone(), publisher.clone(), events.clone());
    let artifact = docker_artifact("myapp");
    repository.register(&artifact).unwrap();

    // Registration backfills the source's latest version
    let backfilled = coordinator.on_artifact_registered(&artifact).await.unwrap().unwrap();
    assert_eq!(backfilled.version, "myapp-1.0.42-h120.abcdef");
    let stored = repository
        .get_version(&artifact.key(), "myapp-1.0.42-h120.abcdef")
        .unwrap()
        .unwrap();
    assert_eq!(stored.build, Some(BuildMetadata { id: 120 }));
    assert_eq!(events.updates().len(), 1);

    // Pushing the same tag again is a no-op
    let duplicate = coordinator.on_artifact_published(&[PublishedArtifact::new(
        "myapp",
        "docker",
        "myapp-1.0.42-h120.abcdef",
    )]);
    assert!(duplicate.is_empty());
    assert_eq!(events.updates().len(), 1);

    // A newer tag is stored and announced
    let newer = coordinator.on_artifact_published(&[PublishedArtifact::new(
        "myapp",
        "docker",
        "myapp-1.0.43-h121.ghijkl",
    )]);
    assert_eq!(newer.len(), 1);
    assert_eq!(newer[0].build, Some(BuildMetadata { id: 121 }));
    assert_eq!(
        newer[0].git,
        Some(GitMetadata {
            commit: "ghijkl".to_string()
        })
    );

    let updates = events.updates();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[1].name, "myapp");
    assert_eq!(updates[1].artifact_type.as_str(), "docker");
    assert_eq!(publisher.fetches(), 1);
}

#[tokio::test]
async fn disabled_sweep_neither_fetches_nor_writes() {
    let artifact = docker_artifact("myapp");
    let repository = create_memory_repository(std::slice::from_ref(&artifact));
    let publisher = Arc::new(FakePublisher::new().with_latest("myapp", "myapp-1.0.42-h120.abcdef"));
    let events = Arc::new(RecordingEventPublisher::default());
    let coordinator = coordinator(repository.clone(), publisher.clone(), events.clone());

    let scheduled = coordinator.sync_artifact_versions().await;
    let requested = coordinator.trigger_artifact_sync(true).await;

    assert!(scheduled.is_empty());
    assert!(requested.is_empty());
    assert_eq!(publisher.fetches(), 0);
    assert!(repository.versions(&artifact).unwrap().is_empty());

    // Pushes are not gated
    let stored = coordinator.on_artifact_published(&[PublishedArtifact::new(
        "myapp",
        "docker",
        "myapp-1.0.42-h120.abcdef",
    )]);
    assert_eq!(stored.len(), 1);
    assert_eq!(events.updates().len(), 1);
}

#[tokio::test]
async fn sweep_after_application_down_is_a_no_op() {
    let artifact = docker_artifact("myapp");
    let repository = create_memory_repository(std::slice::from_ref(&artifact));
    let publisher = Arc::new(FakePublisher::new().with_latest("myapp", "myapp-1.0.42-h120.abcdef"));
    let coordinator = coordinator(
        repository,
        publisher.clone(),
        Arc::new(RecordingEventPublisher::default()),
    );

    coordinator.on_application_up();
    coordinator.on_application_down();
    let report = coordinator.sync_artifact_versions().await;

    assert!(report.is_empty());
    assert_eq!(publisher.fetches(), 0);
}

#[tokio::test]
async fn backfill_only_happens_for_artifacts_without_history() {
    let (_temp_dir, repository) = create_test_repository();
    let publisher = Arc::new(FakePublisher::new().with_latest("myapp", "myapp-1.0.42-h120.abcdef"));
    let events = Arc::new(RecordingEventPublisher::default());
    let coordinator = coordinator(repository.clone(), publisher.clone(), events.clone());
    let artifact = docker_artifact("myapp");
    repository.register(&artifact).unwrap();

    coordinator.on_artifact_registered(&artifact).await.unwrap();
    publisher.set_latest("myapp", "myapp-1.0.43-h121.ghijkl");
    let second = coordinator.on_artifact_registered(&artifact).await.unwrap();

    assert_eq!(second, None);
    assert_eq!(publisher.fetches(), 1);
    assert_eq!(
        repository.versions(&artifact).unwrap(),
        vec!["myapp-1.0.42-h120.abcdef"]
    );
    assert_eq!(events.updates().len(), 1);
}

#[tokio::test]
async fn sweep_skips_older_and_equal_versions() {
    let (_temp_dir, repository) = create_test_repository();
    let artifact = docker_artifact("myapp");
    repository.register(&artifact).unwrap();
    let publisher = Arc::new(FakePublisher::new().with_latest("myapp", "myapp-1.0.43-h121.ghijkl"));
    let events = Arc::new(RecordingEventPublisher::default());
    let coordinator = coordinator(repository.clone(), publisher.clone(), events.clone());
    coordinator.on_application_up();

    coordinator.on_artifact_published(&[PublishedArtifact::new(
        "myapp",
        "docker",
        "myapp-1.0.44-h122.mnopqr",
    )]);
    let report = coordinator.sync_artifact_versions().await;

    assert!(matches!(
        report.outcome_of(&artifact.key()),
        Some(SyncOutcome::UpToDate { version }) if version == "myapp-1.0.43-h121.ghijkl"
    ));
    assert_eq!(
        repository.versions(&artifact).unwrap(),
        vec!["myapp-1.0.44-h122.mnopqr"]
    );
    assert_eq!(events.updates().len(), 1);
}

#[tokio::test]
async fn sweep_failures_do_not_affect_other_artifacts() {
    let artifacts: Vec<_> = ["app-a", "app-b", "app-c"]
        .into_iter()
        .map(docker_artifact)
        .collect();
    let repository = create_memory_repository(&artifacts);
    let publisher = Arc::new(
        FakePublisher::new()
            .with_latest("app-a", "app-1.0.0-h1.aaaaaa")
            .with_failure("app-b")
            .with_latest("app-c", "app-2.0.0-h2.cccccc"),
    );
    let events = Arc::new(RecordingEventPublisher::default());
    let coordinator = coordinator(repository.clone(), publisher.clone(), events.clone());
    coordinator.on_application_up();

    let report = coordinator.sync_artifact_versions().await;

    assert_eq!(report.results.len(), 3);
    assert_eq!(report.stored(), 2);
    assert_eq!(report.failed(), 1);
    assert!(matches!(
        report.outcome_of(&artifacts[1].key()),
        Some(SyncOutcome::Failed { .. })
    ));
    assert_eq!(repository.versions(&artifacts[0]).unwrap().len(), 1);
    assert_eq!(repository.versions(&artifacts[2]).unwrap().len(), 1);
    assert_eq!(events.updates().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn thousand_concurrent_checks_keep_their_own_context() {
    let capture = fetch_capture();
    let artifacts: Vec<_> = (0..1000)
        .map(|i| docker_artifact(&format!("ctx-app-{i}")))
        .collect();
    let repository = create_memory_repository(&artifacts);
    let mut publisher = FakePublisher::new().with_delay(Duration::from_millis(5));
    for (i, artifact) in artifacts.iter().enumerate() {
        publisher = publisher.with_latest(&artifact.name, &format!("app-1.0.0-h{i}.c{i}"));
    }
    let publisher = Arc::new(publisher);
    let events = Arc::new(RecordingEventPublisher::default());
    let coordinator = coordinator(repository.clone(), publisher.clone(), events.clone());
    coordinator.on_application_up();

    let report = coordinator.sync_artifact_versions().await;

    assert_eq!(report.results.len(), 1000);
    assert_eq!(report.stored(), 1000);
    for result in &report.results {
        assert_eq!(result.context.trigger(), SyncTrigger::Sweep);
    }

    // Every fetch ran inside the span of the artifact being fetched
    let fetches = capture.fetches_of("ctx-app-");
    assert_eq!(fetches.len(), 1000);
    for fetch in &fetches {
        assert_eq!(
            fetch.span_artifact_id.as_deref(),
            Some(format!("docker:{}", fetch.fetched).as_str())
        );
    }

    // Each artifact holds exactly its own version
    for (i, artifact) in artifacts.iter().enumerate() {
        let expected = format!("app-1.0.0-h{i}.c{i}");
        assert_eq!(repository.versions(artifact).unwrap(), vec![expected.clone()]);
        let stored = repository
            .get_version(&artifact.key(), &expected)
            .unwrap()
            .unwrap();
        assert_eq!(stored.build, Some(BuildMetadata { id: i as u64 }));
        assert_eq!(
            stored.git,
            Some(GitMetadata {
                commit: format!("c{i}")
            })
        );
    }
    assert_eq!(publisher.fetches(), 1000);
    assert_eq!(events.updates().len(), 1000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_sweeps_never_check_an_artifact_twice_at_once() {
    let artifacts: Vec<_> = (0..20)
        .map(|i| docker_artifact(&format!("app-{i}")))
        .collect();
    let repository = create_memory_repository(&artifacts);
    let mut publisher = FakePublisher::new().with_delay(Duration::from_millis(100));
    for artifact in &artifacts {
        publisher = publisher.with_latest(&artifact.name, "app-1.0.0-h1.abcdef");
    }
    let publisher = Arc::new(publisher);
    let events = Arc::new(RecordingEventPublisher::default());
    let coordinator = coordinator(repository.clone(), publisher.clone(), events.clone());
    coordinator.on_application_up();

    let (timer, requested) = tokio::join!(
        coordinator.sync_artifact_versions(),
        coordinator.trigger_artifact_sync(true)
    );

    assert_eq!(timer.results.len(), 20);
    assert_eq!(requested.results.len(), 20);
    assert_eq!(timer.stored() + requested.stored(), 20);
    assert_eq!(timer.skipped() + requested.skipped(), 20);
    assert_eq!(publisher.fetches(), 20);
    assert_eq!(events.updates().len(), 20);
    for artifact in &artifacts {
        assert_eq!(repository.versions(artifact).unwrap().len(), 1);
    }
}

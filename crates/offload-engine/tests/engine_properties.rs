use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use offload_core::{
    AdapterError, Item, LedgerEntry, RetryPolicy, TransferOutcome, VerifyOutcome,
};
use offload_engine::{EngineConfig, EngineError, Orchestrator, RetryPolicies};
use offload_state::StateStore;
use offload_telemetry::Metrics;
use offload_test_support::fixtures::item_with_content;
use offload_test_support::mocks::{ScriptedExecutor, ScriptedSource};
use tempfile::TempDir;

struct Harness {
    content: TempDir,
    state: TempDir,
    source: Arc<ScriptedSource>,
    executor: Arc<ScriptedExecutor>,
}

impl Harness {
    fn new() -> Result<Self> {
        Ok(Self {
            content: TempDir::new()?,
            state: TempDir::new()?,
            source: Arc::new(ScriptedSource::new(Vec::new())),
            executor: Arc::new(ScriptedExecutor::new()),
        })
    }

    fn with_executor(mut self, executor: ScriptedExecutor) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    fn item(&self, id: &str, name: &str) -> Result<Item> {
        Ok(item_with_content(self.content.path(), id, name)?)
    }

    fn store(&self) -> Result<Arc<StateStore>> {
        Ok(Arc::new(StateStore::open(self.state.path())?))
    }

    /// Build an orchestrator over a freshly loaded ledger, as a restart would.
    fn orchestrator(&self, config: EngineConfig) -> Result<Orchestrator> {
        Ok(Orchestrator::new(
            config,
            self.source.clone(),
            self.executor.clone(),
            self.store()?,
            Metrics::new()?,
        ))
    }
}

fn config() -> EngineConfig {
    EngineConfig {
        check_interval: Duration::from_secs(300),
        worker_count: 2,
        max_concurrent_transfers: 2,
        poll_interval: Duration::from_millis(20),
        retry: RetryPolicies::uniform(RetryPolicy::once()),
        ..EngineConfig::default()
    }
}

/// Start, let the first discovery cycle run, then drain and stop.
async fn run_cycle(orchestrator: &Orchestrator) -> Result<()> {
    orchestrator.start().await?;
    orchestrator.stop().await?;
    Ok(())
}

fn failure_count(store: &StateStore, id: &str) -> Option<u32> {
    match store.get(id) {
        Some(LedgerEntry::Failed(record)) => Some(record.failure_count),
        _ => None,
    }
}

#[tokio::test]
async fn verified_item_is_recorded_and_cleaned_up() -> Result<()> {
    let harness = Harness::new()?;
    let item = harness.item("h1", "A")?;
    let local = item.local_path.clone();
    harness.source.set_items(vec![item]);

    let orchestrator = harness.orchestrator(config())?;
    run_cycle(&orchestrator).await?;

    match orchestrator.store().get("h1") {
        Some(LedgerEntry::Processed(record)) => {
            assert_eq!(record.name, "A");
            assert_eq!(record.path, local.to_string_lossy());
            assert_eq!(record.retries, None);
        }
        other => panic!("expected processed entry, got {other:?}"),
    }
    assert!(orchestrator.store().snapshot().failed.is_empty());
    assert!(!local.exists());
    assert_eq!(harness.source.deletes(), vec![("h1".to_string(), false)]);
    assert_eq!(
        harness.executor.transfer_calls(),
        vec![(local.clone(), "A".to_string())]
    );
    assert_eq!(harness.executor.verify_calls(), vec![(local, "A".to_string())]);

    let snapshot = orchestrator.metrics().snapshot();
    assert_eq!(snapshot.tasks_completed, 1);
    assert_eq!(snapshot.active_transfers, 0);
    assert_eq!(snapshot.queue_depth, 0);
    assert_eq!(orchestrator.store().in_flight_count(), 0);
    Ok(())
}

#[tokio::test]
async fn category_becomes_remote_folder() -> Result<()> {
    let harness = Harness::new()?;
    harness
        .source
        .set_items(vec![harness.item("h1", "A")?.with_category("tv")]);

    run_cycle(&harness.orchestrator(config())?).await?;

    let calls = harness.executor.transfer_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, "tv/A");
    Ok(())
}

#[tokio::test]
async fn processed_items_are_never_transferred_again() -> Result<()> {
    let harness = Harness::new()?;
    harness.source.set_items(vec![harness.item("h1", "A")?]);
    let config = EngineConfig {
        delete_from_source: false,
        delete_local_content: false,
        ..config()
    };

    run_cycle(&harness.orchestrator(config.clone())?).await?;
    run_cycle(&harness.orchestrator(config)?).await?;

    assert_eq!(harness.executor.transfer_calls().len(), 1);
    assert!(harness.source.deletes().is_empty());
    Ok(())
}

#[tokio::test]
async fn failures_accumulate_until_the_ceiling_then_stop() -> Result<()> {
    let harness = Harness::new()?;
    harness.source.set_items(vec![harness.item("h1", "A")?]);
    for _ in 0..5 {
        harness.executor.push_transfer(
            "A",
            Ok(TransferOutcome::Failed {
                message: "quota exceeded".into(),
            }),
        );
    }

    for expected in 1..=3 {
        run_cycle(&harness.orchestrator(config())?).await?;
        let reloaded = harness.store()?;
        assert_eq!(failure_count(&reloaded, "h1"), Some(expected));
    }

    run_cycle(&harness.orchestrator(config())?).await?;
    let reloaded = harness.store()?;
    assert_eq!(failure_count(&reloaded, "h1"), Some(3));
    assert_eq!(harness.executor.transfer_calls().len(), 3);
    assert!(reloaded.snapshot().processed.is_empty());

    match reloaded.get("h1") {
        Some(LedgerEntry::Failed(record)) => {
            assert_eq!(record.name, "A");
            assert!(record.last_error.contains("quota exceeded"));
            assert!(record.first_failure_at <= record.last_failure_at);
        }
        other => panic!("expected failure entry, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn verification_mismatch_keeps_everything_in_place() -> Result<()> {
    let harness = Harness::new()?;
    let item = harness.item("h1", "A")?;
    let local = item.local_path.clone();
    harness.source.set_items(vec![item]);
    harness.executor.push_verify(
        "A",
        Ok(VerifyOutcome::Mismatch {
            details: "1 differences found".into(),
        }),
    );

    let orchestrator = harness.orchestrator(config())?;
    run_cycle(&orchestrator).await?;

    assert!(local.join("payload.bin").is_file());
    assert!(harness.source.deletes().is_empty());
    assert!(orchestrator.store().snapshot().processed.is_empty());
    match orchestrator.store().get("h1") {
        Some(LedgerEntry::Failed(record)) => {
            assert_eq!(record.failure_count, 1);
            assert!(record.last_error.starts_with("verification mismatch"));
        }
        other => panic!("expected failure entry, got {other:?}"),
    }
    assert_eq!(orchestrator.metrics().snapshot().tasks_failed, 1);
    Ok(())
}

#[tokio::test]
async fn transfers_never_exceed_the_concurrency_limit() -> Result<()> {
    let harness =
        Harness::new()?.with_executor(ScriptedExecutor::new().with_transfer_delay(Duration::from_millis(50)));
    let items = (0..10)
        .map(|index| harness.item(&format!("h{index}"), &format!("item-{index}")))
        .collect::<Result<Vec<_>>>()?;
    harness.source.set_items(items);
    let config = EngineConfig {
        worker_count: 10,
        max_concurrent_transfers: 3,
        ..config()
    };

    let orchestrator = harness.orchestrator(config)?;
    run_cycle(&orchestrator).await?;

    assert!(harness.executor.peak_active() <= 3);
    assert!(harness.executor.peak_active() >= 1);
    assert_eq!(orchestrator.store().snapshot().processed.len(), 10);
    Ok(())
}

#[tokio::test]
async fn queued_ids_are_not_queued_twice() -> Result<()> {
    let harness = Harness::new()?;
    harness.source.set_items(vec![harness.item("h1", "A")?]);
    let orchestrator = harness.orchestrator(config())?;

    let first = orchestrator.run_discovery_cycle().await?;
    let second = orchestrator.run_discovery_cycle().await?;

    assert_eq!(first.enqueued_new, 1);
    assert_eq!(second.enqueued_new, 0);
    assert_eq!(orchestrator.queue_depth(), 1);
    assert!(orchestrator.store().is_in_flight("h1"));
    Ok(())
}

#[tokio::test]
async fn panicking_transfer_is_contained() -> Result<()> {
    let harness = Harness::new()?;
    harness
        .source
        .set_items(vec![harness.item("h1", "A")?, harness.item("h2", "B")?]);
    harness.executor.panic_on("A");
    let config = EngineConfig {
        worker_count: 1,
        ..config()
    };

    let orchestrator = harness.orchestrator(config)?;
    run_cycle(&orchestrator).await?;

    match orchestrator.store().get("h1") {
        Some(LedgerEntry::Failed(record)) => assert_eq!(record.last_error, "task panicked"),
        other => panic!("expected failure entry, got {other:?}"),
    }
    assert!(matches!(
        orchestrator.store().get("h2"),
        Some(LedgerEntry::Processed(_))
    ));
    assert_eq!(orchestrator.store().in_flight_count(), 0);
    assert_eq!(orchestrator.metrics().snapshot().active_transfers, 0);
    Ok(())
}

#[tokio::test]
async fn vanished_content_drops_its_failure_record() -> Result<()> {
    let harness = Harness::new()?;
    let gone = harness.content.path().join("gone");
    harness
        .store()?
        .record_failure("h9", "gone", &gone.to_string_lossy(), "network")?;

    let orchestrator = harness.orchestrator(config())?;
    let report = orchestrator.run_discovery_cycle().await?;

    assert_eq!(report.purged, 1);
    assert_eq!(report.enqueued_retry, 0);
    assert!(orchestrator.store().get("h9").is_none());
    assert!(harness.store()?.get("h9").is_none());
    Ok(())
}

#[tokio::test]
async fn exhausted_record_is_purged_once_content_vanishes() -> Result<()> {
    let harness = Harness::new()?;
    let gone = harness.content.path().join("gone");
    let store = harness.store()?;
    for _ in 0..3 {
        store.record_failure("h9", "gone", &gone.to_string_lossy(), "network")?;
    }
    drop(store);

    let orchestrator = harness.orchestrator(config())?;
    let report = orchestrator.run_discovery_cycle().await?;

    assert_eq!(report.purged, 1);
    assert_eq!(report.enqueued_retry, 0);
    assert!(harness.store()?.get("h9").is_none());

    let item = harness.item("h9", "gone")?;
    harness.source.set_items(vec![item]);
    let report = orchestrator.run_discovery_cycle().await?;
    assert_eq!(report.enqueued_new, 1);
    Ok(())
}

#[tokio::test]
async fn exhausted_record_with_content_is_left_alone() -> Result<()> {
    let harness = Harness::new()?;
    let item = harness.item("h4", "D")?;
    let store = harness.store()?;
    for _ in 0..3 {
        store.record_failure("h4", "D", &item.local_path.to_string_lossy(), "network")?;
    }
    drop(store);

    let orchestrator = harness.orchestrator(config())?;
    let report = orchestrator.run_discovery_cycle().await?;

    assert_eq!(report, offload_engine::CycleReport::default());
    assert_eq!(failure_count(orchestrator.store(), "h4"), Some(3));
    Ok(())
}

#[tokio::test]
async fn unlisted_failures_are_retried_from_the_ledger() -> Result<()> {
    let harness = Harness::new()?;
    let item = harness.item("h3", "C")?;
    harness
        .store()?
        .record_failure("h3", "C", &item.local_path.to_string_lossy(), "network")?;

    let orchestrator = harness.orchestrator(config())?;
    run_cycle(&orchestrator).await?;

    match orchestrator.store().get("h3") {
        Some(LedgerEntry::Processed(record)) => assert_eq!(record.retries, Some(1)),
        other => panic!("expected processed entry, got {other:?}"),
    }
    assert!(orchestrator.store().snapshot().failed.is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_content_is_abandoned_without_transfer() -> Result<()> {
    let harness = Harness::new()?;
    harness.source.set_items(vec![Item::new(
        "h1",
        "A",
        harness.content.path().join("never-created"),
    )]);

    let orchestrator = harness.orchestrator(config())?;
    run_cycle(&orchestrator).await?;

    assert!(harness.executor.transfer_calls().is_empty());
    assert!(orchestrator.store().get("h1").is_none());
    assert_eq!(orchestrator.metrics().snapshot().tasks_abandoned, 1);
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_content_is_abandoned_with_a_failure() -> Result<()> {
    use std::fs::{self, Permissions};
    use std::os::unix::fs::PermissionsExt;

    let harness = Harness::new()?;
    let item = harness.item("h1", "A")?;
    let local = item.local_path.clone();
    fs::set_permissions(&local, Permissions::from_mode(0o000))?;
    if fs::read_dir(&local).is_ok() {
        // Permission bits are not enforced for this user (for example root).
        fs::set_permissions(&local, Permissions::from_mode(0o755))?;
        return Ok(());
    }
    harness.source.set_items(vec![item]);

    let orchestrator = harness.orchestrator(config())?;
    let outcome = run_cycle(&orchestrator).await;
    fs::set_permissions(&local, Permissions::from_mode(0o755))?;
    outcome?;

    assert!(harness.executor.transfer_calls().is_empty());
    match orchestrator.store().get("h1") {
        Some(LedgerEntry::Failed(record)) => {
            assert_eq!(record.failure_count, 1);
            assert!(
                record.last_error.starts_with("local content unreadable"),
                "{}",
                record.last_error
            );
        }
        other => panic!("expected failure entry, got {other:?}"),
    }
    let snapshot = orchestrator.metrics().snapshot();
    assert_eq!(snapshot.tasks_abandoned, 1);
    assert_eq!(snapshot.tasks_failed, 0);
    Ok(())
}

#[tokio::test]
async fn refused_source_deletion_still_completes() -> Result<()> {
    let harness = Harness::new()?;
    let item = harness.item("h1", "A")?;
    let local = item.local_path.clone();
    harness.source.set_items(vec![item]);
    harness.source.refuse_deletes();

    let orchestrator = harness.orchestrator(config())?;
    run_cycle(&orchestrator).await?;

    assert!(matches!(
        orchestrator.store().get("h1"),
        Some(LedgerEntry::Processed(_))
    ));
    assert_eq!(harness.source.deletes(), vec![("h1".to_string(), false)]);
    assert!(!local.exists());
    assert_eq!(orchestrator.metrics().snapshot().tasks_completed, 1);
    Ok(())
}

#[tokio::test]
async fn failed_health_check_blocks_start() -> Result<()> {
    let harness = Harness::new()?;
    harness.source.set_unhealthy();
    harness.executor.set_unhealthy();
    let orchestrator = harness.orchestrator(config())?;

    let err = orchestrator
        .start()
        .await
        .expect_err("unhealthy collaborators block start");
    match err {
        EngineError::HealthCheck { failures } => {
            let components: Vec<_> = failures.iter().map(|f| f.component).collect();
            assert_eq!(components, vec!["source", "transfer"]);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!orchestrator.is_running());
    assert_eq!(harness.source.list_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn continue_on_errors_starts_despite_health_failures() -> Result<()> {
    let harness = Harness::new()?;
    harness.executor.set_unhealthy();
    let orchestrator = harness.orchestrator(EngineConfig {
        continue_on_errors: true,
        ..config()
    })?;

    orchestrator.start().await?;
    assert!(orchestrator.is_running());
    assert!(matches!(
        orchestrator.start().await,
        Err(EngineError::AlreadyRunning)
    ));
    orchestrator.stop().await?;
    assert!(!orchestrator.is_running());
    orchestrator.stop().await?;
    Ok(())
}

#[tokio::test]
async fn transient_transfer_errors_are_retried_within_an_attempt() -> Result<()> {
    let harness = Harness::new()?;
    harness.source.set_items(vec![harness.item("h1", "A")?]);
    for _ in 0..2 {
        harness.executor.push_transfer(
            "A",
            Err(AdapterError::transient(
                "rclone.copy",
                io::Error::other("connection reset"),
            )),
        );
    }
    let config = EngineConfig {
        retry: RetryPolicies {
            transfer: RetryPolicy::new(3, Duration::ZERO, 1),
            ..RetryPolicies::uniform(RetryPolicy::once())
        },
        ..config()
    };

    let orchestrator = harness.orchestrator(config)?;
    run_cycle(&orchestrator).await?;

    assert_eq!(harness.executor.transfer_calls().len(), 3);
    assert!(matches!(
        orchestrator.store().get("h1"),
        Some(LedgerEntry::Processed(_))
    ));
    Ok(())
}

#[tokio::test]
async fn failing_listing_is_reported_and_recoverable() -> Result<()> {
    let harness = Harness::new()?;
    harness.source.set_items(vec![harness.item("h1", "A")?]);
    harness.source.fail_next_list(AdapterError::transient(
        "qbit.list",
        io::Error::other("connection refused"),
    ));
    let orchestrator = harness.orchestrator(config())?;

    let err = orchestrator
        .run_discovery_cycle()
        .await
        .expect_err("listing failure surfaces");
    assert!(matches!(err, EngineError::Adapter { .. }));

    let report = orchestrator.run_discovery_cycle().await?;
    assert_eq!(report.enqueued_new, 1);
    Ok(())
}

use anyhow::Result;
use checkpoint::{CheckpointMonitor, CheckpointSignal};
use exp_core::config::{CHECKPOINT_ENV, ROOT_ENV};
use exp_core::logging::init_tracing;
use exp_core::CheckpointConfig;
use std::ffi::OsString;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

const POLL: Duration = Duration::from_millis(20);

// Build the config a supervisor would export for a step running under `root`
fn supervised_env(root: &Path) -> CheckpointConfig {
    let root = OsString::from(root);
    CheckpointConfig::from_lookup(move |key| match key {
        CHECKPOINT_ENV => Some(OsString::from("1")),
        ROOT_ENV => Some(root.clone()),
        _ => None,
    })
    .with_poll_interval(POLL)
}

fn init_repo() -> Result<tempfile::TempDir> {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join(".dvc").join("tmp"))?;
    Ok(dir)
}

#[tokio::test]
async fn test_sequential_checkpoints_with_monitor() -> Result<()> {
    init_tracing("checkpoint=debug");
    let dir = init_repo()?;
    let signal = CheckpointSignal::new(supervised_env(dir.path()));
    let monitor = CheckpointMonitor::new(signal.signal_path()?, POLL);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let commits = Arc::new(AtomicU64::new(0));

    let monitor_task = tokio::spawn({
        let monitor = monitor.clone();
        let commits = Arc::clone(&commits);
        async move {
            monitor
                .run(
                    move || {
                        let commits = Arc::clone(&commits);
                        async move {
                            commits.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }
                    },
                    shutdown_rx,
                )
                .await
        }
    });

    for _ in 0..3 {
        tokio::time::timeout(Duration::from_secs(5), signal.request()).await??;
        assert!(!monitor.signal_path().exists());
    }

    shutdown_tx.send(())?;
    let processed = monitor_task.await??;
    assert_eq!(processed, 3);
    assert_eq!(commits.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_client_with_async_monitor() -> Result<()> {
    let dir = init_repo()?;
    let signal = CheckpointSignal::new(supervised_env(dir.path()));
    let monitor = CheckpointMonitor::new(signal.signal_path()?, POLL);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let monitor_task = tokio::spawn({
        let monitor = monitor.clone();
        async move { monitor.run(|| async { Ok(()) }, shutdown_rx).await }
    });

    tokio::task::spawn_blocking(move || signal.request_blocking()).await??;

    shutdown_tx.send(())?;
    assert_eq!(monitor_task.await??, 1);
    Ok(())
}

#[tokio::test]
async fn test_wait_ends_within_poll_interval() -> Result<()> {
    let dir = init_repo()?;
    let signal = CheckpointSignal::new(supervised_env(dir.path()));
    let path = signal.signal_path()?;
    let deleted_at = Arc::new(Mutex::new(None::<Instant>));

    let deleter = tokio::spawn({
        let path = path.clone();
        let deleted_at = Arc::clone(&deleted_at);
        async move {
            while !path.exists() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
            // The file must already be there, empty, before the client polls
            assert_eq!(std::fs::metadata(&path).map(|m| m.len()).ok(), Some(0));
            tokio::time::sleep(Duration::from_millis(150)).await;
            std::fs::remove_file(&path).unwrap();
            *deleted_at.lock().unwrap() = Some(Instant::now());
        }
    });

    let start = Instant::now();
    tokio::time::timeout(Duration::from_secs(5), signal.request()).await??;
    let returned_at = Instant::now();
    deleter.await?;

    assert!(returned_at.duration_since(start) >= Duration::from_millis(150));
    let deleted_at = deleted_at.lock().unwrap().expect("deleter ran");
    assert!(returned_at.saturating_duration_since(deleted_at) < POLL + Duration::from_millis(200));
    Ok(())
}

#[tokio::test]
async fn test_unsupervised_leaves_no_trace() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = OsString::from(dir.path());
    let config = CheckpointConfig::from_lookup(move |key| match key {
        ROOT_ENV => Some(root.clone()),
        _ => None,
    });

    CheckpointSignal::new(config).request().await?;

    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

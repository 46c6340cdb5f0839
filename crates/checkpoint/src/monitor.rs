//! Supervisor side of the checkpoint signal protocol

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use exp_core::config::DEFAULT_POLL_INTERVAL;
use exp_core::{signal_path, Result};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Shutdown signal sender
pub type ShutdownSender = broadcast::Sender<()>;

/// Shutdown signal receiver
pub type ShutdownReceiver = broadcast::Receiver<()>;

/// Watches a step's signal file and acknowledges checkpoints by deleting it
#[derive(Debug, Clone)]
pub struct CheckpointMonitor {
    /// Signal file being watched
    signal_path: PathBuf,

    /// Delay between existence checks
    poll_interval: Duration,
}

impl CheckpointMonitor {
    /// Create a monitor for an explicit signal file
    pub fn new(signal_path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            signal_path: signal_path.into(),
            poll_interval,
        }
    }

    /// Create a monitor for the signal file of the repository at `root`
    pub fn for_root(root: &Path) -> Self {
        Self::new(signal_path(root), DEFAULT_POLL_INTERVAL)
    }

    /// Get the watched signal file
    pub fn signal_path(&self) -> &Path {
        &self.signal_path
    }

    /// Remove a signal file left behind by an earlier, interrupted run.
    ///
    /// Returns true if a stale file was removed.
    pub async fn clear_stale(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.signal_path).await {
            Ok(()) => {
                warn!(path = %self.signal_path.display(), "Removed stale checkpoint signal");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Check for the signal once; if present, run the callback and delete it.
    ///
    /// Returns true if a checkpoint was acknowledged.
    async fn poll_once<F, Fut>(&self, on_checkpoint: &mut F) -> Result<bool>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        if !matches!(tokio::fs::try_exists(&self.signal_path).await, Ok(true)) {
            return Ok(false);
        }

        debug!(path = %self.signal_path.display(), "Checkpoint signal observed");
        if let Err(e) = on_checkpoint().await {
            warn!(error = %e, "Checkpoint callback failed");
        }

        match tokio::fs::remove_file(&self.signal_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    /// Run the monitor loop until shutdown.
    ///
    /// Each time the signal file appears `on_checkpoint` runs, then the file is
    /// deleted so the step can continue. A failing callback is logged and the
    /// file is still deleted. Returns the number of checkpoints processed.
    pub async fn run<F, Fut>(
        &self,
        mut on_checkpoint: F,
        mut shutdown_rx: ShutdownReceiver,
    ) -> Result<u64>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut processed = 0u64;

        info!(
            path = %self.signal_path.display(),
            interval_ms = self.poll_interval.as_millis() as u64,
            "Starting checkpoint monitor"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {
                    if self.poll_once(&mut on_checkpoint).await? {
                        processed += 1;
                        info!(processed, "Checkpoint acknowledged");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!(processed, "Checkpoint monitor shutting down");
                    break;
                }
            }
        }

        Ok(processed)
    }
}

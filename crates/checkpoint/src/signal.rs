//! Checkpoint signal client for supervised step processes

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use exp_core::{find_root, signal_path, CheckpointConfig, Result};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

/// Requests checkpoints from the supervisor and waits for acknowledgement.
///
/// Without supervision every request is a no-op, so calls can stay in code
/// that also runs standalone. There is no timeout: if the supervisor never
/// deletes the signal file, the request blocks until the process is killed.
#[derive(Debug, Clone)]
pub struct CheckpointSignal {
    /// Supervision and root settings
    config: CheckpointConfig,

    /// Directory to start root discovery from (process cwd if unset)
    cwd: Option<PathBuf>,
}

impl CheckpointSignal {
    /// Create a signal client from explicit configuration
    pub fn new(config: CheckpointConfig) -> Self {
        Self { config, cwd: None }
    }

    /// Create a signal client from the process environment
    pub fn from_env() -> Self {
        Self::new(CheckpointConfig::from_env())
    }

    /// Discover the repository root from `cwd` instead of the process cwd
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Whether a supervisor is listening
    pub fn is_supervised(&self) -> bool {
        self.config.supervised
    }

    /// Get configuration
    pub fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    /// Repository root: the override if set, otherwise upward discovery
    pub fn root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.config.root_override {
            return Ok(root.clone());
        }

        let cwd = match &self.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir()?,
        };
        find_root(&cwd)
    }

    /// Location of the signal file for this repository
    pub fn signal_path(&self) -> Result<PathBuf> {
        Ok(signal_path(&self.root()?))
    }

    /// Signal a checkpoint and wait until the supervisor has consumed it
    #[instrument(skip(self))]
    pub async fn request(&self) -> Result<()> {
        if !self.config.supervised {
            debug!("Not supervised, skipping checkpoint");
            return Ok(());
        }

        let path = self.signal_path()?;
        write_signal(&path).await?;

        info!(path = %path.display(), "Checkpoint signaled, waiting for supervisor");
        let start = Instant::now();

        while matches!(tokio::fs::try_exists(&path).await, Ok(true)) {
            tokio::time::sleep(self.config.poll_interval).await;
        }

        info!(
            waited_ms = start.elapsed().as_millis() as u64,
            "Checkpoint acknowledged"
        );
        Ok(())
    }

    /// Blocking variant of [`request`](Self::request) for synchronous code.
    ///
    /// Uses std I/O and thread sleeps, so it is safe to call without a Tokio runtime.
    pub fn request_blocking(&self) -> Result<()> {
        if !self.config.supervised {
            debug!("Not supervised, skipping checkpoint");
            return Ok(());
        }

        let path = self.signal_path()?;
        write_signal_blocking(&path)?;

        info!(path = %path.display(), "Checkpoint signaled, waiting for supervisor");
        let start = Instant::now();

        while path.exists() {
            std::thread::sleep(self.config.poll_interval);
        }

        info!(
            waited_ms = start.elapsed().as_millis() as u64,
            "Checkpoint acknowledged"
        );
        Ok(())
    }
}

/// Signal a checkpoint using the process environment, blocking until acknowledged.
///
/// Returns immediately when the process is not supervised.
pub fn make_checkpoint() -> Result<()> {
    CheckpointSignal::from_env().request_blocking()
}

/// Create the empty signal file and force it to disk.
///
/// The sync must finish before polling starts, otherwise a supervisor
/// watching the directory may never see the file.
async fn write_signal(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = File::create(path).await?;
    file.write_all(b"").await?;
    file.flush().await?;
    file.sync_all().await?;

    debug!(path = %path.display(), "Signal file synced");
    Ok(())
}

fn write_signal_blocking(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::File::create(path)?;
    file.write_all(b"")?;
    file.flush()?;
    file.sync_all()?;

    debug!(path = %path.display(), "Signal file synced");
    Ok(())
}

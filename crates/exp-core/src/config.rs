//! API configuration types
//!
//! Behavior that the host process drives through environment variables is
//! captured here once, so components receive it explicitly at construction.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::CellValue;

/// Presence of this variable marks the process as supervised
pub const CHECKPOINT_ENV: &str = "DVC_CHECKPOINT";

/// Absolute repository root, overrides upward discovery
pub const ROOT_ENV: &str = "DVC_ROOT";

/// Repository marker / internal directory name
pub const REPO_DIR: &str = ".dvc";

/// Temp directory under the internal directory
pub const TMP_DIR: &str = "tmp";

/// Signal file name shared with the supervisor
pub const SIGNAL_FILE: &str = "DVC_CHECKPOINT";

/// Default delay between signal file existence checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Main API configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Checkpoint signal settings
    pub checkpoint: CheckpointConfig,

    /// Experiments query settings
    pub experiments: ExperimentsConfig,
}

impl ApiConfig {
    /// Build from the real process environment
    pub fn from_env() -> Self {
        Self {
            checkpoint: CheckpointConfig::from_env(),
            experiments: ExperimentsConfig::default(),
        }
    }
}

/// Checkpoint signal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Whether a supervisor is waiting on checkpoint signals
    pub supervised: bool,

    /// Repository root supplied by the supervisor
    pub root_override: Option<PathBuf>,

    /// Delay between existence checks while waiting
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            supervised: false,
            root_override: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl CheckpointConfig {
    /// Read supervision flag and root override from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Read supervision flag and root override through `lookup`.
    ///
    /// The flag is presence-only; its value is ignored. An empty root override
    /// counts as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let supervised = lookup(CHECKPOINT_ENV).is_some();
        let root_override = lookup(ROOT_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        Self {
            supervised,
            root_override,
            ..Default::default()
        }
    }

    /// Supervised config rooted at `root`
    pub fn supervised_at(root: impl Into<PathBuf>) -> Self {
        Self {
            supervised: true,
            root_override: Some(root.into()),
            ..Default::default()
        }
    }

    /// Override the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Experiments query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentsConfig {
    /// Repository location used when a query names none
    pub repo_location: Option<String>,

    /// Value for cells missing from a record during tabulation
    pub fill_value: CellValue,
}

impl Default for ExperimentsConfig {
    fn default() -> Self {
        Self {
            repo_location: None,
            fill_value: CellValue::Null,
        }
    }
}

/// Duration serialization as integer milliseconds
mod duration_millis {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

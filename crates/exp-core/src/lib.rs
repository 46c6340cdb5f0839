//! Experiment Core - Foundation for the experiment tracking API
//!
//! Provides shared types, error handling, configuration and repository
//! root discovery for the checkpoint signal client and the experiments
//! query facade.

pub mod config;
pub mod error;
pub mod logging;
pub mod repo_root;
pub mod types;

pub use config::{ApiConfig, CheckpointConfig, ExperimentsConfig};
pub use error::{Error, Result};
pub use repo_root::{find_root, signal_path};
pub use types::*;

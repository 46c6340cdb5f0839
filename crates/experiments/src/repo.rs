//! Repository context interfaces
//!
//! Defines the interface the facade consumes: an opener producing repository
//! contexts, and each context's experiments subsystem.

use std::ops::Deref;
use std::path::Path;

use async_trait::async_trait;
use exp_core::{CommitLimit, ExperimentRecord, Result, Rev};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Options for saving the workspace as a new experiment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOptions {
    /// Experiment name; generated when unset
    pub name: Option<String>,

    /// Overwrite an existing experiment with the same name
    pub force: bool,

    /// Untracked paths to include in the experiment
    pub include_untracked: Vec<String>,
}

impl SaveOptions {
    /// Save with a generated name
    pub fn new() -> Self {
        Self::default()
    }

    /// Save under `name`
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Set the force flag
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Include an untracked path
    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.include_untracked.push(path.into());
        self
    }
}

/// Options forwarded unchanged to the experiments subsystem's show
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowOptions {
    /// Baseline revisions; empty means the checked-out HEAD
    pub revisions: Vec<Rev>,

    /// First-parent commits to walk back from each baseline
    pub num: CommitLimit,

    /// Hide queued experiments
    pub hide_queued: bool,

    /// Hide failed experiments
    pub hide_failed: bool,

    /// Show commit shas instead of branch or tag names
    pub sha_only: bool,

    /// Only include params that are stage dependencies
    pub param_deps_only: bool,

    /// Recollect everything instead of reusing cached results
    pub force_reload: bool,
}

/// Experiments subsystem of an open repository
#[async_trait]
pub trait Experiments: Send + Sync {
    /// Save the workspace as a new experiment, returning its revision
    ///
    /// # Errors
    /// Returns `ExperimentExists` if the name is taken and `force` is false
    async fn save(&self, options: &SaveOptions) -> Result<Rev>;

    /// Collect experiment records, one per baseline commit or experiment
    async fn show(&self, options: &ShowOptions) -> Result<Vec<ExperimentRecord>>;
}

/// An open repository context
pub trait Repository: Send + Sync {
    /// Repository root directory
    fn root(&self) -> &Path;

    /// Experiments subsystem
    fn experiments(&self) -> &dyn Experiments;

    /// Release resources held by this context
    fn close(&mut self);
}

/// Opens repository contexts by location
#[async_trait]
pub trait RepoOpener: Send + Sync {
    /// Open the repository at `location`, or the current project when `None`
    async fn open(&self, location: Option<&str>) -> Result<Box<dyn Repository>>;
}

/// Scoped repository context: closed exactly once when the guard goes away
pub struct RepoGuard {
    repo: Box<dyn Repository>,
}

impl RepoGuard {
    /// Wrap an already open repository
    pub fn new(repo: Box<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Open a repository through `opener` and guard it
    pub async fn open<O>(opener: &O, location: Option<&str>) -> Result<Self>
    where
        O: RepoOpener + ?Sized,
    {
        let repo = opener.open(location).await?;
        debug!(root = %repo.root().display(), "Repository opened");
        Ok(Self::new(repo))
    }

    /// Close the repository now
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for RepoGuard {
    type Target = dyn Repository;

    fn deref(&self) -> &Self::Target {
        self.repo.as_ref()
    }
}

impl Drop for RepoGuard {
    fn drop(&mut self) {
        self.repo.close();
        debug!(root = %self.repo.root().display(), "Repository closed");
    }
}

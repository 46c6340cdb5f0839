//! Experiments facade: save and query through a scoped repository context

use exp_core::{CommitLimit, ExperimentRecord, ExperimentsConfig, Result, Rev};
use tracing::{debug, info, instrument};

use crate::normalize::normalize;
use crate::repo::{RepoGuard, RepoOpener, SaveOptions, ShowOptions};
use crate::tabulate::tabulate;

/// Options for [`ExperimentsApi::query_experiments`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Local path, URL or SSH spec; the current project when unset
    pub repo_location: Option<String>,

    /// Options passed through to the experiments subsystem
    pub show: ShowOptions,
}

impl QueryOptions {
    /// Query HEAD of the current project, one commit deep
    pub fn new() -> Self {
        Self::default()
    }

    /// Query the repository at `location`
    pub fn repo(mut self, location: impl Into<String>) -> Self {
        self.repo_location = Some(location.into());
        self
    }

    /// Add a baseline revision
    pub fn revision(mut self, rev: impl Into<String>) -> Self {
        self.show.revisions.push(rev.into());
        self
    }

    /// Replace the baseline revisions
    pub fn revisions<I, S>(mut self, revs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.show.revisions = revs.into_iter().map(Into::into).collect();
        self
    }

    /// First-parent commits per baseline; negative walks all history
    pub fn num(mut self, num: i64) -> Self {
        self.show.num = CommitLimit::from_num(num);
        self
    }

    /// Hide queued experiments
    pub fn hide_queued(mut self, hide: bool) -> Self {
        self.show.hide_queued = hide;
        self
    }

    /// Hide failed experiments
    pub fn hide_failed(mut self, hide: bool) -> Self {
        self.show.hide_failed = hide;
        self
    }

    /// Show shas instead of branch/tag names
    pub fn sha(mut self, sha: bool) -> Self {
        self.show.sha_only = sha;
        self
    }

    /// Only params that are stage dependencies
    pub fn param_deps(mut self, param_deps: bool) -> Self {
        self.show.param_deps_only = param_deps;
        self
    }

    /// Ignore previously collected results
    pub fn force(mut self, force: bool) -> Self {
        self.show.force_reload = force;
        self
    }
}

/// Facade over a repository opener
pub struct ExperimentsApi<O> {
    /// Repository opener
    opener: O,

    /// Defaults for location and tabulation
    config: ExperimentsConfig,
}

impl<O: RepoOpener> ExperimentsApi<O> {
    /// Create a facade with default configuration
    pub fn new(opener: O) -> Self {
        Self::with_config(opener, ExperimentsConfig::default())
    }

    /// Create a facade with explicit configuration
    pub fn with_config(opener: O, config: ExperimentsConfig) -> Self {
        Self { opener, config }
    }

    /// Get the opener
    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Save the current workspace as a new experiment and return its revision
    ///
    /// # Errors
    /// Returns `ExperimentExists` if `options.name` is taken and `force` is false
    #[instrument(skip(self))]
    pub async fn save_experiment(&self, options: SaveOptions) -> Result<Rev> {
        let repo = RepoGuard::open(&self.opener, self.config.repo_location.as_deref()).await?;
        let rev = repo.experiments().save(&options).await?;
        info!(rev = %rev, "Saved experiment");
        Ok(rev)
    }

    /// Query experiments and return normalized rows with a uniform column set
    ///
    /// Rows keep the order produced by the experiments subsystem.
    #[instrument(skip(self))]
    pub async fn query_experiments(&self, options: QueryOptions) -> Result<Vec<ExperimentRecord>> {
        let location = options
            .repo_location
            .as_deref()
            .or(self.config.repo_location.as_deref());

        let repo = RepoGuard::open(&self.opener, location).await?;
        let records = repo.experiments().show(&options.show).await?;

        let table = tabulate(records, self.config.fill_value.clone());
        debug!(
            rows = table.len(),
            columns = table.columns().len(),
            "Tabulated experiments"
        );

        let rows = normalize(table.to_records());
        repo.release();
        Ok(rows)
    }
}

//! In-memory repository engine
//!
//! Models a linear first-parent history with named refs, a workspace of
//! params and metrics, and experiments attached to baseline commits.
//! Collection of completed experiments is cached per revision.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use exp_core::{
    CellValue, Error, ExperimentRecord, ExperimentStatus, Result, Rev, RichText,
};
use parking_lot::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::location::RepoLocation;
use crate::repo::{Experiments, RepoOpener, Repository, SaveOptions, ShowOptions};

/// Default branch created by [`MemoryRepository::init`]
const DEFAULT_BRANCH: &str = "main";

/// Minimum length of an abbreviated sha
const MIN_SHA_PREFIX: usize = 4;

/// Length of shas shown in tables
const SHORT_SHA: usize = 7;

/// Registry location used when no location is given
const DEFAULT_LOCATION: &str = ".";

/// A commit in the first-parent history
#[derive(Debug, Clone)]
struct Commit {
    sha: Rev,
    parent: Option<Rev>,
    message: String,
    params: BTreeMap<String, CellValue>,
    metrics: BTreeMap<String, f64>,
    created: DateTime<Utc>,
}

/// An experiment derived from a baseline commit
#[derive(Debug, Clone)]
struct ExperimentEntry {
    name: String,
    rev: Rev,
    baseline: Rev,
    status: ExperimentStatus,
    params: BTreeMap<String, CellValue>,
    metrics: BTreeMap<String, f64>,
    files: Vec<String>,
    created: DateTime<Utc>,
}

/// Uncommitted workspace state
#[derive(Debug, Clone, Default)]
struct Workspace {
    params: BTreeMap<String, CellValue>,
    metrics: BTreeMap<String, f64>,
    untracked: BTreeSet<String>,
}

/// Mutable repository state
#[derive(Debug, Default)]
struct RepoState {
    commits: HashMap<Rev, Commit>,
    refs: BTreeMap<String, Rev>,
    head: Option<Rev>,
    head_branch: Option<String>,
    workspace: Workspace,
    param_deps: BTreeSet<String>,
    experiments: Vec<ExperimentEntry>,
}

/// Params and metrics collected for one revision
#[derive(Debug, Clone)]
struct Collected {
    params: BTreeMap<String, CellValue>,
    metrics: BTreeMap<String, f64>,
}

struct Inner {
    root: PathBuf,
    state: RwLock<RepoState>,
    cache: DashMap<Rev, Collected>,
    collected_rows: AtomicUsize,
    open_handles: AtomicUsize,
}

/// In-memory repository; clones share the same state
#[derive(Clone)]
pub struct MemoryRepository {
    inner: Arc<Inner>,
}

impl MemoryRepository {
    /// Create an empty repository rooted at `root` on the default branch
    pub fn init(root: impl Into<PathBuf>) -> Self {
        let state = RepoState {
            head_branch: Some(DEFAULT_BRANCH.to_string()),
            ..Default::default()
        };

        Self {
            inner: Arc::new(Inner {
                root: root.into(),
                state: RwLock::new(state),
                cache: DashMap::new(),
                collected_rows: AtomicUsize::new(0),
                open_handles: AtomicUsize::new(0),
            }),
        }
    }

    /// Set a workspace param
    pub fn set_param(&self, key: impl Into<String>, value: impl Into<CellValue>) {
        self.inner
            .state
            .write()
            .workspace
            .params
            .insert(key.into(), value.into());
    }

    /// Set a workspace metric
    pub fn set_metric(&self, key: impl Into<String>, value: f64) {
        self.inner
            .state
            .write()
            .workspace
            .metrics
            .insert(key.into(), value);
    }

    /// Add an untracked path to the workspace
    pub fn add_untracked(&self, path: impl Into<String>) {
        self.inner.state.write().workspace.untracked.insert(path.into());
    }

    /// Declare which params are stage dependencies
    pub fn set_param_deps<I, S>(&self, params: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.state.write().param_deps = params.into_iter().map(Into::into).collect();
    }

    /// Commit the workspace on top of HEAD, advancing the checked-out branch
    pub fn commit(&self, message: impl Into<String>) -> Rev {
        let mut state = self.inner.state.write();
        let sha = new_sha();

        let commit = Commit {
            sha: sha.clone(),
            parent: state.head.clone(),
            message: message.into(),
            params: state.workspace.params.clone(),
            metrics: state.workspace.metrics.clone(),
            created: Utc::now(),
        };

        state.commits.insert(sha.clone(), commit);
        state.head = Some(sha.clone());
        if let Some(branch) = state.head_branch.clone() {
            state.refs.insert(branch, sha.clone());
        }

        debug!(sha = %sha, "Committed");
        sha
    }

    /// Point a branch or tag at a revision
    pub fn set_ref(&self, name: impl Into<String>, rev: &str) -> Result<()> {
        let mut state = self.inner.state.write();
        let sha = state.resolve(rev)?;
        state.refs.insert(name.into(), sha);
        Ok(())
    }

    /// Add an experiment with an explicit status on top of HEAD
    /// (e.g. queued or failed runs)
    pub fn record_experiment(
        &self,
        name: impl Into<String>,
        status: ExperimentStatus,
        params: BTreeMap<String, CellValue>,
        metrics: BTreeMap<String, f64>,
    ) -> Result<Rev> {
        let mut state = self.inner.state.write();
        let baseline = state.head_sha()?;
        let name = name.into();
        if state.experiments.iter().any(|e| e.name == name) {
            return Err(Error::ExperimentExists { name });
        }

        let rev = new_sha();
        state.experiments.push(ExperimentEntry {
            name,
            rev: rev.clone(),
            baseline,
            status,
            params,
            metrics,
            files: Vec::new(),
            created: Utc::now(),
        });
        Ok(rev)
    }

    /// Change the status of an experiment (e.g. a queued run finishing)
    pub fn set_status(&self, name: &str, status: ExperimentStatus) -> Result<()> {
        let mut state = self.inner.state.write();
        let entry = state
            .experiments
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| Error::RevisionNotFound {
                rev: name.to_string(),
            })?;
        entry.status = status;
        Ok(())
    }

    /// Names of all experiments
    pub fn experiment_names(&self) -> Vec<String> {
        self.inner
            .state
            .read()
            .experiments
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }

    /// Untracked paths included in an experiment
    pub fn experiment_files(&self, name: &str) -> Option<Vec<String>> {
        self.inner
            .state
            .read()
            .experiments
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.files.clone())
    }

    /// Number of revisions collected from scratch (cache misses)
    pub fn collected_rows(&self) -> usize {
        self.inner.collected_rows.load(Ordering::SeqCst)
    }

    /// Number of contexts currently open on this repository
    pub fn open_handles(&self) -> usize {
        self.inner.open_handles.load(Ordering::SeqCst)
    }

    /// Collect params and metrics for `rev`, reusing the cache when allowed
    fn collect(
        &self,
        rev: &str,
        params: &BTreeMap<String, CellValue>,
        metrics: &BTreeMap<String, f64>,
        cacheable: bool,
        force_reload: bool,
    ) -> Collected {
        if cacheable && !force_reload {
            if let Some(hit) = self.inner.cache.get(rev) {
                debug!(rev = %short(rev), "Using cached collection");
                return hit.clone();
            }
        }

        self.inner.collected_rows.fetch_add(1, Ordering::SeqCst);
        let collected = Collected {
            params: params.clone(),
            metrics: metrics.clone(),
        };

        if cacheable {
            self.inner.cache.insert(rev.to_string(), collected.clone());
        }
        collected
    }

    fn baseline_row(&self, state: &RepoState, commit: &Commit, options: &ShowOptions) -> ExperimentRecord {
        let collected = self.collect(
            &commit.sha,
            &commit.params,
            &commit.metrics,
            true,
            options.force_reload,
        );

        let rev = if options.sha_only {
            short(&commit.sha).to_string()
        } else {
            state
                .ref_name(&commit.sha)
                .unwrap_or_else(|| short(&commit.sha).to_string())
        };

        let mut row = ExperimentRecord::new();
        row.insert("Experiment".to_string(), CellValue::from(""));
        row.insert("rev".to_string(), CellValue::from(rev));
        row.insert("typ".to_string(), CellValue::from("baseline"));
        row.insert("Created".to_string(), CellValue::from(timestamp(&commit.created)));
        row.insert("message".to_string(), CellValue::from(commit.message.as_str()));
        render(&mut row, state, collected, options);
        row
    }

    fn experiment_row(
        &self,
        state: &RepoState,
        entry: &ExperimentEntry,
        options: &ShowOptions,
    ) -> ExperimentRecord {
        let collected = self.collect(
            &entry.rev,
            &entry.params,
            &entry.metrics,
            entry.status.is_complete(),
            options.force_reload,
        );

        let mut row = ExperimentRecord::new();
        row.insert("Experiment".to_string(), CellValue::from(entry.name.as_str()));
        row.insert("rev".to_string(), CellValue::from(short(&entry.rev)));
        row.insert("typ".to_string(), CellValue::from("experiment"));
        row.insert("Created".to_string(), CellValue::from(timestamp(&entry.created)));
        row.insert("parent".to_string(), CellValue::from(short(&entry.baseline)));
        row.insert("State".to_string(), CellValue::from(entry.status.to_string()));
        render(&mut row, state, collected, options);
        row
    }
}

impl std::fmt::Debug for MemoryRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRepository")
            .field("root", &self.inner.root)
            .finish()
    }
}

impl RepoState {
    fn head_sha(&self) -> Result<Rev> {
        self.head.clone().ok_or_else(|| Error::RevisionNotFound {
            rev: "HEAD".to_string(),
        })
    }

    /// Resolve HEAD, a ref name, a full sha or a unique sha prefix
    fn resolve(&self, rev: &str) -> Result<Rev> {
        if rev == "HEAD" {
            return self.head_sha();
        }
        if let Some(sha) = self.refs.get(rev) {
            return Ok(sha.clone());
        }
        if self.commits.contains_key(rev) {
            return Ok(rev.to_string());
        }

        if rev.len() >= MIN_SHA_PREFIX && rev.chars().all(|c| c.is_ascii_hexdigit()) {
            let mut candidates: Vec<Rev> = self
                .commits
                .keys()
                .filter(|sha| sha.starts_with(rev))
                .cloned()
                .collect();
            candidates.sort();

            match candidates.len() {
                0 => {}
                1 => return Ok(candidates.remove(0)),
                _ => {
                    return Err(Error::AmbiguousRevision {
                        rev: rev.to_string(),
                        candidates,
                    })
                }
            }
        }

        Err(Error::RevisionNotFound {
            rev: rev.to_string(),
        })
    }

    /// Branch or tag pointing at `sha`, preferring the checked-out branch
    fn ref_name(&self, sha: &str) -> Option<String> {
        if let Some(branch) = &self.head_branch {
            if self.refs.get(branch).map(String::as_str) == Some(sha) {
                return Some(branch.clone());
            }
        }
        self.refs
            .iter()
            .find(|(_, target)| target.as_str() == sha)
            .map(|(name, _)| name.clone())
    }

    fn is_visible(&self, entry: &ExperimentEntry, options: &ShowOptions) -> bool {
        match entry.status {
            ExperimentStatus::Queued => !options.hide_queued,
            ExperimentStatus::Failed => !options.hide_failed,
            ExperimentStatus::Running | ExperimentStatus::Success => true,
        }
    }
}

#[async_trait]
impl Experiments for MemoryRepository {
    #[instrument(skip(self))]
    async fn save(&self, options: &SaveOptions) -> Result<Rev> {
        let mut state = self.inner.state.write();
        let baseline = state.head_sha()?;

        let name = match &options.name {
            Some(name) => name.clone(),
            None => loop {
                let candidate = generate_name();
                if !state.experiments.iter().any(|e| e.name == candidate) {
                    break candidate;
                }
            },
        };

        if let Some(pos) = state.experiments.iter().position(|e| e.name == name) {
            if !options.force {
                return Err(Error::ExperimentExists { name });
            }
            let replaced = state.experiments.remove(pos);
            self.inner.cache.remove(&replaced.rev);
            debug!(name = %name, rev = %short(&replaced.rev), "Overwriting experiment");
        }

        for path in &options.include_untracked {
            state.workspace.untracked.remove(path);
        }

        let rev = new_sha();
        let entry = ExperimentEntry {
            name: name.clone(),
            rev: rev.clone(),
            baseline,
            status: ExperimentStatus::Success,
            params: state.workspace.params.clone(),
            metrics: state.workspace.metrics.clone(),
            files: options.include_untracked.clone(),
            created: Utc::now(),
        };
        state.experiments.push(entry);

        info!(name = %name, rev = %short(&rev), "Experiment saved");
        Ok(rev)
    }

    #[instrument(skip(self))]
    async fn show(&self, options: &ShowOptions) -> Result<Vec<ExperimentRecord>> {
        let state = self.inner.state.read();

        let baselines = if options.revisions.is_empty() {
            vec![state.head_sha()?]
        } else {
            options
                .revisions
                .iter()
                .map(|rev| state.resolve(rev))
                .collect::<Result<Vec<_>>>()?
        };

        let mut rows = Vec::new();
        let mut seen = HashSet::new();

        for baseline in baselines {
            let mut cursor = Some(baseline);
            let mut walked = 0usize;

            while let Some(sha) = cursor {
                if options.num.reached(walked) {
                    break;
                }
                let commit = state.commits.get(&sha).ok_or_else(|| Error::Internal {
                    message: format!("dangling commit {}", sha),
                })?;
                walked += 1;
                cursor = commit.parent.clone();

                if !seen.insert(sha.clone()) {
                    continue;
                }

                rows.push(self.baseline_row(&state, commit, options));
                for entry in state.experiments.iter().filter(|e| e.baseline == sha) {
                    if state.is_visible(entry, options) {
                        rows.push(self.experiment_row(&state, entry, options));
                    }
                }
            }
        }

        debug!(rows = rows.len(), "Collected experiment rows");
        Ok(rows)
    }
}

impl Repository for MemoryRepository {
    fn root(&self) -> &Path {
        &self.inner.root
    }

    fn experiments(&self) -> &dyn Experiments {
        self
    }

    fn close(&mut self) {
        self.inner.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Opens registered in-memory repositories by location
#[derive(Debug, Default)]
pub struct MemoryRepoRegistry {
    repos: DashMap<String, MemoryRepository>,
}

impl MemoryRepoRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose current project is `repo`
    pub fn with_default(repo: MemoryRepository) -> Self {
        let registry = Self::new();
        registry.register(DEFAULT_LOCATION, repo);
        registry
    }

    /// Make `repo` reachable at `location`
    pub fn register(&self, location: impl Into<String>, repo: MemoryRepository) {
        self.repos.insert(location.into(), repo);
    }
}

#[async_trait]
impl RepoOpener for MemoryRepoRegistry {
    async fn open(&self, location: Option<&str>) -> Result<Box<dyn Repository>> {
        let key = match location {
            Some(location) => {
                let parsed = RepoLocation::parse(location)?;
                debug!(location = %parsed, remote = parsed.is_remote(), "Opening repository");
                location.trim().to_string()
            }
            None => DEFAULT_LOCATION.to_string(),
        };

        let repo = self
            .repos
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::RepositoryOpen {
                location: key.clone(),
                message: "not a repository".to_string(),
            })?;

        repo.inner.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(repo))
    }
}

/// Add params and metrics cells as rich text
fn render(
    row: &mut ExperimentRecord,
    state: &RepoState,
    collected: Collected,
    options: &ShowOptions,
) {
    for (key, value) in collected.metrics {
        row.insert(key, CellValue::Rich(RichText::styled(value.to_string(), "bold")));
    }
    for (key, value) in collected.params {
        if options.param_deps_only && !state.param_deps.contains(&key) {
            continue;
        }
        row.insert(key, CellValue::Rich(RichText::plain(value.to_string())));
    }
}

fn new_sha() -> Rev {
    let a = Uuid::new_v4().simple().to_string();
    let b = Uuid::new_v4().simple().to_string();
    format!("{}{}", a, &b[..8])
}

fn generate_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("exp-{}", &id[..8])
}

fn short(sha: &str) -> &str {
    &sha[..sha.len().min(SHORT_SHA)]
}

fn timestamp(created: &DateTime<Utc>) -> String {
    created.format("%Y-%m-%dT%H:%M:%S").to_string()
}

//! Experiments - save and query experiments through a repository context
//!
//! Provides:
//! - **Repository interfaces**: opener, repository and experiments traits with a
//!   scoped [`RepoGuard`] that always closes the repository
//! - **In-memory engine**: [`MemoryRepository`] with cached collection of
//!   completed experiments
//! - **Tabulation**: uniform tables from heterogeneous records
//! - **Normalization**: rich text cells reduced to numbers or plain strings
//! - **Facade**: [`ExperimentsApi`] tying it all together
//!
//! # Example
//!
//! ```rust
//! use experiments::{ExperimentsApi, MemoryRepoRegistry, MemoryRepository, QueryOptions};
//!
//! # async fn example() -> exp_core::Result<()> {
//! let repo = MemoryRepository::init("/work/project");
//! repo.set_metric("acc", 0.825);
//! repo.commit("baseline");
//!
//! let api = ExperimentsApi::new(MemoryRepoRegistry::with_default(repo));
//! let rows = api.query_experiments(QueryOptions::new()).await?;
//! assert_eq!(rows[0]["acc"].as_f64(), Some(0.825));
//! # Ok(())
//! # }
//! ```

mod api;
mod location;
mod memory;
mod normalize;
mod repo;
mod tabulate;

pub use api::{ExperimentsApi, QueryOptions};
pub use location::RepoLocation;
pub use memory::{MemoryRepoRegistry, MemoryRepository};
pub use normalize::{normalize, normalize_record, normalize_value};
pub use repo::{Experiments, RepoGuard, RepoOpener, Repository, SaveOptions, ShowOptions};
pub use tabulate::{tabulate, TabulatedResult};

// Re-export types from exp-core for convenience
pub use exp_core::types::{CellValue, CommitLimit, ExperimentRecord, ExperimentStatus, RichText, Rev};

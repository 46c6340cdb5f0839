//! Repository root discovery

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{REPO_DIR, SIGNAL_FILE, TMP_DIR};
use crate::{Error, Result};

/// Walk `start` and its ancestors looking for the repository marker directory
pub fn find_root(start: &Path) -> Result<PathBuf> {
    for dir in start.ancestors() {
        if dir.join(REPO_DIR).is_dir() {
            debug!(root = %dir.display(), "Found repository root");
            return Ok(dir.to_path_buf());
        }
    }

    Err(Error::RepositoryNotFound {
        path: start.display().to_string(),
    })
}

/// Signal file location for a repository root
pub fn signal_path(root: &Path) -> PathBuf {
    root.join(REPO_DIR).join(TMP_DIR).join(SIGNAL_FILE)
}

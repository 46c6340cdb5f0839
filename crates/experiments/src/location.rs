//! Repository location parsing
//!
//! Locations are local paths, URLs, or scp-like SSH specs
//! (`[user@]server:project.git`).

use std::fmt;
use std::path::PathBuf;

use exp_core::{Error, Result};

const URL_SCHEMES: &[&str] = &["http", "https", "ssh", "git", "file"];

/// Where a repository lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoLocation {
    /// Filesystem path
    Local(PathBuf),

    /// URL with an explicit scheme
    Url(String),

    /// scp-like SSH spec
    Scp {
        user: Option<String>,
        host: String,
        path: String,
    },
}

impl RepoLocation {
    /// Classify a location string
    pub fn parse(location: &str) -> Result<Self> {
        let location = location.trim();
        if location.is_empty() {
            return Err(open_error(location, "empty repository location"));
        }

        if let Some((scheme, rest)) = location.split_once("://") {
            if !URL_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()) {
                return Err(open_error(location, &format!("unsupported scheme '{}'", scheme)));
            }
            if rest.is_empty() {
                return Err(open_error(location, "URL has no host or path"));
            }
            return Ok(RepoLocation::Url(location.to_string()));
        }

        if let Some((authority, path)) = location.split_once(':') {
            // "C:\..." style drive letters are paths, not hosts
            let is_drive = authority.len() == 1 && authority.chars().all(|c| c.is_ascii_alphabetic());
            if !is_drive && !authority.contains('/') && !authority.contains('\\') {
                let (user, host) = match authority.split_once('@') {
                    Some((user, host)) => (Some(user.to_string()), host.to_string()),
                    None => (None, authority.to_string()),
                };
                if host.is_empty() || path.is_empty() {
                    return Err(open_error(location, "incomplete SSH location"));
                }
                return Ok(RepoLocation::Scp {
                    user,
                    host,
                    path: path.to_string(),
                });
            }
        }

        Ok(RepoLocation::Local(PathBuf::from(location)))
    }

    /// Whether the repository must be fetched over the network
    pub fn is_remote(&self) -> bool {
        match self {
            RepoLocation::Local(_) => false,
            RepoLocation::Url(url) => !url.to_ascii_lowercase().starts_with("file://"),
            RepoLocation::Scp { .. } => true,
        }
    }
}

impl fmt::Display for RepoLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoLocation::Local(path) => write!(f, "{}", path.display()),
            RepoLocation::Url(url) => f.write_str(url),
            RepoLocation::Scp {
                user: Some(user),
                host,
                path,
            } => write!(f, "{}@{}:{}", user, host, path),
            RepoLocation::Scp {
                user: None,
                host,
                path,
            } => write!(f, "{}:{}", host, path),
        }
    }
}

fn open_error(location: &str, message: &str) -> Error {
    Error::RepositoryOpen {
        location: location.to_string(),
        message: message.to_string(),
    }
}

//! Plugin repository descriptors and the configured repository set

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A named plugin repository (name + base URL)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRepo {
    pub name: String,
    pub url: String,
}

impl PluginRepo {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Case-insensitive name comparison
    pub fn has_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }

    /// URL comparison modulo case and trailing slashes
    pub fn has_url(&self, url: &str) -> bool {
        normalize_url(&self.url) == normalize_url(url)
    }
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// Read/write access to the configured repository set.
///
/// `list_repositories` returns an owned snapshot; callers never hold a
/// reference into the store while it may be mutated.
pub trait RepoStore {
    fn list_repositories(&self) -> Vec<PluginRepo>;

    /// Append a repository. Fails if the name or URL is already taken.
    fn add_repository(&mut self, repo: PluginRepo) -> Result<()>;

    /// Remove a repository by (case-insensitive) name, returning it.
    fn remove_repository(&mut self, name: &str) -> Result<PluginRepo>;
}

/// Check a candidate against the configured set.
///
/// Name clashes are reported before URL clashes, in configured order.
pub fn ensure_unique(repos: &[PluginRepo], name: &str, url: &str) -> Result<()> {
    for repo in repos {
        if repo.has_name(name) {
            return Err(Error::RepoNameTaken(name.trim().to_string()));
        }
        if repo.has_url(url) {
            return Err(Error::RepoUrlTaken {
                url: repo.url.clone(),
                name: repo.name.clone(),
            });
        }
    }
    Ok(())
}

/// Find a repository by case-insensitive name
pub fn find_repo<'a>(repos: &'a [PluginRepo], name: &str) -> Option<&'a PluginRepo> {
    repos.iter().find(|r| r.has_name(name))
}

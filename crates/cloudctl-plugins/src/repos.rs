//! Plugin repository registration and browsing

use cloudctl_core::repos::{PluginRepo, RepoStore, ensure_unique, find_repo};
use tracing::info;

use crate::index::{PluginIndex, RepoIndexClient, list_url};
use crate::{PluginError, PluginResult};

/// Register a repository after checking it serves a valid plugin index.
///
/// Duplicates and malformed URLs are rejected before any network I/O. The
/// store is only touched once the index fetch succeeds.
pub async fn add_plugin_repo<S: RepoStore>(
    client: &RepoIndexClient,
    store: &mut S,
    name: &str,
    url: &str,
) -> PluginResult<PluginRepo> {
    let name = name.trim();
    let url = url.trim();
    if name.is_empty() || url.is_empty() {
        return Err(PluginError::Usage(
            "Requires REPO_NAME and URL as arguments".to_string(),
        ));
    }

    ensure_unique(&store.list_repositories(), name, url)?;
    list_url(url)?;

    client.fetch_index(url).await?;

    let repo = PluginRepo::new(name, url);
    store.add_repository(repo.clone())?;
    info!(repo = %repo.name, url = %repo.url, "Plugin repo added");
    Ok(repo)
}

/// One repository's index, or why it could not be read
#[derive(Debug)]
pub struct RepoListing {
    pub repo: PluginRepo,
    pub index: PluginResult<PluginIndex>,
}

/// Fetch the indexes of every configured repo (or just `only`), in order.
///
/// Per-repository failures are kept in the listing rather than aborting it.
pub async fn list_repo_plugins(
    client: &RepoIndexClient,
    repos: &[PluginRepo],
    only: Option<&str>,
) -> PluginResult<Vec<RepoListing>> {
    let selected: Vec<PluginRepo> = match only {
        Some(name) => vec![
            find_repo(repos, name)
                .cloned()
                .ok_or_else(|| PluginError::UnknownRepo(name.to_string()))?,
        ],
        None => repos.to_vec(),
    };

    let mut listings = Vec::with_capacity(selected.len());
    for repo in selected {
        let index = client.fetch_index(&repo.url).await;
        listings.push(RepoListing { repo, index });
    }
    Ok(listings)
}

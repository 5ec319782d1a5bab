//! Indexed install: resolve a plugin name through repository indexes

use std::path::Path;

use cloudctl_core::repos::{PluginRepo, find_repo};
use tracing::{info, warn};

use super::{Fetched, RepoSelector};
use crate::downloader::{DownloadedArtifact, Downloader};
use crate::index::{RepoIndexClient, RepoLookupMiss, ResolvedArtifact};
use crate::{PluginError, PluginResult, RepoOutcome, checksum};

pub(crate) struct IndexedStrategy<'a> {
    index_client: &'a RepoIndexClient,
    downloader: &'a Downloader,
    repos: &'a [PluginRepo],
}

impl<'a> IndexedStrategy<'a> {
    pub fn new(
        index_client: &'a RepoIndexClient,
        downloader: &'a Downloader,
        repos: &'a [PluginRepo],
    ) -> Self {
        Self {
            index_client,
            downloader,
            repos,
        }
    }

    pub async fn fetch(
        &self,
        plugin: &str,
        selector: &RepoSelector,
        platform: &str,
        staging: &Path,
    ) -> PluginResult<Fetched> {
        match selector {
            RepoSelector::Named(name) => self.from_named(plugin, name, platform, staging).await,
            RepoSelector::AnyConfigured => self.from_any(plugin, platform, staging).await,
        }
    }

    async fn from_named(
        &self,
        plugin: &str,
        repo_name: &str,
        platform: &str,
        staging: &Path,
    ) -> PluginResult<Fetched> {
        let repo = find_repo(self.repos, repo_name)
            .ok_or_else(|| PluginError::UnknownRepo(repo_name.to_string()))?;

        let index = self.index_client.fetch_index(&repo.url).await?;
        let resolved = index
            .resolve(plugin, platform)
            .map_err(|miss| lookup_error(miss, plugin, &repo.name, platform))?;

        let (artifact, verified) = self.acquire(repo, &resolved, staging).await?;
        Ok(Fetched {
            artifact,
            plugin: Some(resolved),
            repo: Some(repo.name.clone()),
            skipped: Vec::new(),
            verified,
        })
    }

    /// Walk repositories in configured order; the first full success wins.
    ///
    /// Index failures, misses and download failures are recorded and the
    /// walk continues. A checksum mismatch ends it.
    async fn from_any(&self, plugin: &str, platform: &str, staging: &Path) -> PluginResult<Fetched> {
        let mut skipped = Vec::new();

        for repo in self.repos {
            let index = match self.index_client.fetch_index(&repo.url).await {
                Ok(index) => index,
                Err(e) => {
                    warn!(repo = %repo.name, error = %e, "Skipping plugin repo");
                    skipped.push(outcome(repo, e.to_string()));
                    continue;
                }
            };

            let resolved = match index.resolve(plugin, platform) {
                Ok(resolved) => resolved,
                Err(miss) => {
                    info!(repo = %repo.name, plugin, %miss, "Plugin not available in repo");
                    skipped.push(outcome(repo, miss.to_string()));
                    continue;
                }
            };

            match self.acquire(repo, &resolved, staging).await {
                Ok((artifact, verified)) => {
                    return Ok(Fetched {
                        artifact,
                        plugin: Some(resolved),
                        repo: Some(repo.name.clone()),
                        skipped,
                        verified,
                    });
                }
                Err(e @ PluginError::DigestMismatch { .. }) => return Err(e),
                Err(e) => {
                    warn!(repo = %repo.name, error = %e, "Download failed, trying next repo");
                    skipped.push(outcome(repo, e.to_string()));
                }
            }
        }

        Err(PluginError::NotFoundInAnyRepository {
            name: plugin.to_string(),
            outcomes: skipped,
        })
    }

    /// Download the resolved artifact and verify it when a checksum is published
    async fn acquire(
        &self,
        repo: &PluginRepo,
        resolved: &ResolvedArtifact,
        staging: &Path,
    ) -> PluginResult<(DownloadedArtifact, bool)> {
        let artifact = self.downloader.download(&resolved.url, staging).await?;

        let Some(expected) = resolved.checksum.as_deref() else {
            warn!(
                repo = %repo.name,
                plugin = %resolved.name,
                "Repo publishes no checksum for this plugin; installing without integrity verification"
            );
            return Ok((artifact, false));
        };

        if let Err(e) = checksum::verify(&artifact.path, expected).await {
            return Err(reject(&artifact, e).await);
        }
        Ok((artifact, true))
    }
}

/// Remove an artifact that failed verification; the verification error wins
async fn reject(artifact: &DownloadedArtifact, err: PluginError) -> PluginError {
    if let Err(discard) = artifact.discard().await {
        warn!(
            path = %artifact.path.display(),
            error = %discard,
            "Failed to remove artifact that failed verification"
        );
    }
    err
}

fn outcome(repo: &PluginRepo, reason: String) -> RepoOutcome {
    RepoOutcome {
        repo: repo.name.clone(),
        reason,
    }
}

fn lookup_error(miss: RepoLookupMiss, plugin: &str, repo: &str, platform: &str) -> PluginError {
    match miss {
        RepoLookupMiss::PluginNotFound => PluginError::PluginNotFound {
            name: plugin.to_string(),
            repo: repo.to_string(),
        },
        RepoLookupMiss::PlatformUnsupported => PluginError::PlatformUnsupported {
            name: plugin.to_string(),
            repo: repo.to_string(),
            platform: platform.to_string(),
        },
    }
}

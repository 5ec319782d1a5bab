//! Plugin installer facade
//!
//! Picks a strategy from the request, runs it inside a fresh staging
//! directory and hands back a [`StagedPlugin`] for the host to register.
//! The staging directory is a [`TempDir`]: every error return, and every
//! cancelled install, drops it and with it anything downloaded so far.

mod direct;
mod indexed;

use std::path::{Path, PathBuf};

use cloudctl_core::config::Config;
use cloudctl_core::repos::{PluginRepo, RepoStore};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::downloader::{DownloadedArtifact, Downloader};
use crate::http::build_client;
use crate::index::{RepoIndexClient, ResolvedArtifact};
use crate::{PluginError, PluginResult, RepoOutcome, platform};

use direct::DirectStrategy;
use indexed::IndexedStrategy;

/// Which repositories an indexed install may consult
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoSelector {
    Named(String),
    AnyConfigured,
}

/// What to install
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallSource {
    /// Local file path or absolute http(s) URL
    Direct(String),
    /// Plugin name looked up in repository indexes
    Indexed { plugin: String, repos: RepoSelector },
}

/// An install invocation. Immutable once built.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    source: InstallSource,
    platform: String,
}

impl InstallRequest {
    /// Build a request for the host platform
    pub fn new(source: InstallSource) -> PluginResult<Self> {
        Self::for_platform(source, platform::current())
    }

    pub fn for_platform(source: InstallSource, platform: impl Into<String>) -> PluginResult<Self> {
        let blank = match &source {
            InstallSource::Direct(src) => src.trim().is_empty(),
            InstallSource::Indexed { plugin, repos } => {
                plugin.trim().is_empty()
                    || matches!(repos, RepoSelector::Named(name) if name.trim().is_empty())
            }
        };
        if blank {
            return Err(PluginError::Usage(
                "Requires a plugin path, URL or name".to_string(),
            ));
        }
        Ok(Self {
            source,
            platform: platform.into(),
        })
    }

    /// Build from CLI-style arguments where an empty repo name means "direct"
    pub fn from_args(source: &str, repo_name: &str) -> PluginResult<Self> {
        let source = if repo_name.trim().is_empty() {
            InstallSource::Direct(source.to_string())
        } else {
            InstallSource::Indexed {
                plugin: source.to_string(),
                repos: RepoSelector::Named(repo_name.trim().to_string()),
            }
        };
        Self::new(source)
    }

    pub fn source(&self) -> &InstallSource {
        &self.source
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }
}

/// What a strategy produced inside the staging directory
#[derive(Debug)]
pub(crate) struct Fetched {
    pub artifact: DownloadedArtifact,
    pub plugin: Option<ResolvedArtifact>,
    pub repo: Option<String>,
    pub skipped: Vec<RepoOutcome>,
    pub verified: bool,
}

/// A validated artifact waiting in its staging directory.
///
/// Dropping it without registering discards the artifact.
#[derive(Debug)]
pub struct StagedPlugin {
    staging: TempDir,
    pub artifact: DownloadedArtifact,
    /// Index entry the artifact came from (indexed installs only)
    pub plugin: Option<ResolvedArtifact>,
    /// Repository the artifact came from (indexed installs only)
    pub repo: Option<String>,
    /// Repositories passed over before the winning one
    pub skipped: Vec<RepoOutcome>,
    /// False when no checksum was published and verification was skipped
    pub verified: bool,
}

impl StagedPlugin {
    pub fn path(&self) -> &Path {
        &self.artifact.path
    }

    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }

    /// Name the plugin is registered under
    pub fn install_name(&self) -> String {
        match &self.plugin {
            Some(plugin) => plugin.name.clone(),
            None => self
                .artifact
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

pub struct PluginInstaller {
    downloader: Downloader,
    index_client: RepoIndexClient,
    repos: Vec<PluginRepo>,
    staging_root: PathBuf,
}

impl PluginInstaller {
    pub fn new(
        downloader: Downloader,
        index_client: RepoIndexClient,
        repos: Vec<PluginRepo>,
        staging_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            downloader,
            index_client,
            repos,
            staging_root: staging_root.into(),
        }
    }

    /// Wire an installer from configuration, snapshotting the repository set.
    ///
    /// Staging happens under `<plugins dir>/.staging` so that promotion is a
    /// rename on the same filesystem.
    pub fn from_config(config: &Config) -> PluginResult<Self> {
        let client = build_client(config.http.max_redirects)?;
        let plugins_dir = config
            .plugins_dir()
            .map_err(|e| cloudctl_core::Error::ConfigError(e.to_string()))?;

        Ok(Self::new(
            Downloader::new(client.clone(), config.http.download_timeout()),
            RepoIndexClient::new(client, config.http.index_timeout()),
            config.list_repositories(),
            plugins_dir.join(".staging"),
        ))
    }

    /// Run the strategy selected by the request
    pub async fn install(&self, request: &InstallRequest) -> PluginResult<StagedPlugin> {
        let staging = self.create_staging().await?;
        debug!(staging = %staging.path().display(), "Created staging directory");

        let fetched = match request.source() {
            InstallSource::Direct(source) => {
                DirectStrategy::new(&self.downloader)
                    .fetch(source, staging.path())
                    .await
            }
            InstallSource::Indexed { plugin, repos } => {
                IndexedStrategy::new(&self.index_client, &self.downloader, &self.repos)
                    .fetch(plugin, repos, request.platform(), staging.path())
                    .await
            }
        };

        // On error `staging` is dropped here, removing the directory.
        let fetched = fetched?;

        info!(
            path = %fetched.artifact.path.display(),
            bytes = fetched.artifact.bytes,
            verified = fetched.verified,
            "Plugin staged"
        );

        Ok(StagedPlugin {
            staging,
            artifact: fetched.artifact,
            plugin: fetched.plugin,
            repo: fetched.repo,
            skipped: fetched.skipped,
            verified: fetched.verified,
        })
    }

    /// Like [`install`](Self::install), aborting when `cancel` fires.
    ///
    /// The in-flight request is dropped, which removes partial files and the
    /// staging directory before `Cancelled` is returned.
    pub async fn install_with_cancel(
        &self,
        request: &InstallRequest,
        cancel: &CancellationToken,
    ) -> PluginResult<StagedPlugin> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PluginError::Cancelled),
            result = self.install(request) => result,
        }
    }

    async fn create_staging(&self) -> PluginResult<TempDir> {
        tokio::fs::create_dir_all(&self.staging_root)
            .await
            .map_err(|e| {
                PluginError::io(
                    format!("Failed to create {}", self.staging_root.display()),
                    e,
                )
            })?;

        tempfile::Builder::new()
            .prefix("install-")
            .tempdir_in(&self.staging_root)
            .map_err(|e| {
                PluginError::io(
                    format!("Failed to create staging directory in {}", self.staging_root.display()),
                    e,
                )
            })
    }
}

#[cfg(test)]
mod tests;

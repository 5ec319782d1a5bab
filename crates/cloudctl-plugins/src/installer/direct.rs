//! Direct install: a local file or an absolute http(s) URL

use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use super::Fetched;
use crate::downloader::{DownloadedArtifact, Downloader};
use crate::{PluginError, PluginResult};

pub(crate) struct DirectStrategy<'a> {
    downloader: &'a Downloader,
}

impl<'a> DirectStrategy<'a> {
    pub fn new(downloader: &'a Downloader) -> Self {
        Self { downloader }
    }

    pub async fn fetch(&self, source: &str, staging: &Path) -> PluginResult<Fetched> {
        let artifact = if is_remote(source) {
            self.downloader.download(source, staging).await?
        } else {
            copy_local(Path::new(source.trim()), staging).await?
        };

        Ok(Fetched {
            artifact,
            plugin: None,
            repo: None,
            skipped: Vec::new(),
            // nothing to verify against
            verified: false,
        })
    }
}

fn is_remote(source: &str) -> bool {
    Url::parse(source.trim())
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Copy a local plugin into staging so promotion never moves the user's file
async fn copy_local(source: &Path, staging: &Path) -> PluginResult<DownloadedArtifact> {
    let metadata = tokio::fs::metadata(source)
        .await
        .map_err(|_| PluginError::SourceNotFound(source.to_path_buf()))?;
    if !metadata.is_file() {
        return Err(PluginError::SourceNotFound(source.to_path_buf()));
    }

    let file_name = source
        .file_name()
        .ok_or_else(|| PluginError::SourceNotFound(source.to_path_buf()))?;
    let target: PathBuf = staging.join(file_name);

    let bytes = tokio::fs::copy(source, &target).await.map_err(|e| {
        PluginError::io(
            format!("Failed to copy {} into staging", source.display()),
            e,
        )
    })?;
    debug!(source = %source.display(), bytes, "Copied local plugin");

    Ok(DownloadedArtifact {
        path: target,
        bytes,
        source_url: None,
    })
}

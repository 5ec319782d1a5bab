//! Streaming artifact downloader

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::http::{network_error, parse_http_url};
use crate::{PluginError, PluginResult};

/// File name used when the final URL has no usable last path segment
pub const PLACEHOLDER_FILENAME: &str = "plugin-download";

/// A file the downloader (or the direct strategy) placed in a staging directory
#[derive(Debug, Clone)]
pub struct DownloadedArtifact {
    pub path: PathBuf,
    pub bytes: u64,
    /// Final URL after redirects, `None` for local sources
    pub source_url: Option<Url>,
}

impl DownloadedArtifact {
    /// Remove the file, ignoring a file that is already gone
    pub async fn discard(&self) -> PluginResult<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PluginError::io(
                format!("Failed to remove {}", self.path.display()),
                e,
            )),
        }
    }
}

/// Removes a partially written file unless explicitly kept.
///
/// Dropping the guard also runs on cancellation, when the owning future is
/// dropped mid-stream.
struct PartialFile {
    path: PathBuf,
    keep: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn keep(mut self) -> PathBuf {
        self.keep = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.keep {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[derive(Clone)]
pub struct Downloader {
    client: Client,
    timeout: Duration,
}

impl Downloader {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Download `url` into `target_dir`.
    ///
    /// The file is named after the last path segment of the final (post
    /// redirect) URL. Any failure after the file is created removes it.
    pub async fn download(&self, url: &str, target_dir: &Path) -> PluginResult<DownloadedArtifact> {
        let url = parse_http_url(url)?;
        info!(url = %url, "Downloading plugin");

        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| network_error(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PluginError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let path = target_dir.join(file_name_for(&final_url));
        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| PluginError::io(format!("Failed to create {}", path.display()), e))?;
        let guard = PartialFile::new(path.clone());

        let mut bytes: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| network_error(final_url.as_str(), e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| PluginError::io(format!("Failed to write {}", path.display()), e))?;
            bytes += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| PluginError::io(format!("Failed to flush {}", path.display()), e))?;
        drop(file);

        let path = guard.keep();
        debug!(path = %path.display(), bytes, "Download complete");

        Ok(DownloadedArtifact {
            path,
            bytes,
            source_url: Some(final_url),
        })
    }
}

/// Last non-empty path segment of the URL, or the placeholder
fn file_name_for(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .filter(|s| *s != "." && *s != ".." && !s.contains('\\'))
        .map(|s| s.to_string())
        .unwrap_or_else(|| PLACEHOLDER_FILENAME.to_string())
}

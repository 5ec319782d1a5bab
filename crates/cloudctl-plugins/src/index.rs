//! Plugin repository index client
//!
//! A plugin repository publishes its catalogue at `<base>/list` as a JSON
//! document with a top-level `plugins` array. Each plugin lists one binary
//! per platform, optionally with a checksum.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::http::{network_error, parse_http_url};
use crate::{PluginError, PluginResult};

/// Parsed `/list` document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginIndex {
    pub plugins: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    pub binaries: Vec<IndexBinary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexBinary {
    pub platform: String,
    pub url: String,
    #[serde(default)]
    pub checksum: Option<String>,
}

/// Concrete artifact picked for one plugin on one platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub name: String,
    pub version: String,
    pub platform: String,
    pub url: String,
    /// `None` when the index publishes no (or an empty) checksum
    pub checksum: Option<String>,
}

/// Why a name could not be resolved within one index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoLookupMiss {
    PluginNotFound,
    PlatformUnsupported,
}

impl fmt::Display for RepoLookupMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PluginNotFound => f.write_str("plugin not listed"),
            Self::PlatformUnsupported => f.write_str("no binary for this platform"),
        }
    }
}

/// `<base>/list` with exactly one slash in between
pub fn list_url(base: &str) -> PluginResult<String> {
    parse_http_url(base)?;
    Ok(format!("{}/list", base.trim().trim_end_matches('/')))
}

impl PluginIndex {
    /// Decode a `/list` response body
    pub fn from_body(url: &str, body: &str) -> PluginResult<Self> {
        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| PluginError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let plugins = match value.get("plugins") {
            Some(plugins) if !plugins.is_null() => plugins.clone(),
            _ => {
                return Err(PluginError::NotAPluginRepo {
                    url: url.to_string(),
                    reason: "\"plugins\" object not found in the responded data".to_string(),
                });
            }
        };

        let plugins: Vec<IndexEntry> =
            serde_json::from_value(plugins).map_err(|e| PluginError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let index = Self { plugins };
        index.check_unique_artifacts(url)?;
        Ok(index)
    }

    fn check_unique_artifacts(&self, url: &str) -> PluginResult<()> {
        let mut seen = HashSet::new();
        for entry in &self.plugins {
            for binary in &entry.binaries {
                if !seen.insert((&entry.name, &entry.version, &binary.platform)) {
                    return Err(PluginError::Decode {
                        url: url.to_string(),
                        reason: format!(
                            "duplicate binary for {} {} on {}",
                            entry.name, entry.version, binary.platform
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Pick the artifact for `name` on `platform`.
    ///
    /// Names match case-sensitively. Among the versions that ship a binary
    /// for the platform, the highest semantic version wins; if any of them is
    /// not valid semver, the last one in index order wins.
    pub fn resolve(&self, name: &str, platform: &str) -> Result<ResolvedArtifact, RepoLookupMiss> {
        let named: Vec<&IndexEntry> = self.plugins.iter().filter(|e| e.name == name).collect();
        if named.is_empty() {
            return Err(RepoLookupMiss::PluginNotFound);
        }

        let candidates: Vec<(&IndexEntry, &IndexBinary)> = named
            .into_iter()
            .filter_map(|entry| {
                entry
                    .binaries
                    .iter()
                    .find(|b| b.platform == platform)
                    .map(|binary| (entry, binary))
            })
            .collect();

        let (entry, binary) = pick_version(&candidates).ok_or(RepoLookupMiss::PlatformUnsupported)?;

        Ok(ResolvedArtifact {
            name: entry.name.clone(),
            version: entry.version.clone(),
            platform: binary.platform.clone(),
            url: binary.url.clone(),
            checksum: binary
                .checksum
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        })
    }
}

fn pick_version<'a>(
    candidates: &[(&'a IndexEntry, &'a IndexBinary)],
) -> Option<(&'a IndexEntry, &'a IndexBinary)> {
    let parsed: Option<Vec<semver::Version>> = candidates
        .iter()
        .map(|(entry, _)| semver::Version::parse(entry.version.trim()).ok())
        .collect();

    match parsed {
        // max_by returns the last of equal maxima, so later index entries win ties
        Some(versions) => candidates
            .iter()
            .zip(versions)
            .max_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(candidate, _)| *candidate),
        None => candidates.last().copied(),
    }
}

/// Fetches plugin indexes from repository base URLs
#[derive(Clone)]
pub struct RepoIndexClient {
    client: Client,
    timeout: Duration,
}

impl RepoIndexClient {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Fetch and decode `<base>/list`
    pub async fn fetch_index(&self, base: &str) -> PluginResult<PluginIndex> {
        let url = list_url(base)?;
        debug!(url = %url, "Fetching plugin index");

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| network_error(url.as_str(), e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PluginError::NotAPluginRepo {
                url,
                reason: "HTTP 404".to_string(),
            });
        }
        if !status.is_success() {
            return Err(PluginError::Http {
                url,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| network_error(url.as_str(), e))?;

        let index = PluginIndex::from_body(&url, &body)?;
        info!(url = %url, plugins = index.plugins.len(), "Fetched plugin index");
        Ok(index)
    }
}

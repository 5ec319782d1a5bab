//! Cloudctl Plugin System
//!
//! Acquires plugin binaries and hands them to the host for registration:
//! - Plugin repository index client (`<repo>/list`)
//! - Streaming artifact downloader with redirect and scheme guards
//! - SHA-256 checksum verification
//! - Direct and indexed install strategies behind a single facade
//! - Repository registration with index pre-flight

pub mod checksum;
pub mod downloader;
pub mod host;
pub mod http;
pub mod index;
pub mod installer;
pub mod platform;
pub mod repos;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub use downloader::{DownloadedArtifact, Downloader};
pub use host::PluginHost;
pub use index::{PluginIndex, RepoIndexClient, RepoLookupMiss, ResolvedArtifact};
pub use installer::{InstallRequest, InstallSource, PluginInstaller, RepoSelector, StagedPlugin};

/// Shown when a request could not even reach the server
pub const PROXY_HINT: &str = "TIP: If you are behind a firewall and require an HTTP proxy, verify the https_proxy environment variable is correctly set. Else, check your network connection.";

/// Sub-kind of a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// Dial/connect failure (DNS, refused, unreachable, proxy)
    Connect,
    Timeout,
    /// Redirect refused: too many hops, scheme downgrade, non-http target
    Redirect,
    Other,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Redirect => "redirect",
            Self::Other => "transport",
        };
        f.write_str(label)
    }
}

/// Why a repository was passed over during a search of all configured repos
#[derive(Debug)]
pub struct RepoOutcome {
    pub repo: String,
    pub reason: String,
}

impl fmt::Display for RepoOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.repo, self.reason)
    }
}

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Incorrect usage: {0}")]
    Usage(String),

    #[error("Plugin repo '{0}' is not configured. Run `cloudctl list-plugin-repos` to see all repos.")]
    UnknownRepo(String),

    #[error("{url} is not responding. Please make sure it is a valid plugin repo. ({reason})")]
    NotAPluginRepo { url: String, reason: String },

    #[error("Plugin '{name}' is not available in repo '{repo}'")]
    PluginNotFound { name: String, repo: String },

    #[error("Plugin '{name}' in repo '{repo}' has no binary for platform '{platform}'")]
    PlatformUnsupported {
        name: String,
        repo: String,
        platform: String,
    },

    #[error("Plugin '{name}' not found in any configured repo ({})", join_outcomes(.outcomes))]
    NotFoundInAnyRepository {
        name: String,
        outcomes: Vec<RepoOutcome>,
    },

    #[error("There is an error performing request on '{url}' ({kind}): {source}")]
    Network {
        url: String,
        kind: NetworkErrorKind,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to '{url}' failed with HTTP status {status}")]
    Http { url: String, status: u16 },

    #[error("Error processing data from '{url}': {reason}")]
    Decode { url: String, reason: String },

    #[error("Downloaded plugin binary and checksum mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("File not found locally, make sure the file exists at given path {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Plugin installation cancelled")]
    Cancelled,

    #[error(transparent)]
    Config(#[from] cloudctl_core::Error),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PluginResult<T> = Result<T, PluginError>;

fn join_outcomes(outcomes: &[RepoOutcome]) -> String {
    if outcomes.is_empty() {
        return "no plugin repos configured".to_string();
    }
    outcomes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl PluginError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownRepo(_) => "E500",
            Self::NotAPluginRepo { .. } => "E501",
            Self::PluginNotFound { .. } => "E502",
            Self::PlatformUnsupported { .. } => "E503",
            Self::NotFoundInAnyRepository { .. } => "E504",
            Self::DigestMismatch { .. } => "E510",
            Self::SourceNotFound(_) => "E511",
            Self::Network { .. } => "E100",
            Self::Http { .. } => "E101",
            Self::Decode { .. } => "E102",
            Self::Cancelled => "E700",
            Self::Usage(_) => "E800",
            Self::Config(inner) => inner.code(),
            Self::Io { .. } => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Network {
                kind: NetworkErrorKind::Connect,
                ..
            } => Some(PROXY_HINT.to_string()),
            Self::UnknownRepo(_) => Some("cloudctl list-plugin-repos".to_string()),
            Self::PluginNotFound { repo, .. } => Some(format!("cloudctl repo-plugins -r {}", repo)),
            Self::NotFoundInAnyRepository { .. } => Some("cloudctl repo-plugins".to_string()),
            Self::Config(inner) => inner.suggestion(),
            _ => None,
        }
    }

    /// True for the failures a search across all repos records and moves past
    pub fn is_index_fetch_failure(&self) -> bool {
        matches!(
            self,
            Self::Network { .. }
                | Self::Http { .. }
                | Self::Decode { .. }
                | Self::NotAPluginRepo { .. }
        )
    }
}

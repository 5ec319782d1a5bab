//! Error types for cloudctl

use thiserror::Error;

/// Result type alias using cloudctl's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Cloudctl error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Repository errors (E001-E099)
    #[error("Plugin repo named \"{0}\" already exists, please use another name.")]
    RepoNameTaken(String),

    #[error("{url} ({name}) already exists.")]
    RepoUrlTaken { url: String, name: String },

    #[error("Plugin repo '{0}' not found. Run `cloudctl list-plugin-repos` to see all repos.")]
    RepoNotFound(String),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::RepoNameTaken(_) => "E001",
            Self::RepoUrlTaken { .. } => "E002",
            Self::RepoNotFound(_) => "E003",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::RepoNameTaken(_) | Self::RepoUrlTaken { .. } | Self::RepoNotFound(_) => {
                Some("cloudctl list-plugin-repos".to_string())
            }
            Self::ConfigError(_) => Some("cloudctl config list".to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_name_taken_error() {
        let error = Error::RepoNameTaken("PrivateRepo".to_string());
        assert_eq!(error.code(), "E001");
        assert_eq!(
            error.suggestion(),
            Some("cloudctl list-plugin-repos".to_string())
        );
        assert!(error.to_string().contains("\"PrivateRepo\" already exists"));
    }

    #[test]
    fn test_repo_url_taken_error() {
        let error = Error::RepoUrlTaken {
            url: "https://repo.example".to_string(),
            name: "main".to_string(),
        };
        assert_eq!(error.code(), "E002");
        assert_eq!(error.to_string(), "https://repo.example (main) already exists.");
    }

    #[test]
    fn test_invalid_input_error() {
        let error = Error::InvalidInput("Empty name".to_string());
        assert_eq!(error.code(), "E800");
        assert_eq!(error.suggestion(), None);
        assert!(error.to_string().contains("Empty name"));
    }

    #[test]
    fn test_io_error_is_transparent() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: Error = io.into();
        assert_eq!(error.code(), "E9999");
        assert_eq!(error.to_string(), "gone");
    }
}

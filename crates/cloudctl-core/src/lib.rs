//! Cloudctl Core Library
//!
//! Shared pieces used by the plugin pipeline and the CLI:
//! - Configuration store (TOML file under the user config directory)
//! - Plugin repository set and its uniqueness rules
//! - Error types with codes and suggestions

pub mod config;
pub mod error;
pub mod repos;

pub use error::{Error, Result};


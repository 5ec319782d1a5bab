//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::repos::{PluginRepo, RepoStore, ensure_unique, find_repo};

/// Cloudctl configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
    #[serde(default)]
    pub plugin_repos: Vec<PluginRepo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub index_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub max_redirects: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<PathBuf>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            index_timeout_secs: 30,
            download_timeout_secs: 300,
            max_redirects: 10,
        }
    }
}

impl HttpConfig {
    pub fn index_timeout(&self) -> Duration {
        Duration::from_secs(self.index_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("CLOUDCTL_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("cloudctl")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Directory installed plugins are promoted into
    pub fn plugins_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.plugins.install_dir {
            return Ok(dir.clone());
        }
        if let Ok(dir) = env::var("CLOUDCTL_PLUGIN_DIR") {
            return Ok(PathBuf::from(dir));
        }
        Ok(Self::config_dir()?.join("plugins"))
    }

    /// Load configuration from file, or return defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            // Return default config without creating file
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        debug!(path = %path.display(), repos = config.plugin_repos.len(), "Loaded configuration");
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.http.index_timeout_secs == 0 || self.http.download_timeout_secs == 0 {
            return Err(anyhow!("HTTP timeouts must be greater than zero"));
        }
        for (i, repo) in self.plugin_repos.iter().enumerate() {
            if repo.name.trim().is_empty() {
                return Err(anyhow!("Plugin repo #{} has an empty name", i + 1));
            }
            ensure_unique(&self.plugin_repos[..i], &repo.name, &repo.url)
                .map_err(|e| anyhow!("Invalid plugin repo list: {}", e))?;
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "http.index_timeout_secs" => Ok(self.http.index_timeout_secs.to_string()),
            "http.download_timeout_secs" => Ok(self.http.download_timeout_secs.to_string()),
            "http.max_redirects" => Ok(self.http.max_redirects.to_string()),
            "plugins.install_dir" => Ok(self.plugins_dir()?.display().to_string()),
            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `cloudctl config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "http.index_timeout_secs" => {
                self.http.index_timeout_secs = parse_timeout(key, value)?;
            }
            "http.download_timeout_secs" => {
                self.http.download_timeout_secs = parse_timeout(key, value)?;
            }
            "http.max_redirects" => {
                self.http.max_redirects = value
                    .parse()
                    .with_context(|| format!("Invalid max_redirects value: {}", value))?;
            }
            "plugins.install_dir" => {
                if value.trim().is_empty() {
                    self.plugins.install_dir = None;
                } else {
                    self.plugins.install_dir = Some(PathBuf::from(value));
                }
            }
            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `cloudctl config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "http.index_timeout_secs",
            "http.download_timeout_secs",
            "http.max_redirects",
            "plugins.install_dir",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

fn parse_timeout(key: &str, value: &str) -> anyhow::Result<u64> {
    let secs: u64 = value
        .parse()
        .with_context(|| format!("Invalid {} value: {}", key, value))?;
    if secs == 0 {
        return Err(anyhow!("{} must be greater than zero", key));
    }
    Ok(secs)
}

impl RepoStore for Config {
    fn list_repositories(&self) -> Vec<PluginRepo> {
        self.plugin_repos.clone()
    }

    fn add_repository(&mut self, repo: PluginRepo) -> Result<()> {
        if repo.name.trim().is_empty() {
            return Err(Error::InvalidInput("Plugin repo name cannot be empty".to_string()));
        }
        ensure_unique(&self.plugin_repos, &repo.name, &repo.url)?;
        self.plugin_repos.push(repo);
        Ok(())
    }

    fn remove_repository(&mut self, name: &str) -> Result<PluginRepo> {
        let found = find_repo(&self.plugin_repos, name)
            .map(|r| r.name.clone())
            .ok_or_else(|| Error::RepoNotFound(name.to_string()))?;
        let index = self
            .plugin_repos
            .iter()
            .position(|r| r.name == found)
            .ok_or_else(|| Error::RepoNotFound(name.to_string()))?;
        Ok(self.plugin_repos.remove(index))
    }
}

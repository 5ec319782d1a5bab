//! Plugin directory registration

use std::path::{Path, PathBuf};

use tracing::info;

use crate::installer::StagedPlugin;
use crate::{PluginError, PluginResult};

/// The directory installed plugins live in
#[derive(Debug, Clone)]
pub struct PluginHost {
    dir: PathBuf,
}

impl PluginHost {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Promote a staged plugin into the plugin directory.
    ///
    /// An existing plugin with the same name is replaced. The staging
    /// directory is removed once the plugin has been moved out of it.
    pub async fn register(&self, staged: StagedPlugin) -> PluginResult<PathBuf> {
        let name = staged.install_name();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(PluginError::Usage(format!("Invalid plugin name '{}'", name)));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PluginError::io(format!("Failed to create {}", self.dir.display()), e))?;

        let target = self.dir.join(&name);
        promote(staged.path(), &target).await?;
        set_executable(&target).await?;

        info!(plugin = %name, path = %target.display(), "Plugin registered");
        Ok(target)
    }
}

/// Rename, falling back to copy when staging sits on another filesystem
async fn promote(from: &Path, to: &Path) -> PluginResult<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| PluginError::io(format!("Failed to install plugin to {}", to.display()), e))?;
    Ok(())
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> PluginResult<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|e| PluginError::io(format!("Failed to set permissions on {}", path.display()), e))
}

#[cfg(not(unix))]
async fn set_executable(_path: &Path) -> PluginResult<()> {
    Ok(())
}

//! Cloudctl CLI - PaaS control plane client

use clap::{Parser, Subcommand};
use cloudctl_core::config::Config;
use cloudctl_core::repos::RepoStore;
use cloudctl_plugins::http::build_client;
use cloudctl_plugins::repos::{add_plugin_repo, list_repo_plugins};
use cloudctl_plugins::{
    InstallRequest, InstallSource, PluginError, PluginHost, PluginInstaller, RepoIndexClient,
    RepoSelector,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Parser)]
#[command(name = "cloudctl")]
#[command(author, version, about = "PaaS control plane client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a plugin from a local path, a URL or a plugin repo
    InstallPlugin {
        /// Local path or URL, or the plugin name when installing from a repo
        source: String,
        /// Install the named plugin from this repo
        #[arg(short, long, conflicts_with = "all_repos")]
        repo: Option<String>,
        /// Search every configured repo, in order, for the named plugin
        #[arg(long)]
        all_repos: bool,
    },

    /// Add a new plugin repository
    AddPluginRepo {
        /// Repository name
        name: String,
        /// Repository base URL, e.g. http://myprivaterepo.com/repo/
        url: String,
    },

    /// Remove a plugin repository
    RemovePluginRepo { name: String },

    /// List all added plugin repositories
    ListPluginRepos,

    /// List plugins available in the configured repositories
    RepoPlugins {
        /// Only list plugins from this repo
        #[arg(short, long)]
        repo: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cloudctl_plugins=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InstallPlugin {
            source,
            repo,
            all_repos,
        } => cmd_install_plugin(source, repo, all_repos, cli.quiet).await,
        Commands::AddPluginRepo { name, url } => cmd_add_plugin_repo(&name, &url, cli.quiet).await,
        Commands::RemovePluginRepo { name } => cmd_remove_plugin_repo(&name, cli.quiet),
        Commands::ListPluginRepos => cmd_list_plugin_repos(cli.quiet),
        Commands::RepoPlugins { repo } => cmd_repo_plugins(repo.as_deref(), cli.quiet).await,
        Commands::Config { action } => cmd_config(action, cli.quiet),
    }
}

/// Render a plugin error with its code and hint
fn failed(err: PluginError) -> anyhow::Error {
    let mut message = format!("[{}] {}", err.code(), err);
    if let Some(hint) = err.hint() {
        message.push('\n');
        message.push_str(&hint);
    }
    anyhow::anyhow!(message)
}

fn index_client(config: &Config) -> anyhow::Result<RepoIndexClient> {
    let client = build_client(config.http.max_redirects).map_err(failed)?;
    Ok(RepoIndexClient::new(client, config.http.index_timeout()))
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_install_plugin(
    source: String,
    repo: Option<String>,
    all_repos: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;

    let source = match (repo, all_repos) {
        (Some(name), _) => InstallSource::Indexed {
            plugin: source,
            repos: RepoSelector::Named(name),
        },
        (None, true) => InstallSource::Indexed {
            plugin: source,
            repos: RepoSelector::AnyConfigured,
        },
        (None, false) => InstallSource::Direct(source),
    };
    let request = InstallRequest::new(source).map_err(failed)?;
    debug!(platform = request.platform(), "Installing plugin");

    if !quiet {
        println!("Installing plugin...");
    }

    let installer = PluginInstaller::from_config(&config).map_err(failed)?;
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let staged = installer
        .install_with_cancel(&request, &cancel)
        .await
        .map_err(failed)?;

    if !quiet {
        for skipped in &staged.skipped {
            println!("  Skipped repo {}", skipped);
        }
        if let (Some(plugin), Some(repo)) = (&staged.plugin, &staged.repo) {
            println!(
                "  Found {} {} for {} in repo '{}'",
                plugin.name, plugin.version, plugin.platform, repo
            );
        }
    }
    let host = PluginHost::new(config.plugins_dir()?);
    let installed = host.register(staged).await.map_err(failed)?;

    if !quiet {
        println!("OK");
        println!("Plugin installed to {}", installed.display());
    }
    Ok(())
}

async fn cmd_add_plugin_repo(name: &str, url: &str, quiet: bool) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    let client = index_client(&config)?;

    let repo = add_plugin_repo(&client, &mut config, name, url)
        .await
        .map_err(failed)?;
    config.save()?;

    if !quiet {
        println!("OK");
        println!("{} added as '{}'", repo.url, repo.name);
    }
    Ok(())
}

fn cmd_remove_plugin_repo(name: &str, quiet: bool) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    let removed = config
        .remove_repository(name)
        .map_err(|e| failed(e.into()))?;
    config.save()?;

    if !quiet {
        println!("OK");
        println!("{} removed from list of repositories", removed.name);
    }
    Ok(())
}

fn cmd_list_plugin_repos(quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let repos = config.list_repositories();

    if repos.is_empty() {
        if !quiet {
            println!("No plugin repos added.");
            println!("\nAdd one with: cloudctl add-plugin-repo <name> <url>");
        }
        return Ok(());
    }

    if !quiet {
        println!("Repo Name\tURL");
    }
    for repo in repos {
        println!("{}\t{}", repo.name, repo.url);
    }
    Ok(())
}

async fn cmd_repo_plugins(only: Option<&str>, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let client = index_client(&config)?;
    let repos = config.list_repositories();

    if repos.is_empty() && only.is_none() {
        if !quiet {
            println!("No plugin repos added.");
        }
        return Ok(());
    }

    let listings = list_repo_plugins(&client, &repos, only)
        .await
        .map_err(failed)?;

    for listing in listings {
        println!("Repository: {}", listing.repo.name);
        match listing.index {
            Ok(index) => {
                if index.plugins.is_empty() {
                    println!("  (no plugins)");
                }
                for plugin in index.plugins {
                    let platforms: Vec<&str> =
                        plugin.binaries.iter().map(|b| b.platform.as_str()).collect();
                    println!(
                        "  {} {} [{}]",
                        plugin.name,
                        plugin.version,
                        platforms.join(", ")
                    );
                }
            }
            Err(e) => println!("  [{}] {}", e.code(), e),
        }
        println!();
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

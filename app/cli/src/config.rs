//! Configuration resolution for the CLI.
//!
//! Resolves client.toml in priority order:
//! 1. `--config <path>` flag (explicit override)
//! 2. `{cwd}/.netops/client.toml` (workspace config)
//! 3. `~/.config/netops/client.toml` (global default)
//!
//! If the global default doesn't exist, it is generated automatically.

use anyhow::{Context, Result};
use client::ClientConfig;
use std::path::{Path, PathBuf};

/// Workspace config path, relative to the current directory.
pub const WORKSPACE_CONFIG: &str = ".netops/client.toml";

/// Default client config template generated when no config exists.
pub const DEFAULT_CONFIG: &str = r#"# Assistant WebSocket endpoint.
url = "ws://localhost:8000/api/ws"
# Bearer token sent on the upgrade request.
auth_token = "${NETOPS_TOKEN}"
connect_timeout_secs = 20
# Seconds of silence before an unfinished reply is closed. 0 disables.
stall_timeout_secs = 60
# Milliseconds of silence that complete a reply without an end marker.
reply_quiet_ms = 1000
# Recent messages replayed with each query. 0 replays everything.
history_limit = 50
automation_keywords = ["tool", "investigate"]
"#;

/// Resolve the client config following the priority chain.
///
/// Returns the path the config was loaded from alongside the config.
pub fn resolve_config(config_flag: Option<&Path>) -> Result<(PathBuf, ClientConfig)> {
    resolve_from(config_flag, Path::new(WORKSPACE_CONFIG), &global_config_path())
}

/// [`resolve_config`] with explicit workspace and global locations.
pub fn resolve_from(
    config_flag: Option<&Path>,
    workspace: &Path,
    global: &Path,
) -> Result<(PathBuf, ClientConfig)> {
    // 1. Explicit --config flag.
    if let Some(path) = config_flag {
        let config = ClientConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        return Ok((path.to_path_buf(), config));
    }

    // 2. Workspace config.
    if workspace.exists() {
        let config = ClientConfig::load(workspace)
            .with_context(|| format!("failed to load workspace config from {}", workspace.display()))?;
        return Ok((workspace.to_path_buf(), config));
    }

    // 3. Global default, generated on first use.
    if !global.exists() {
        generate_default_config(global)?;
        tracing::info!("generated default config at {}", global.display());
    }
    let config = ClientConfig::load(global).context("failed to load global config")?;
    Ok((global.to_path_buf(), config))
}

/// Path to the global default config.
pub fn global_config_path() -> PathBuf {
    config_dir().join("client.toml")
}

/// The netops directory under the user config dir.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("netops")
}

/// Generate a default client.toml at the given path.
fn generate_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    std::fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write default config to {}", path.display()))?;
    Ok(())
}

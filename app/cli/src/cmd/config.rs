//! Config inspection commands.

use crate::cmd::ConfigCommand;
use anyhow::Result;
use client::ClientConfig;
use std::path::Path;

/// Dispatch config subcommands.
pub fn run(action: &ConfigCommand, path: &Path, config: &ClientConfig) -> Result<()> {
    match action {
        ConfigCommand::Show => show(path, config),
    }
}

fn show(path: &Path, config: &ClientConfig) -> Result<()> {
    println!("# {}", path.display());
    print!("{}", render(config)?);
    Ok(())
}

/// Render the effective config as TOML with the token masked.
pub fn render(config: &ClientConfig) -> Result<String> {
    let mut shown = config.clone();
    if shown.token().is_some() {
        shown.auth_token = Some("********".into());
    }
    Ok(toml::to_string_pretty(&shown)?)
}

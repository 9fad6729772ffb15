//! CLI argument parsing and subcommand dispatch.

use crate::config::resolve_config;
use anyhow::Result;
use clap::{Parser, Subcommand};
use compact_str::CompactString;
use std::path::PathBuf;

pub mod chat;
pub mod config;
pub mod send;

/// Netops assistant chat client.
#[derive(Parser, Debug)]
#[command(name = "netops", about = "Chat with the netops assistant")]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Config file path, overriding the workspace and global configs.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Assistant WebSocket URL override.
    #[arg(long, global = true)]
    pub url: Option<CompactString>,

    /// Bearer token override.
    #[arg(long, global = true, env = "NETOPS_TOKEN", hide_env_values = true)]
    pub token: Option<CompactString>,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an interactive chat REPL.
    Chat,
    /// Send a one-shot query and print the reply.
    Send {
        /// Query text.
        content: String,
    },
    /// Inspect CLI configuration.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration.
    Show,
}

impl Cli {
    /// Resolve configuration and run the selected command.
    pub async fn run(self) -> Result<()> {
        let (path, mut config) = resolve_config(self.config.as_deref())?;
        if let Some(url) = self.url {
            config.url = url;
        }
        if let Some(token) = self.token {
            config.auth_token = Some(token);
        }

        match self.command {
            Command::Chat => chat::Chat.run(config).await,
            Command::Send { content } => send::Send { content }.run(config).await,
            Command::Config { action } => config::run(&action, &path, &config),
        }
    }
}

//! Client configuration loaded from TOML.

use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::status::DEFAULT_AUTOMATION_KEYWORDS;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Default assistant WebSocket endpoint.
pub const DEFAULT_URL: &str = "ws://localhost:8000/api/ws";

/// Errors raised while loading a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`ClientConfig`].
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Chat client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Assistant WebSocket URL.
    pub url: CompactString,
    /// Bearer token attached to the upgrade request (supports `${ENV_VAR}`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<CompactString>,
    /// Handshake timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Seconds without a frame before an in-flight turn is force-closed.
    /// `0` disables the timeout.
    pub stall_timeout_secs: u64,
    /// Milliseconds of silence after which an untagged reply, which never
    /// gets an `end` frame, is considered complete.
    pub reply_quiet_ms: u64,
    /// Most recent messages replayed per query. `0` replays everything.
    pub history_limit: usize,
    /// Words in `start` content that mark an automation turn.
    pub automation_keywords: Vec<CompactString>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: CompactString::from(DEFAULT_URL),
            auth_token: None,
            connect_timeout_secs: 20,
            stall_timeout_secs: 60,
            reply_quiet_ms: 1000,
            history_limit: DEFAULT_HISTORY_LIMIT,
            automation_keywords: DEFAULT_AUTOMATION_KEYWORDS
                .iter()
                .map(|k| CompactString::from(*k))
                .collect(),
        }
    }
}

impl ClientConfig {
    /// Parse a TOML string, expanding `${VAR}` references first.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(toml_str);
        Ok(toml::from_str(&expanded)?)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// The bearer token, if one is set and non-empty.
    pub fn token(&self) -> Option<&str> {
        self.auth_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Handshake timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Quiet period that completes an untagged reply.
    pub fn reply_quiet(&self) -> Duration {
        Duration::from_millis(self.reply_quiet_ms)
    }

    /// Stall timeout, `None` when disabled.
    pub fn stall_timeout(&self) -> Option<Duration> {
        (self.stall_timeout_secs > 0).then(|| Duration::from_secs(self.stall_timeout_secs))
    }
}

/// Expand `${VAR}` patterns with environment variable values.
///
/// Unknown variables are replaced with an empty string.
pub fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let name: String = chars.by_ref().take_while(|c| *c != '}').collect();
            if let Ok(val) = std::env::var(&name) {
                result.push_str(&val);
            }
        } else {
            result.push(ch);
        }
    }

    result
}

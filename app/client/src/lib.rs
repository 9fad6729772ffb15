//! Netops chat client: owns one WebSocket connection to the assistant
//! backend, assembles its fragmented replies into messages and derives the
//! automation status shown to the operator.

pub use config::ClientConfig;
pub use message::{Message, MessageId, MessageList};
pub use session::{
    ChatSession, ConnectionState, Notice, NoticeLevel, SessionCore, SessionError, SessionView,
};
pub use status::{AutomationStatus, AutomationTracker};
pub use transport::{Signal, Transport, TransportError};

use compact_str::CompactString;

pub mod assembler;
pub mod config;
pub mod history;
pub mod message;
pub mod session;
pub mod status;
pub mod transport;

/// Chat client builder.
///
/// Holds configuration. Call [`ChatClient::open`] to connect and start a
/// [`ChatSession`].
#[derive(Debug, Clone, Default)]
pub struct ChatClient {
    config: ClientConfig,
}

impl ChatClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Access the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Set the assistant WebSocket URL.
    pub fn url(mut self, url: impl Into<CompactString>) -> Self {
        self.config.url = url.into();
        self
    }

    /// Set the bearer token.
    pub fn auth_token(mut self, token: impl Into<CompactString>) -> Self {
        self.config.auth_token = Some(token.into());
        self
    }

    /// Set the stall timeout in seconds. `0` disables it.
    pub fn stall_timeout_secs(mut self, secs: u64) -> Self {
        self.config.stall_timeout_secs = secs;
        self
    }

    /// Set how many recent messages are replayed per query.
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.config.history_limit = limit;
        self
    }

    /// Connect and start a session. Must be called inside a tokio runtime.
    pub fn open(&self) -> ChatSession {
        ChatSession::open(&self.config)
    }
}

//! Netops assistant wire protocol types shared by the chat client and its
//! front ends.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

pub use event::{DecodeError, FragmentKey, ServerEvent, ToolResult};

pub mod codec;
pub mod event;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    /// The human operator.
    #[serde(rename = "user")]
    User,
    /// The assistant backend. Serialized as `ai`, which is what the backend
    /// expects in replayed history.
    #[serde(rename = "ai", alias = "assistant")]
    Assistant,
}

/// Query sent by the client to the assistant backend.
///
/// The backend keeps no session state, so every query carries the full
/// conversation so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFrame {
    /// The operator's question.
    pub query: String,
    /// Prior closed messages in chronological order.
    pub conversation_history: Vec<HistoryEntry>,
}

/// One replayed message inside a [`QueryFrame`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Client-assigned message id.
    pub id: CompactString,
    /// Message author.
    pub sender: Sender,
    /// Final message text.
    pub text: String,
    /// RFC 3339 creation time.
    pub timestamp: String,
}

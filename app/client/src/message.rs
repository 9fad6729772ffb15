//! Conversation messages and the ordered message list.

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use protocol::{HistoryEntry, Sender, ToolResult};
use std::fmt;

/// Client-assigned message identifier (a ULID string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(CompactString);

impl MessageId {
    /// Mint a fresh identifier.
    pub fn generate() -> Self {
        Self(CompactString::new(ulid::Ulid::new().to_string()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(CompactString::from(id))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of conversation.
///
/// A message is open while it still receives fragments. Once closed its text
/// never changes again.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Unique identifier.
    pub id: MessageId,
    /// Author.
    pub sender: Sender,
    /// Accumulated content.
    pub text: String,
    /// Produced by a tool-execution flow rather than plain conversation.
    pub is_automation: bool,
    /// Present on messages that report a tool invocation.
    pub tool_result: Option<ToolResult>,
    /// Client-side creation time.
    pub timestamp: DateTime<Utc>,
    open: bool,
}

impl Message {
    /// A closed user message.
    pub fn user(id: MessageId, text: impl Into<String>) -> Self {
        Self::new(id, Sender::User, text.into(), false)
    }

    /// An open, empty assistant message.
    pub fn assistant(id: MessageId) -> Self {
        let mut message = Self::new(id, Sender::Assistant, String::new(), false);
        message.open = true;
        message
    }

    /// A closed assistant message produced by an automation flow.
    pub fn automation(id: MessageId, text: impl Into<String>) -> Self {
        Self::new(id, Sender::Assistant, text.into(), true)
    }

    /// A closed automation message reporting one tool invocation.
    pub fn tool(id: MessageId, result: ToolResult) -> Self {
        let text = format!("🔧 **{}** executed\n\n{}", result.tool, result.output);
        let mut message = Self::automation(id, text);
        message.tool_result = Some(result);
        message
    }

    /// Mark an open message as part of an automation turn.
    pub fn with_automation(mut self, is_automation: bool) -> Self {
        self.is_automation = is_automation;
        self
    }

    /// Seed an open message with its first fragment.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Whether the message still accepts fragments.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Normalized form replayed to the backend.
    pub fn to_history(&self) -> HistoryEntry {
        HistoryEntry {
            id: self.id.0.clone(),
            sender: self.sender,
            text: self.text.clone(),
            timestamp: self.timestamp.to_rfc3339(),
        }
    }

    fn new(id: MessageId, sender: Sender, text: String, is_automation: bool) -> Self {
        Self {
            id,
            sender,
            text,
            is_automation,
            tool_result: None,
            timestamp: Utc::now(),
            open: false,
        }
    }
}

/// Ordered list of messages, oldest first.
#[derive(Debug, Clone, Default)]
pub struct MessageList {
    messages: Vec<Message>,
}

impl MessageList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Look up a message by id.
    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Append text to an open message. Returns false if the message is
    /// missing or closed.
    pub fn append(&mut self, id: &MessageId, text: &str) -> bool {
        match self.open_mut(id) {
            Some(message) => {
                message.text.push_str(text);
                true
            }
            None => false,
        }
    }

    /// Replace the text of an open message. Returns false if the message is
    /// missing or closed.
    pub fn replace(&mut self, id: &MessageId, text: &str, is_automation: bool) -> bool {
        match self.open_mut(id) {
            Some(message) => {
                message.text.clear();
                message.text.push_str(text);
                message.is_automation |= is_automation;
                true
            }
            None => false,
        }
    }

    /// Close a message. Returns false if it was missing or already closed.
    pub fn close(&mut self, id: &MessageId) -> bool {
        match self.open_mut(id) {
            Some(message) => {
                message.open = false;
                true
            }
            None => false,
        }
    }

    /// All messages, oldest first.
    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    /// Iterate over messages, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn open_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.messages
            .iter_mut()
            .rev()
            .find(|m| &m.id == id)
            .filter(|m| m.open)
    }
}

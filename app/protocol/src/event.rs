//! Inbound event decoding.
//!
//! The backend sends one JSON object per frame, dispatched on its `type`
//! field. Frames without a `type` field are the older untagged shape that
//! only carries `content`. An `error` field on any frame takes precedence
//! over its tag.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of leading characters used by the content-derived fragment key.
pub const CONTENT_KEY_PREFIX: usize = 20;

/// Errors produced while decoding an inbound frame.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Payload is not well-formed JSON or a field has the wrong type.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    /// Payload is valid JSON but not an object.
    #[error("frame is not a json object")]
    NotAnObject,
    /// The `type` field is present but not a string.
    #[error("frame `type` is not a string")]
    InvalidTag,
    /// A tagged frame is missing a field its tag requires.
    #[error("`{tag}` frame is missing `{field}`")]
    MissingField {
        /// Frame tag.
        tag: &'static str,
        /// Missing field name.
        field: &'static str,
    },
}

/// Outcome of one tool invocation reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool name.
    pub tool: CompactString,
    /// Whether the tool succeeded.
    pub success: bool,
    /// Human-readable tool output.
    pub output: String,
    /// Optional structured payload, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Identity of a fragment for duplicate suppression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FragmentKey {
    /// Server-assigned fragment sequence number.
    Seq(u64),
    /// Fallback for frames without a sequence number: leading characters
    /// plus total length.
    Content {
        /// First [`CONTENT_KEY_PREFIX`] characters.
        prefix: String,
        /// Total length in characters.
        len: usize,
    },
}

impl FragmentKey {
    /// Derive the content fallback key.
    pub fn of_content(content: &str) -> Self {
        Self::Content {
            prefix: content.chars().take(CONTENT_KEY_PREFIX).collect(),
            len: content.chars().count(),
        }
    }
}

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Begin a new assistant turn.
    Start {
        /// Optional hint text; used to detect automation turns.
        content: Option<String>,
    },
    /// Append to the open assistant message.
    Chunk {
        /// Fragment text.
        content: String,
        /// Server-assigned fragment sequence number.
        seq: Option<u64>,
    },
    /// A self-contained tool invocation outcome.
    ToolResult(ToolResult),
    /// Final text of an automation turn.
    FinalResponse {
        /// Replacement text for the turn.
        content: String,
    },
    /// Close the open plain-chat message (`end` or `complete`).
    End,
    /// Backend-reported failure of the current turn.
    Error {
        /// Backend message, if any.
        message: Option<String>,
    },
    /// Untagged frame carrying only content.
    Legacy {
        /// Fragment text.
        content: String,
        /// De-duplication key.
        key: FragmentKey,
    },
}

impl ServerEvent {
    /// Key used to suppress re-delivered fragments, if this event is subject
    /// to de-duplication.
    pub fn fragment_key(&self) -> Option<FragmentKey> {
        match self {
            Self::Chunk { seq: Some(seq), .. } => Some(FragmentKey::Seq(*seq)),
            Self::Legacy { key, .. } => Some(key.clone()),
            _ => None,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Chunk { .. } => "chunk",
            Self::ToolResult(_) => "tool_result",
            Self::FinalResponse { .. } => "final_response",
            Self::End => "end",
            Self::Error { .. } => "error",
            Self::Legacy { .. } => "legacy",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: Option<String>,
    content: Option<String>,
    error: Option<Value>,
    tool: Option<CompactString>,
    success: Option<bool>,
    output: Option<String>,
    data: Option<Value>,
    seq: Option<u64>,
}

/// Decode one inbound frame.
///
/// Returns `Ok(None)` for frames the client ignores: unknown tags and
/// untagged frames without content.
pub fn decode(text: &str) -> Result<Option<ServerEvent>, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    let tagged = match &value {
        Value::Object(map) => map.contains_key("type"),
        _ => return Err(DecodeError::NotAnObject),
    };
    let raw: RawFrame = serde_json::from_value(value)?;

    if let Some(message) = error_message(raw.error.as_ref()) {
        return Ok(Some(ServerEvent::Error {
            message: Some(message),
        }));
    }

    let kind = match raw.kind {
        Some(kind) => kind,
        None if tagged => return Err(DecodeError::InvalidTag),
        None => return Ok(legacy(raw.content, raw.seq)),
    };

    let event = match kind.as_str() {
        "start" => ServerEvent::Start {
            content: raw.content,
        },
        "chunk" => ServerEvent::Chunk {
            content: require("chunk", "content", raw.content)?,
            seq: raw.seq,
        },
        "tool_result" => ServerEvent::ToolResult(ToolResult {
            tool: require("tool_result", "tool", raw.tool)?,
            success: require("tool_result", "success", raw.success)?,
            output: require("tool_result", "output", raw.output)?,
            data: raw.data,
        }),
        "final_response" => ServerEvent::FinalResponse {
            content: require("final_response", "content", raw.content)?,
        },
        "end" | "complete" => ServerEvent::End,
        "error" => ServerEvent::Error { message: None },
        other => {
            tracing::debug!("ignoring frame with unknown type `{other}`");
            return Ok(None);
        }
    };
    Ok(Some(event))
}

fn legacy(content: Option<String>, seq: Option<u64>) -> Option<ServerEvent> {
    let content = content.filter(|c| !c.is_empty())?;
    let key = match seq {
        Some(seq) => FragmentKey::Seq(seq),
        None => FragmentKey::of_content(&content),
    };
    Some(ServerEvent::Legacy { content, key })
}

fn require<T>(tag: &'static str, field: &'static str, value: Option<T>) -> Result<T, DecodeError> {
    value.ok_or(DecodeError::MissingField { tag, field })
}

/// An `error` field counts when it is present and not null, `false` or empty.
fn error_message(error: Option<&Value>) -> Option<String> {
    match error? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

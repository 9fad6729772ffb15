//! JSON text framing for the WebSocket transport.
//!
//! Each WebSocket text message carries exactly one JSON object. Frames larger
//! than [`MAX_FRAME_SIZE`] are refused in both directions.

use crate::event::{self, DecodeError, ServerEvent};
use crate::QueryFrame;

/// Maximum frame size: 16 MiB.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Errors that can occur while encoding or decoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Frame exceeds the maximum allowed size.
    #[error("frame too large: {size} bytes (max {MAX_FRAME_SIZE})")]
    TooLarge {
        /// Frame size in bytes.
        size: usize,
    },
    /// Outgoing frame could not be serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Inbound frame could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Encode a query as a text frame.
pub fn encode_query(frame: &QueryFrame) -> Result<String, FrameError> {
    let text = serde_json::to_string(frame)?;
    if text.len() > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge { size: text.len() });
    }
    Ok(text)
}

/// Decode an inbound text frame into an event.
///
/// See [`event::decode`] for which frames yield `Ok(None)`.
pub fn decode_event(text: &str) -> Result<Option<ServerEvent>, FrameError> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge { size: text.len() });
    }
    Ok(event::decode(text)?)
}

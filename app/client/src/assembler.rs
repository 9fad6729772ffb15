//! Message assembly from the inbound event stream.
//!
//! [`transition`] is a pure function of the pending-assembly pointer and one
//! event; it returns the new pointer and the list operations to perform.
//! [`Assembler`] wraps it with the processed-fragment set and applies the
//! operations to a [`MessageList`].

use crate::message::{Message, MessageId, MessageList};
use protocol::{FragmentKey, ServerEvent};
use std::collections::HashSet;

/// One change to the message list.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Append a new open message.
    Open(Message),
    /// Append text to an open message.
    Append {
        /// Target message.
        id: MessageId,
        /// Fragment text.
        text: String,
    },
    /// Replace the text of an open message.
    Replace {
        /// Target message.
        id: MessageId,
        /// Replacement text.
        text: String,
        /// Mark the message as automation output.
        automation: bool,
    },
    /// Close a message.
    Close(MessageId),
    /// Append an already-closed message.
    Push(Message),
}

/// Result of one [`transition`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transition {
    /// Pending-assembly pointer after the event.
    pub pending: Option<MessageId>,
    /// Operations to apply, in order.
    pub ops: Vec<Op>,
}

/// Compute the effect of one event.
///
/// `automation` marks a `start` event whose content suggests tool usage.
/// `mint` supplies ids for newly created messages.
pub fn transition(
    pending: Option<&MessageId>,
    event: &ServerEvent,
    automation: bool,
    mut mint: impl FnMut() -> MessageId,
) -> Transition {
    let mut ops = Vec::new();
    let pending = match event {
        ServerEvent::Start { .. } => {
            if let Some(prev) = pending {
                tracing::warn!("start while {prev} is still open, abandoning it");
                ops.push(Op::Close(prev.clone()));
            }
            let id = mint();
            ops.push(Op::Open(
                Message::assistant(id.clone()).with_automation(automation),
            ));
            Some(id)
        }
        ServerEvent::Chunk { content, .. } | ServerEvent::Legacy { content, .. } => {
            if content.is_empty() {
                pending.cloned()
            } else if let Some(id) = pending {
                ops.push(Op::Append {
                    id: id.clone(),
                    text: content.clone(),
                });
                Some(id.clone())
            } else {
                let id = mint();
                ops.push(Op::Open(Message::assistant(id.clone()).with_text(content)));
                Some(id)
            }
        }
        ServerEvent::ToolResult(result) => {
            ops.push(Op::Push(Message::tool(mint(), result.clone())));
            pending.cloned()
        }
        ServerEvent::FinalResponse { content } => {
            match pending {
                Some(id) => {
                    ops.push(Op::Replace {
                        id: id.clone(),
                        text: content.clone(),
                        automation: true,
                    });
                    ops.push(Op::Close(id.clone()));
                }
                None => ops.push(Op::Push(Message::automation(mint(), content.clone()))),
            }
            None
        }
        ServerEvent::End | ServerEvent::Error { .. } => {
            if let Some(id) = pending {
                ops.push(Op::Close(id.clone()));
            }
            None
        }
    };
    Transition { pending, ops }
}

/// Apply one operation to the list.
pub fn apply(messages: &mut MessageList, op: Op) {
    match op {
        Op::Open(message) | Op::Push(message) => messages.push(message),
        Op::Append { id, text } => {
            if !messages.append(&id, &text) {
                tracing::warn!("dropping fragment for closed or unknown message {id}");
            }
        }
        Op::Replace {
            id,
            text,
            automation,
        } => {
            if !messages.replace(&id, &text, automation) {
                tracing::warn!("cannot replace text of closed or unknown message {id}");
            }
        }
        Op::Close(id) => {
            messages.close(&id);
        }
    }
}

/// Stateful assembler holding the pending pointer and the processed-fragment
/// set.
#[derive(Debug, Default)]
pub struct Assembler {
    pending: Option<MessageId>,
    seen: HashSet<FragmentKey>,
}

impl Assembler {
    /// Create an assembler with nothing open.
    pub fn new() -> Self {
        Self::default()
    }

    /// The message currently receiving fragments.
    pub fn pending(&self) -> Option<&MessageId> {
        self.pending.as_ref()
    }

    /// Feed one event. Returns false when the event was dropped as an
    /// already-seen fragment.
    pub fn apply(
        &mut self,
        event: &ServerEvent,
        automation: bool,
        messages: &mut MessageList,
    ) -> bool {
        if let Some(key) = event.fragment_key() {
            if !self.seen.insert(key.clone()) {
                tracing::warn!("duplicate fragment {key:?}, skipping");
                return false;
            }
        }

        let Transition { pending, ops } =
            transition(self.pending.as_ref(), event, automation, MessageId::generate);
        for op in ops {
            apply(messages, op);
        }
        self.pending = pending;

        if matches!(
            event,
            ServerEvent::Start { .. }
                | ServerEvent::FinalResponse { .. }
                | ServerEvent::End
                | ServerEvent::Error { .. }
        ) {
            self.seen.clear();
        }
        true
    }

    /// Close the open message as-is and forget all per-turn state.
    pub fn reset(&mut self, messages: &mut MessageList) {
        if let Some(id) = self.pending.take() {
            messages.close(&id);
        }
        self.seen.clear();
    }
}

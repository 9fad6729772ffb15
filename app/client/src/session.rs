//! Chat session: the public surface for submitting queries and observing
//! messages, connection state and automation status.
//!
//! [`SessionCore`] holds all session state and is driven synchronously by
//! transport signals, so it can be tested by feeding synthetic frames.
//! [`ChatSession`] runs a core on a background task wired to a [`Transport`].

use crate::assembler::Assembler;
use crate::config::ClientConfig;
use crate::history::HistoryBuffer;
use crate::message::{Message, MessageId, MessageList};
use crate::status::{AutomationStatus, AutomationTracker};
use crate::transport::{Signal, Transport, TransportError};
use compact_str::CompactString;
use protocol::codec::{self, FrameError};
use protocol::{QueryFrame, ServerEvent};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

/// Errors returned to callers of [`SessionCore::submit_query`] and
/// [`ChatSession::submit_query`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The transport is not connected.
    #[error("not connected to the assistant")]
    NotConnected,
    /// The query is blank.
    #[error("query is empty")]
    EmptyQuery,
    /// A previous query is still being answered.
    #[error("a query is already in progress")]
    Busy,
    /// The query could not be encoded.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// The transport refused the frame.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The session task has stopped.
    #[error("session is closed")]
    Closed,
    /// Waiting for the connection took too long.
    #[error("timed out waiting for the assistant")]
    Timeout,
}

/// Connection state as reported by the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection.
    #[default]
    Disconnected,
    /// A connect attempt is in progress.
    Connecting,
    /// The connection is open.
    Connected,
}

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Something went right.
    Success,
    /// Something went wrong.
    Error,
}

/// A user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Display text.
    pub text: String,
}

impl Notice {
    fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// Snapshot of everything the display layer renders.
#[derive(Debug, Clone, Default)]
pub struct SessionView {
    /// Messages, oldest first.
    pub messages: Vec<Message>,
    /// Connection state.
    pub connection: ConnectionState,
    /// Automation status.
    pub automation: AutomationStatus,
    /// Current automation step, while active.
    pub step: Option<String>,
    /// Current tool, while active.
    pub tool: Option<CompactString>,
    /// A query was sent and its turn has not finished.
    pub sending: bool,
}

/// Session state machine, free of any I/O.
#[derive(Debug)]
pub struct SessionCore {
    connection: ConnectionState,
    messages: MessageList,
    assembler: Assembler,
    tracker: AutomationTracker,
    history: HistoryBuffer,
    sending: bool,
    notices: Vec<Notice>,
}

impl SessionCore {
    /// Create a disconnected session.
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            messages: MessageList::new(),
            assembler: Assembler::new(),
            tracker: AutomationTracker::new(config.automation_keywords.clone()),
            history: HistoryBuffer::new(config.history_limit),
            sending: false,
            notices: Vec::new(),
        }
    }

    /// Record that a connect attempt has started.
    pub fn connecting(&mut self) {
        self.connection = ConnectionState::Connecting;
    }

    /// Process one transport signal.
    pub fn handle(&mut self, signal: Signal) {
        match signal {
            Signal::Opened => {
                self.connection = ConnectionState::Connected;
                self.notices.push(Notice::success("Connected to AI Assistant"));
            }
            Signal::Frame(text) => match codec::decode_event(&text) {
                Ok(Some(event)) => self.handle_event(event),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("failed to decode frame: {e}");
                    self.notices
                        .push(Notice::error("Failed to parse message from AI Assistant."));
                    self.reset_turn();
                }
            },
            Signal::Closed => {
                self.connection = ConnectionState::Disconnected;
                self.notices
                    .push(Notice::error("Disconnected from AI Assistant"));
                self.reset_turn();
            }
            Signal::Failed(reason) => {
                tracing::error!("assistant connection failed: {reason}");
                self.connection = ConnectionState::Disconnected;
                self.notices.push(Notice::error(
                    "An error occurred with the AI Assistant connection.",
                ));
                self.reset_turn();
            }
        }
    }

    /// Process one decoded event.
    pub fn handle_event(&mut self, event: ServerEvent) {
        tracing::debug!("event {}", event.kind());
        let automation = match &event {
            ServerEvent::Start { content } => self.tracker.suggests_automation(content.as_deref()),
            _ => false,
        };
        let opens = self.assembler.pending().is_none();
        if !self.assembler.apply(&event, automation, &mut self.messages) {
            return;
        }
        self.tracker.observe(&event, automation);

        match event {
            ServerEvent::FinalResponse { .. } | ServerEvent::End => self.sending = false,
            ServerEvent::Error { message } => {
                self.notices.push(Notice::error(
                    message.unwrap_or_else(|| "An error occurred".to_owned()),
                ));
                self.sending = false;
            }
            // Untagged backends never send an explicit end; the first fragment
            // of a reply frees the input.
            ServerEvent::Legacy { .. } if opens => self.sending = false,
            _ => {}
        }
    }

    /// Start a turn for `text`.
    ///
    /// On success the user message is already in the list and the returned
    /// encoded frame must be handed to the transport. A rejected query adds
    /// nothing to the list.
    pub fn submit_query(&mut self, text: &str) -> Result<String, SessionError> {
        if self.connection != ConnectionState::Connected {
            self.notices
                .push(Notice::error("Not connected to the AI Assistant."));
            return Err(SessionError::NotConnected);
        }
        if text.trim().is_empty() {
            return Err(SessionError::EmptyQuery);
        }
        if self.sending {
            return Err(SessionError::Busy);
        }

        // An untagged reply that already freed the input is complete; close it
        // so it is replayed.
        self.assembler.reset(&mut self.messages);
        let frame = QueryFrame {
            query: text.to_owned(),
            conversation_history: self.history.snapshot(&self.messages),
        };
        let encoded = codec::encode_query(&frame)?;

        self.messages.push(Message::user(MessageId::generate(), text));
        self.sending = true;
        self.tracker.reset();
        Ok(encoded)
    }

    /// Force-close a turn that stopped receiving frames.
    ///
    /// With no query outstanding this only closes a quiet untagged reply.
    pub fn stall(&mut self) {
        if !self.sending {
            // A reply that already freed the input just went quiet.
            if self.assembler.pending().is_some() {
                tracing::debug!("closing idle untagged reply");
                self.assembler.reset(&mut self.messages);
            }
            return;
        }
        tracing::warn!("assistant turn stalled, closing it");
        self.notices
            .push(Notice::error("The AI Assistant stopped responding."));
        self.reset_turn();
    }

    /// A turn is waiting for frames.
    pub fn in_flight(&self) -> bool {
        self.sending || self.assembler.pending().is_some()
    }

    /// Submit `text` and hand the frame to `transport`.
    ///
    /// Refused without touching the session when the socket is already
    /// down; the transport's own signal then reports the disconnect.
    pub fn submit_to(&mut self, transport: &Transport, text: &str) -> Result<(), SessionError> {
        if self.connection == ConnectionState::Connected && !transport.is_connected() {
            return Err(TransportError::NotConnected.into());
        }
        let encoded = self.submit_query(text)?;
        transport.send(encoded)?;
        Ok(())
    }

    /// Notices raised since the last call.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Current connection state.
    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// The message list.
    pub fn messages(&self) -> &MessageList {
        &self.messages
    }

    /// The automation tracker.
    pub fn automation(&self) -> &AutomationTracker {
        &self.tracker
    }

    /// A query was sent and its turn has not finished.
    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// Snapshot for the display layer.
    pub fn view(&self) -> SessionView {
        SessionView {
            messages: self.messages.as_slice().to_vec(),
            connection: self.connection,
            automation: self.tracker.status(),
            step: self.tracker.step().map(str::to_owned),
            tool: self.tracker.tool().map(CompactString::from),
            sending: self.sending,
        }
    }

    fn reset_turn(&mut self) {
        self.assembler.reset(&mut self.messages);
        self.tracker.fail();
        self.sending = false;
    }
}

enum Command {
    Submit {
        text: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Close,
}

/// A live chat session bound to one WebSocket connection.
///
/// Dropping the session closes the connection.
pub struct ChatSession {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<SessionView>,
    notices: mpsc::UnboundedReceiver<Notice>,
}

impl ChatSession {
    /// Connect and start the session task. Must be called inside a tokio
    /// runtime.
    pub fn open(config: &ClientConfig) -> Self {
        let mut core = SessionCore::new(config);
        core.connecting();
        let (transport, signals) = Transport::connect(config);

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(core.view());
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        tokio::spawn(run(
            core,
            transport,
            signals,
            command_rx,
            view_tx,
            notice_tx,
            config.stall_timeout(),
            config.reply_quiet(),
        ));

        Self {
            commands: command_tx,
            view: view_rx,
            notices: notice_rx,
        }
    }

    /// Submit a query. Returns once the frame is handed to the transport;
    /// the reply arrives through [`ChatSession::watch`].
    pub async fn submit_query(&self, text: impl Into<String>) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Submit {
                text: text.into(),
                reply,
            })
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Close the connection. Idempotent.
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// A receiver notified on every state change.
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Wait for the next notice. `None` once the session task has stopped.
    pub async fn next_notice(&mut self) -> Option<Notice> {
        self.notices.recv().await
    }

    /// Take a pending notice without waiting.
    pub fn try_notice(&mut self) -> Option<Notice> {
        self.notices.try_recv().ok()
    }

    /// Wait until the connection is open.
    pub async fn wait_connected(&self, timeout: Duration) -> Result<(), SessionError> {
        let mut rx = self.view.clone();
        let wait = rx.wait_for(|v| v.connection != ConnectionState::Connecting);
        let state = match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(view)) => view.connection,
            Ok(Err(_)) => return Err(SessionError::Closed),
            Err(_) => return Err(SessionError::Timeout),
        };
        match state {
            ConnectionState::Connected => Ok(()),
            _ => Err(SessionError::NotConnected),
        }
    }

    /// Wait until the current turn has finished.
    pub async fn wait_idle(&self) -> Result<SessionView, SessionError> {
        let mut rx = self.view.clone();
        let view = rx
            .wait_for(|v| !v.sending)
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(view.clone())
    }
}

async fn run(
    mut core: SessionCore,
    transport: Transport,
    mut signals: mpsc::UnboundedReceiver<Signal>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    view: watch::Sender<SessionView>,
    notices: mpsc::UnboundedSender<Notice>,
    stall_timeout: Option<Duration>,
    reply_quiet: Duration,
) {
    let mut last_activity = Instant::now();
    let mut transport_done = false;

    loop {
        let deadline = if core.is_sending() {
            stall_timeout.map(|t| last_activity + t)
        } else if core.in_flight() {
            Some(last_activity + reply_quiet)
        } else {
            None
        };
        let mut replied = None;
        tokio::select! {
            signal = signals.recv(), if !transport_done => match signal {
                Some(signal) => {
                    if matches!(signal, Signal::Frame(_)) {
                        last_activity = Instant::now();
                    }
                    core.handle(signal);
                }
                None => transport_done = true,
            },
            command = commands.recv() => match command {
                Some(Command::Submit { text, reply }) => {
                    let result = core.submit_to(&transport, &text);
                    if result.is_ok() {
                        last_activity = Instant::now();
                    }
                    replied = Some((reply, result));
                }
                Some(Command::Close) => transport.close(),
                None => {
                    transport.close();
                    break;
                }
            },
            _ = sleep_until(deadline), if deadline.is_some() => core.stall(),
        }

        for notice in core.drain_notices() {
            let _ = notices.send(notice);
        }
        view.send_replace(core.view());
        // Answer only after the view reflects the submitted turn.
        if let Some((reply, result)) = replied {
            let _ = reply.send(result);
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

//! WebSocket transport to the assistant backend.
//!
//! A single background task owns the socket. It reports what happens on the
//! wire as [`Signal`]s through one FIFO channel, so frames reach the session
//! in the order the backend sent them. The session never touches the socket.

use crate::config::ClientConfig;
use futures_util::{SinkExt, StreamExt};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{
    self,
    client::IntoClientRequest,
    handshake::client::Request,
    http::{HeaderValue, header::AUTHORIZATION},
    protocol::Message as WsMessage,
};

/// Transport-level happenings, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// The connection is established.
    Opened,
    /// One inbound text frame.
    Frame(String),
    /// The connection was closed, locally or by the backend.
    Closed,
    /// Connecting failed or the connection broke.
    Failed(String),
}

/// Errors raised by the transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Sending requires an open connection; nothing is queued.
    #[error("not connected")]
    NotConnected,
    /// The endpoint URL could not be turned into a request.
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] tungstenite::Error),
    /// The bearer token is not a valid header value.
    #[error("auth token is not a valid header value")]
    InvalidToken,
}

enum Outbound {
    Text(String),
    Close,
}

/// Handle to the socket task.
///
/// Not Clone, one transport per session.
pub struct Transport {
    outbound: mpsc::UnboundedSender<Outbound>,
    connected: Arc<AtomicBool>,
}

impl Transport {
    /// Start connecting. The returned receiver yields exactly one of
    /// [`Signal::Opened`] or [`Signal::Failed`] for the attempt, then frames
    /// until the connection ends.
    pub fn connect(config: &ClientConfig) -> (Self, mpsc::UnboundedReceiver<Signal>) {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));

        let request = build_request(config);
        tokio::spawn(run(
            request,
            config.connect_timeout(),
            signal_tx,
            outbound_rx,
            connected.clone(),
        ));

        let transport = Self {
            outbound: outbound_tx,
            connected,
        };
        (transport, signal_rx)
    }

    /// Whether the socket is currently open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Send one encoded frame.
    pub fn send(&self, frame: String) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.outbound
            .send(Outbound::Text(frame))
            .map_err(|_| TransportError::NotConnected)
    }

    /// Close the connection. Calling it again is a no-op.
    pub fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Build the upgrade request, attaching the bearer token if configured.
pub fn build_request(config: &ClientConfig) -> Result<Request, TransportError> {
    let mut request = config.url.as_str().into_client_request()?;
    if let Some(token) = config.token() {
        let value =
            HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| TransportError::InvalidToken)?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }
    Ok(request)
}

async fn run(
    request: Result<Request, TransportError>,
    timeout: Duration,
    signals: mpsc::UnboundedSender<Signal>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    connected: Arc<AtomicBool>,
) {
    let request = match request {
        Ok(request) => request,
        Err(e) => {
            let _ = signals.send(Signal::Failed(e.to_string()));
            return;
        }
    };
    let endpoint = request.uri().to_string();

    let connect = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request));
    let socket = tokio::select! {
        result = connect => match result {
            Ok(Ok((socket, _response))) => socket,
            Ok(Err(e)) => {
                tracing::error!("failed to connect to {endpoint}: {e}");
                let _ = signals.send(Signal::Failed(e.to_string()));
                return;
            }
            Err(_) => {
                tracing::error!("connecting to {endpoint} timed out");
                let _ = signals.send(Signal::Failed(format!(
                    "connect timed out after {}s",
                    timeout.as_secs()
                )));
                return;
            }
        },
        Some(Outbound::Close) | None = outbound.recv() => {
            let _ = signals.send(Signal::Closed);
            return;
        }
    };

    tracing::debug!("connected to {endpoint}");
    connected.store(true, Ordering::Release);
    let _ = signals.send(Signal::Opened);

    let (mut sink, mut stream) = socket.split();
    let last = loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    let _ = signals.send(Signal::Frame(text.as_str().to_owned()));
                }
                Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => {
                        let _ = signals.send(Signal::Frame(text));
                    }
                    Err(_) => tracing::warn!("ignoring non-utf8 binary frame"),
                },
                Some(Ok(WsMessage::Close(_))) | None => break Signal::Closed,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!("connection to {endpoint} broke: {e}");
                    break Signal::Failed(e.to_string());
                }
            },
            out = outbound.recv() => match out {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = sink.send(WsMessage::text(text)).await {
                        tracing::error!("failed to send frame: {e}");
                        break Signal::Failed(e.to_string());
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.close().await;
                    break Signal::Closed;
                }
            },
        }
    };

    connected.store(false, Ordering::Release);
    tracing::debug!("disconnected from {endpoint}");
    let _ = signals.send(last);
}

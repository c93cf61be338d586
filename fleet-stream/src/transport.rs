//! Transport seam between the connection manager and the network
//!
//! A [`Connector`] opens one [`TransportLink`]: a bounded outbound frame
//! channel plus an inbound stream of [`TransportEvent`]s. The link ends with
//! exactly one [`TransportEvent::Closed`] (or the inbound channel closing).
//! The websocket implementation lives in [`crate::ws`]; tests open
//! [`TransportLink::in_memory`] pairs instead.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use fleet_protocol::WireFrame;

use crate::config::StreamConfig;
use crate::error::{Result, StreamError};

/// Close codes the server uses to rotate a session on purpose
pub const SERVER_CLOSE_CODES: [u16; 2] = [1000, 4000];

/// Why a link ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The server asked the client to go away (normal close or session rotation)
    ServerRequested { code: u16, reason: String },
    /// Anything else: network failure, abnormal close, stream end
    Dropped(String),
}

impl CloseReason {
    /// Classify a close frame by its status code
    pub fn from_close_code(code: u16, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        if SERVER_CLOSE_CODES.contains(&code) {
            CloseReason::ServerRequested { code, reason }
        } else if reason.is_empty() {
            CloseReason::Dropped(format!("closed with code {}", code))
        } else {
            CloseReason::Dropped(format!("closed with code {}: {}", code, reason))
        }
    }

    pub fn is_server_requested(&self) -> bool {
        matches!(self, CloseReason::ServerRequested { .. })
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::ServerRequested { code, reason } if reason.is_empty() => {
                write!(f, "server closed the session ({})", code)
            }
            CloseReason::ServerRequested { code, reason } => {
                write!(f, "server closed the session ({}): {}", code, reason)
            }
            CloseReason::Dropped(reason) => write!(f, "connection lost: {}", reason),
        }
    }
}

/// Something that happened on an open link
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Frame(WireFrame),
    Closed(CloseReason),
}

/// Opens transports to the realtime endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a link, attaching `credential` as a bearer token when present
    async fn connect(&self, config: &StreamConfig, credential: Option<&str>)
        -> Result<TransportLink>;
}

/// Client side of an open transport
///
/// Dropping the link closes it.
#[derive(Debug)]
pub struct TransportLink {
    outbound: mpsc::Sender<WireFrame>,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TransportLink {
    pub fn new(
        outbound: mpsc::Sender<WireFrame>,
        inbound: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self { outbound, inbound }
    }

    /// A connected pair of in-memory ends
    pub fn in_memory(buffer: usize) -> (TransportLink, LinkPeer) {
        let (outbound_tx, outbound_rx) = mpsc::channel(buffer.max(1));
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        (
            TransportLink::new(outbound_tx, inbound_rx),
            LinkPeer {
                outbound: outbound_rx,
                inbound: inbound_tx,
            },
        )
    }

    /// Queue a frame without waiting
    pub fn send(&self, frame: WireFrame) -> Result<()> {
        self.outbound.try_send(frame).map_err(|e| match e {
            TrySendError::Full(frame) => {
                StreamError::Transport(format!("outbound buffer full, dropped '{}'", frame.event))
            }
            TrySendError::Closed(_) => StreamError::Transport("link is closed".to_string()),
        })
    }

    /// Next inbound event, `None` once the remote end is gone
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.inbound.recv().await
    }
}

/// Remote end of an in-memory link
#[derive(Debug)]
pub struct LinkPeer {
    outbound: mpsc::Receiver<WireFrame>,
    inbound: mpsc::UnboundedSender<TransportEvent>,
}

impl LinkPeer {
    /// Deliver a frame to the client, `false` if the client dropped the link
    pub fn push_frame(&self, frame: WireFrame) -> bool {
        self.inbound.send(TransportEvent::Frame(frame)).is_ok()
    }

    pub fn close(&self, reason: CloseReason) -> bool {
        self.inbound.send(TransportEvent::Closed(reason)).is_ok()
    }

    /// Frame sent by the client, if one is waiting
    pub fn try_recv_frame(&mut self) -> Option<WireFrame> {
        self.outbound.try_recv().ok()
    }

    pub async fn recv_frame(&mut self) -> Option<WireFrame> {
        self.outbound.recv().await
    }

    /// Everything the client has sent so far
    pub fn drain_frames(&mut self) -> Vec<WireFrame> {
        std::iter::from_fn(|| self.try_recv_frame()).collect()
    }

    /// Whether the client side has dropped its link
    pub fn is_closed(&self) -> bool {
        self.inbound.is_closed()
    }
}

//! Shard handle and upward signals
//!
//! A [`ShardHandle`] is the cheap, cloneable face of a running
//! [`ShardConnection`](super::ShardConnection): it queues commands for the
//! connection's loop, exposes a status snapshot, and subscribes to the
//! shard's event stream (diagnostics, raw envelopes, ready).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;

use super::ShardHealth;
use crate::error::GatewayError;
use crate::gateway::Envelope;
use crate::presence::Presence;

/// Requests accepted by a connection's run loop
#[derive(Debug, Clone)]
pub enum ShardCommand {
    SetPresence(Presence),
    /// Close with 1000, drop the session and stop permanently
    Disconnect { reason: String },
}

/// How a dispatch handler failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerFailure {
    Error(String),
    Panic(String),
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(message) => write!(f, "error: {message}"),
            Self::Panic(message) => write!(f, "panic: {message}"),
        }
    }
}

/// Diagnostic stream entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Routine protocol progress (connecting, identifying, acks, ...)
    Message(String),
    /// Opcode this connection does not handle (development mode only)
    UnknownOpcode { op: u8 },
    /// Frame that did not decode as an envelope (development mode only)
    MalformedEnvelope { error: String },
    /// Transport failed to open, send or receive
    Transport { error: String },
    /// A dispatch handler returned an error or panicked
    HandlerFailed {
        event_name: String,
        failure: HandlerFailure,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(message) => f.write_str(message),
            Self::UnknownOpcode { op } => write!(f, "Received unknown Gateway with opcode {op}"),
            Self::MalformedEnvelope { error } => write!(f, "Malformed envelope: {error}"),
            Self::Transport { error } => write!(f, "Transport error: {error}"),
            Self::HandlerFailed {
                event_name,
                failure,
            } => write!(f, "Handler for {event_name} failed with {failure}"),
        }
    }
}

/// Signals published by a shard
#[derive(Debug, Clone)]
pub enum ShardEvent {
    Debug(Diagnostic),
    /// Every decoded envelope, before it is acted on
    Raw(Arc<Envelope>),
    /// Emitted once, after the first session settles
    Ready,
}

/// Point-in-time view of a connection
#[derive(Debug, Clone, PartialEq)]
pub struct ShardStatus {
    pub state: ShardHealth,
    /// Last heartbeat round trip; reset on disconnect
    pub latency: Option<Duration>,
    pub session_id: Option<String>,
    pub sequence: Option<u64>,
    /// When the current transport reached Ready
    pub connected_at: Option<Instant>,
}

impl Default for ShardStatus {
    fn default() -> Self {
        Self {
            state: ShardHealth::Disconnected,
            latency: None,
            session_id: None,
            sequence: None,
            connected_at: None,
        }
    }
}

impl ShardStatus {
    /// Time since the shard last became Ready
    pub fn uptime(&self) -> Option<Duration> {
        self.connected_at.map(|at| at.elapsed())
    }
}

#[derive(Debug, Clone)]
pub struct ShardHandle {
    shard_id: u32,
    commands: mpsc::UnboundedSender<ShardCommand>,
    status: watch::Receiver<ShardStatus>,
    events: broadcast::Sender<ShardEvent>,
}

impl ShardHandle {
    pub(crate) fn new(
        shard_id: u32,
        commands: mpsc::UnboundedSender<ShardCommand>,
        status: watch::Receiver<ShardStatus>,
        events: broadcast::Sender<ShardEvent>,
    ) -> Self {
        Self {
            shard_id,
            commands,
            status,
            events,
        }
    }

    pub fn id(&self) -> u32 {
        self.shard_id
    }

    pub fn status(&self) -> ShardStatus {
        self.status.borrow().clone()
    }

    pub fn latency(&self) -> Option<Duration> {
        self.status.borrow().latency
    }

    /// Receiver that observes every status change
    pub fn watch_status(&self) -> watch::Receiver<ShardStatus> {
        self.status.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShardEvent> {
        self.events.subscribe()
    }

    /// Send a presence update now and use it for future identifies
    pub fn set_presence(&self, presence: Presence) -> Result<(), GatewayError> {
        self.command(ShardCommand::SetPresence(presence))
    }

    /// Close the shard for good; no reconnect follows
    pub fn disconnect(&self, reason: impl Into<String>) -> Result<(), GatewayError> {
        self.command(ShardCommand::Disconnect {
            reason: reason.into(),
        })
    }

    /// Resolves once the connection has stopped permanently
    pub async fn stopped(&self) {
        let mut status = self.status.clone();
        // Sender dropped means the run loop is gone as well
        let _ = status.wait_for(|s| s.state == ShardHealth::Stopped).await;
    }

    fn command(&self, command: ShardCommand) -> Result<(), GatewayError> {
        self.commands
            .send(command)
            .map_err(|_| GatewayError::ShardStopped {
                shard_id: self.shard_id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_render_readably() {
        let failed = Diagnostic::HandlerFailed {
            event_name: "MESSAGE_CREATE".to_string(),
            failure: HandlerFailure::Panic("boom".to_string()),
        };
        assert_eq!(
            failed.to_string(),
            "Handler for MESSAGE_CREATE failed with panic: boom"
        );
        assert_eq!(
            Diagnostic::UnknownOpcode { op: 42 }.to_string(),
            "Received unknown Gateway with opcode 42"
        );
    }

    #[tokio::test]
    async fn commands_fail_once_loop_is_gone() {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (_status_tx, status) = watch::channel(ShardStatus::default());
        let (events, _) = broadcast::channel(4);
        let handle = ShardHandle::new(7, commands, status, events);

        drop(receiver);
        let err = handle.disconnect("test").unwrap_err();
        assert!(matches!(err, GatewayError::ShardStopped { shard_id: 7 }));
    }

    #[test]
    fn stopped_resolves_only_after_stop() {
        let (commands, _receiver) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(ShardStatus::default());
        let (events, _) = broadcast::channel(4);
        let handle = ShardHandle::new(0, commands, status, events);

        let mut stopped = tokio_test::task::spawn(handle.stopped());
        tokio_test::assert_pending!(stopped.poll());

        status_tx.send_modify(|s| s.state = ShardHealth::Ready);
        tokio_test::assert_pending!(stopped.poll());

        status_tx.send_modify(|s| s.state = ShardHealth::Stopped);
        assert!(stopped.is_woken());
        tokio_test::assert_ready!(stopped.poll());
    }
}

//! Raw bidirectional message transport
//!
//! The shard connection only sees text frames and close frames. Each
//! connect call yields a fresh transport; a closed transport is dropped,
//! never reused.

mod websocket;

pub use websocket::{WebSocketConnector, WebSocketTransport};

use crate::error::BoxError;
use async_trait::async_trait;

/// Close frame received from the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    pub code: u16,
    pub reason: String,
}

/// Frames relevant to the gateway protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close(Option<CloseFrame>),
}

/// One open connection to the gateway
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> Result<(), BoxError>;

    /// Next frame, or None once the underlying stream has ended
    async fn recv(&mut self) -> Option<Result<Frame, BoxError>>;

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), BoxError>;
}

/// Opens transports; one call per (re)connect
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, BoxError>;
}

//! Liquid Gateway
//!
//! A sharded Discord gateway client: one long-lived connection per shard
//! with the Hello/Identify/Resume handshake, heartbeating, session
//! recovery and dispatch to registered handlers. The binary runs a pool
//! of shards and forwards selected dispatches to NATS JetStream.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod health;
pub mod metrics;
pub mod nats;
pub mod presence;
pub mod shard;
pub mod transport;

pub use client::{Client, ClientOptions};
pub use error::GatewayError;
pub use events::{EventHandler, EventRegistry};
pub use shard::{ShardConnection, ShardEvent, ShardHandle, ShardPool};

//! NATS JetStream integration
//!
//! Publishes forwarded gateway dispatches to NATS streams

mod forwarder;
mod publisher;

pub use forwarder::NatsForwarder;
pub use publisher::{streams, subject_for, subjects, NatsPublisher};

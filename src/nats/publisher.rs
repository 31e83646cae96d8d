//! NATS event publisher
//!
//! Publishes serialized dispatches to NATS JetStream

use crate::error::GatewayError;
use crate::events::GatewayEvent;
use async_nats::jetstream::{self, Context as JsContext};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Stream names
pub mod streams {
    /// Commands stream for slash command interactions
    pub const COMMANDS: &str = "COMMANDS";
    /// Events stream for every other forwarded dispatch
    pub const EVENTS: &str = "EVENTS";
}

/// Subject prefixes for routing
pub mod subjects {
    /// Interactions: commands.interaction
    pub const COMMANDS: &str = "commands";
    /// Guild events: events.guild.{event_type}
    pub const GUILD_EVENTS: &str = "events.guild";
    /// Member events: events.member.{event_type}
    pub const MEMBER_EVENTS: &str = "events.member";
}

/// Subject an event is published on
pub fn subject_for(event_type: &str) -> String {
    match event_type {
        "interaction.create" => format!("{}.interaction", subjects::COMMANDS),
        "guild.join" => format!("{}.join", subjects::GUILD_EVENTS),
        "guild.leave" => format!("{}.leave", subjects::GUILD_EVENTS),
        "guild.update" => format!("{}.update", subjects::GUILD_EVENTS),
        "member.join" => format!("{}.join", subjects::MEMBER_EVENTS),
        "member.leave" => format!("{}.leave", subjects::MEMBER_EVENTS),
        "member.update" => format!("{}.update", subjects::MEMBER_EVENTS),
        other => format!("events.{}", other.replace('.', "_")),
    }
}

/// NATS publisher for gateway events
pub struct NatsPublisher {
    jetstream: JsContext,
    connected: AtomicBool,
    messages_published: AtomicU64,
    publish_failures: AtomicU64,
}

impl NatsPublisher {
    /// Connect to NATS server
    pub async fn connect(servers: &str) -> Result<Arc<Self>, GatewayError> {
        info!(servers, "Connecting to NATS");

        let client = async_nats::connect(servers)
            .await
            .map_err(|e| GatewayError::NatsConnectionFailed(Box::new(e)))?;

        let jetstream = jetstream::new(client);

        info!("Connected to NATS JetStream");

        Ok(Arc::new(Self {
            jetstream,
            connected: AtomicBool::new(true),
            messages_published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
        }))
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Get total messages published
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    /// Get total publish failures
    pub fn publish_failures(&self) -> u64 {
        self.publish_failures.load(Ordering::Relaxed)
    }

    /// Publish a gateway event to the appropriate stream
    pub async fn publish_event(&self, event: &GatewayEvent) -> Result<(), GatewayError> {
        let subject = subject_for(&event.event_type);
        let payload = serde_json::to_vec(event).map_err(|source| GatewayError::SerializationFailed {
            payload: event.event_type.clone(),
            shard_id: event.shard_id,
            source,
        })?;

        debug!(
            event_type = %event.event_type,
            subject,
            event_id = %event.event_id,
            "Publishing event"
        );

        let result = match self.jetstream.publish(subject.clone(), payload.into()).await {
            Ok(ack) => ack.await.map_err(|e| Box::new(e) as crate::error::BoxError),
            Err(e) => Err(Box::new(e) as crate::error::BoxError),
        };

        match result {
            Ok(ack) => {
                self.messages_published.fetch_add(1, Ordering::Relaxed);
                debug!(
                    subject,
                    stream = %ack.stream,
                    seq = ack.sequence,
                    "Event published"
                );
                Ok(())
            }
            Err(source) => {
                self.publish_failures.fetch_add(1, Ordering::Relaxed);
                warn!(subject, error = %source, "Failed to publish event");
                Err(GatewayError::NatsPublishFailed { subject, source })
            }
        }
    }

    /// Ensure streams exist with correct configuration
    pub async fn ensure_streams(&self) -> Result<(), GatewayError> {
        use async_nats::jetstream::stream::{Config, RetentionPolicy, StorageType};

        // COMMANDS - memory storage, 60s retention for fast command processing
        // EVENTS - memory storage, 5min retention for event processing
        let configs = [
            (streams::COMMANDS, "commands.>", 60),
            (streams::EVENTS, "events.>", 300),
        ];

        for (name, subjects, max_age_secs) in configs {
            let config = Config {
                name: name.to_string(),
                subjects: vec![subjects.to_string()],
                retention: RetentionPolicy::Limits,
                max_age: std::time::Duration::from_secs(max_age_secs),
                storage: StorageType::Memory,
                ..Default::default()
            };

            match self.jetstream.create_stream(config).await {
                Ok(_) => info!(stream = name, "Created stream"),
                Err(e) if e.to_string().contains("already in use") => {
                    debug!(stream = name, "Stream already exists");
                }
                Err(e) => {
                    error!(stream = name, error = %e, "Failed to create stream");
                    return Err(GatewayError::NatsConnectionFailed(Box::new(e)));
                }
            }
        }

        info!("NATS streams configured");
        Ok(())
    }

    /// Graceful shutdown
    pub async fn close(&self) {
        info!("Closing NATS connection");
        self.connected.store(false, Ordering::SeqCst);
        // async-nats handles cleanup on drop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_interaction() {
        assert_eq!(subject_for("interaction.create"), "commands.interaction");
    }

    #[test]
    fn test_route_guild_and_member_events() {
        assert_eq!(subject_for("guild.join"), "events.guild.join");
        assert_eq!(subject_for("member.leave"), "events.member.leave");
    }

    #[test]
    fn test_route_unmapped_event() {
        assert_eq!(subject_for("message_create"), "events.message_create");
        assert_eq!(subject_for("a.b"), "events.a_b");
    }

    #[test]
    fn test_stream_constants() {
        assert_eq!(streams::COMMANDS, "COMMANDS");
        assert_eq!(streams::EVENTS, "EVENTS");
    }
}

//! Domain error types for the shard gateway
//!
//! main.rs is the ONLY module allowed to use anyhow::Result (process boundary).
//! All library code returns Result<T, GatewayError>.

use thiserror::Error;

/// Boxed error used at collaborator seams (transport, broker, handlers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Gateway domain errors
///
/// Every variant carries structured context fields for diagnostics.
/// Transport and session failures are recovered by the shard's reconnect
/// loop; only `Config` and `Registry` are fatal, and only at startup.
///
/// Example log output:
/// ```text
/// GatewayError::HelloTimeout { shard_id: 3, timeout_ms: 20000 }
/// → "shard 3 received no Hello within 20000ms"
/// ```
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Opening a transport to the gateway failed
    #[error("failed to connect to gateway at '{url}'")]
    Connect {
        url: String,
        #[source]
        source: BoxError,
    },

    /// An established transport failed while sending or receiving
    #[error("transport error on shard {shard_id}")]
    Transport {
        shard_id: u32,
        #[source]
        source: BoxError,
    },

    /// A received text frame was not a valid gateway envelope
    #[error("malformed envelope on shard {shard_id}")]
    MalformedEnvelope {
        shard_id: u32,
        #[source]
        source: serde_json::Error,
    },

    /// Building an outgoing request or broker payload failed
    #[error("serialization failed for {payload} on shard {shard_id}")]
    SerializationFailed {
        payload: String,
        shard_id: u32,
        #[source]
        source: serde_json::Error,
    },

    /// Server sent no Hello within the bounded wait after the transport opened
    #[error("shard {shard_id} received no Hello within {timeout_ms}ms")]
    HelloTimeout { shard_id: u32, timeout_ms: u64 },

    /// The shard's run loop has stopped and no longer accepts commands
    #[error("shard {shard_id} is stopped")]
    ShardStopped { shard_id: u32 },

    /// Handler registry population failed (fatal at startup)
    #[error("event registry error: {0}")]
    Registry(String),

    /// NATS publish failed for a specific subject
    #[error("NATS publish failed for subject '{subject}'")]
    NatsPublishFailed {
        subject: String,
        #[source]
        source: BoxError,
    },

    /// NATS connection failed
    #[error("NATS connection failed")]
    NatsConnectionFailed(#[source] BoxError),

    /// Prometheus recorder could not be installed
    #[error("metrics recorder installation failed: {0}")]
    MetricsInstall(String),

    /// Configuration error (environment variable missing or invalid)
    #[error("configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Returns a static label string suitable for Prometheus metrics.
    ///
    /// Used as the `error_type` label on `gateway_errors_total` counter.
    pub fn error_type_label(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Transport { .. } => "transport",
            Self::MalformedEnvelope { .. } => "malformed_envelope",
            Self::SerializationFailed { .. } => "serialization",
            Self::HelloTimeout { .. } => "hello_timeout",
            Self::ShardStopped { .. } => "shard_stopped",
            Self::Registry(_) => "registry",
            Self::NatsPublishFailed { .. } => "nats_publish",
            Self::NatsConnectionFailed(_) => "nats_connection",
            Self::MetricsInstall(_) => "metrics_install",
            Self::Config(_) => "config",
        }
    }

    /// True for failures the reconnect loop recovers from on its own.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::Transport { .. }
                | Self::MalformedEnvelope { .. }
                | Self::HelloTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_error() -> BoxError {
        Box::new(std::io::Error::new(std::io::ErrorKind::Other, "test"))
    }

    fn json_error() -> serde_json::Error {
        serde_json::from_str::<()>("invalid").unwrap_err()
    }

    #[test]
    fn every_variant_has_distinct_error_type_label() {
        let labels = [
            GatewayError::Connect {
                url: "wss://gateway.discord.gg".to_string(),
                source: test_error(),
            }
            .error_type_label(),
            GatewayError::Transport {
                shard_id: 0,
                source: test_error(),
            }
            .error_type_label(),
            GatewayError::MalformedEnvelope {
                shard_id: 0,
                source: json_error(),
            }
            .error_type_label(),
            GatewayError::SerializationFailed {
                payload: "identify".to_string(),
                shard_id: 0,
                source: json_error(),
            }
            .error_type_label(),
            GatewayError::HelloTimeout {
                shard_id: 0,
                timeout_ms: 20_000,
            }
            .error_type_label(),
            GatewayError::ShardStopped { shard_id: 0 }.error_type_label(),
            GatewayError::Registry("test".to_string()).error_type_label(),
            GatewayError::NatsPublishFailed {
                subject: "test".to_string(),
                source: test_error(),
            }
            .error_type_label(),
            GatewayError::NatsConnectionFailed(test_error()).error_type_label(),
            GatewayError::MetricsInstall("test".to_string()).error_type_label(),
            GatewayError::Config("test".to_string()).error_type_label(),
        ];

        let mut unique = labels.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(labels.len(), unique.len(), "Duplicate error_type_label found");
    }

    #[test]
    fn error_messages_contain_context() {
        let err = GatewayError::HelloTimeout {
            shard_id: 3,
            timeout_ms: 20_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("shard 3"), "message should contain shard_id");
        assert!(msg.contains("20000ms"), "message should contain timeout");

        let err = GatewayError::NatsPublishFailed {
            subject: "commands.interaction".to_string(),
            source: test_error(),
        };
        assert!(err.to_string().contains("commands.interaction"));
    }

    #[test]
    fn config_error_preserves_message() {
        let err = GatewayError::Config("DISCORD_TOKEN must be set".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: DISCORD_TOKEN must be set"
        );
    }

    #[test]
    fn only_session_level_failures_are_recoverable() {
        assert!(GatewayError::HelloTimeout { shard_id: 0, timeout_ms: 1 }.is_recoverable());
        assert!(GatewayError::Transport { shard_id: 0, source: test_error() }.is_recoverable());
        assert!(!GatewayError::Config("x".to_string()).is_recoverable());
        assert!(!GatewayError::Registry("x".to_string()).is_recoverable());
    }
}

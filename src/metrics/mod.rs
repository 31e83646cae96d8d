//! Prometheus metrics module
//!
//! Recording goes through the `metrics` facade, so the free functions below
//! are no-ops until [`GatewayMetrics::install`] sets a recorder (as in
//! tests and library use without the binary).

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Duration;

use crate::error::GatewayError;

/// Installed Prometheus recorder
#[derive(Clone)]
pub struct GatewayMetrics {
    handle: Arc<PrometheusHandle>,
}

impl GatewayMetrics {
    /// Install the Prometheus recorder process-wide
    pub fn install() -> Result<Self, GatewayError> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| GatewayError::MetricsInstall(e.to_string()))?;

        Self::register_metrics();

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    fn register_metrics() {
        describe_counter!(
            "gateway_events_received_total",
            Unit::Count,
            "Dispatch events received from the gateway"
        );
        describe_counter!(
            "gateway_heartbeats_sent_total",
            Unit::Count,
            "Heartbeats sent to the gateway"
        );
        describe_counter!(
            "gateway_reconnects_total",
            Unit::Count,
            "Transport reconnects by reason"
        );
        describe_counter!(
            "gateway_handler_failures_total",
            Unit::Count,
            "Dispatch handlers that returned an error or panicked"
        );
        describe_counter!(
            "gateway_events_routed_total",
            Unit::Count,
            "Total events routed to NATS"
        );
        describe_counter!(
            "gateway_route_failures_total",
            Unit::Count,
            "Failed event routes to NATS"
        );
        describe_counter!("gateway_errors_total", Unit::Count, "Total gateway errors");

        describe_histogram!(
            "gateway_heartbeat_latency_seconds",
            Unit::Seconds,
            "Heartbeat round trip"
        );
        describe_histogram!(
            "gateway_event_route_duration_seconds",
            Unit::Seconds,
            "Time to route event to NATS"
        );

        describe_gauge!(
            "gateway_shards_ready",
            Unit::Count,
            "Number of shards in ready state"
        );
        describe_gauge!(
            "gateway_guilds_total",
            Unit::Count,
            "Guilds per shard"
        );
        describe_gauge!(
            "gateway_nats_connected",
            Unit::Count,
            "NATS connection status (1=connected, 0=disconnected)"
        );
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Record a dispatch received
pub fn record_dispatch(shard_id: u32, event_name: &str) {
    counter!(
        "gateway_events_received_total",
        "shard_id" => shard_id.to_string(),
        "event_type" => event_name.to_ascii_lowercase()
    )
    .increment(1);
}

pub fn record_heartbeat_sent(shard_id: u32) {
    counter!(
        "gateway_heartbeats_sent_total",
        "shard_id" => shard_id.to_string()
    )
    .increment(1);
}

/// Record a heartbeat ack and its round trip
pub fn record_heartbeat_ack(shard_id: u32, latency: Duration) {
    histogram!(
        "gateway_heartbeat_latency_seconds",
        "shard_id" => shard_id.to_string()
    )
    .record(latency.as_secs_f64());

    gauge!(
        "gateway_last_heartbeat_timestamp",
        "shard_id" => shard_id.to_string()
    )
    .set(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64()),
    );
}

pub fn record_reconnect(shard_id: u32, reason: &'static str) {
    counter!(
        "gateway_reconnects_total",
        "shard_id" => shard_id.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_handler_failure(shard_id: u32, event_name: &str) {
    counter!(
        "gateway_handler_failures_total",
        "shard_id" => shard_id.to_string(),
        "event_type" => event_name.to_ascii_lowercase()
    )
    .increment(1);
}

/// Record successful route to NATS
pub fn record_route_success(shard_id: u32, duration: Duration) {
    counter!(
        "gateway_events_routed_total",
        "shard_id" => shard_id.to_string()
    )
    .increment(1);

    histogram!(
        "gateway_event_route_duration_seconds",
        "shard_id" => shard_id.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record failed route
pub fn record_route_failure(shard_id: u32) {
    counter!(
        "gateway_route_failures_total",
        "shard_id" => shard_id.to_string()
    )
    .increment(1);
}

/// Record gateway error, labelled by `GatewayError::error_type_label`
pub fn record_error(shard_id: u32, error_type: &'static str) {
    counter!(
        "gateway_errors_total",
        "shard_id" => shard_id.to_string(),
        "error_type" => error_type
    )
    .increment(1);
}

/// Set guild count for a shard
pub fn set_guilds(shard_id: u32, count: u64) {
    gauge!(
        "gateway_guilds_total",
        "shard_id" => shard_id.to_string()
    )
    .set(count as f64);
}

/// Set shards ready count
pub fn set_shards_ready(pool_id: u32, count: usize) {
    gauge!(
        "gateway_shards_ready",
        "pool_id" => pool_id.to_string()
    )
    .set(count as f64);
}

/// Set NATS connection status
pub fn set_nats_connected(connected: bool) {
    gauge!("gateway_nats_connected").set(if connected { 1.0 } else { 0.0 });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_a_noop() {
        record_dispatch(0, "MESSAGE_CREATE");
        record_heartbeat_ack(0, Duration::from_millis(42));
        record_reconnect(0, "closed");
        record_error(0, "transport");
        set_nats_connected(false);
    }
}

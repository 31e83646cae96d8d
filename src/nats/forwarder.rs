//! Dispatch handler that forwards events to NATS

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use super::NatsPublisher;
use crate::client::Client;
use crate::error::BoxError;
use crate::events::{serialize_event, EventHandler};
use crate::gateway::Envelope;
use crate::metrics;
use crate::shard::ShardHandle;

/// Publishes every dispatch it is registered for
pub struct NatsForwarder {
    publisher: Arc<NatsPublisher>,
}

impl NatsForwarder {
    pub fn new(publisher: Arc<NatsPublisher>) -> Arc<Self> {
        Arc::new(Self { publisher })
    }
}

#[async_trait]
impl EventHandler for NatsForwarder {
    async fn run(
        &self,
        envelope: Arc<Envelope>,
        shard: ShardHandle,
        client: Client,
    ) -> Result<(), BoxError> {
        let shard_id = shard.id();
        let Some(payload) = serialize_event(&envelope, shard_id) else {
            return Ok(());
        };

        let start = Instant::now();
        match self.publisher.publish_event(&payload).await {
            Ok(()) => {
                client.state().record_route(shard_id);
                metrics::record_route_success(shard_id, start.elapsed());
                Ok(())
            }
            Err(e) => {
                client.state().record_route_failure(shard_id);
                metrics::record_route_failure(shard_id);
                metrics::record_error(shard_id, e.error_type_label());
                Err(e.into())
            }
        }
    }
}

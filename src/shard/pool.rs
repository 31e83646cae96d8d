//! Shard pool implementation
//!
//! Owns the shard connections run by this process. Each connection gets
//! its own task; the pool only starts them and asks them to stop.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::{ShardConnection, ShardHandle, ShardState};
use crate::client::Client;
use crate::error::GatewayError;
use crate::events::EventRegistry;
use crate::transport::Connector;

/// Number of shards per gateway process (pool)
pub const SHARDS_PER_POOL: u32 = 25;

/// Shard ids owned by `pool_id` out of `total_shards`
pub fn pool_shard_range(pool_id: u32, total_shards: u32) -> Range<u32> {
    let start = pool_id.saturating_mul(SHARDS_PER_POOL).min(total_shards);
    let end = pool_id
        .saturating_add(1)
        .saturating_mul(SHARDS_PER_POOL)
        .min(total_shards);
    start..end
}

/// Shard pool managing multiple gateway shards
pub struct ShardPool {
    pool_id: u32,
    connections: Vec<ShardConnection>,
    handles: Vec<ShardHandle>,
    state: ShardState,
}

impl ShardPool {
    /// Create one connection per shard tracked in the client's state
    ///
    /// # Arguments
    /// * `client` - Shared client context (options + pool state)
    /// * `registry` - Dispatch handlers, shared by every shard
    /// * `connector` - Opens transports for every (re)connect
    pub fn new(
        client: Client,
        registry: Arc<EventRegistry>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, GatewayError> {
        let state = client.state().clone();
        let pool_id = state.pool_id();
        let shard_ids = state.shard_ids();
        let total_shards = client.options().shard_count;

        if shard_ids.is_empty() {
            return Err(GatewayError::Config(format!(
                "pool {pool_id} owns no shards out of {total_shards}"
            )));
        }
        if let Some(&shard_id) = shard_ids.iter().find(|&&id| id >= total_shards) {
            return Err(GatewayError::Config(format!(
                "shard {shard_id} is outside TOTAL_SHARDS={total_shards}"
            )));
        }

        info!(
            pool_id,
            first_shard = shard_ids[0],
            last_shard = shard_ids[shard_ids.len() - 1],
            shard_count = shard_ids.len(),
            handlers = registry.len(),
            "Creating shard pool"
        );

        let connections: Vec<ShardConnection> = shard_ids
            .into_iter()
            .map(|shard_id| {
                ShardConnection::new(
                    shard_id,
                    client.clone(),
                    Arc::clone(&registry),
                    Arc::clone(&connector),
                )
            })
            .collect();
        let handles = connections.iter().map(ShardConnection::handle).collect();

        Ok(Self {
            pool_id,
            connections,
            handles,
            state,
        })
    }

    pub fn pool_id(&self) -> u32 {
        self.pool_id
    }

    /// Get shared state (for health checks)
    pub fn state(&self) -> ShardState {
        self.state.clone()
    }

    /// Handles for every shard, usable after `run` consumes the pool
    pub fn handles(&self) -> Vec<ShardHandle> {
        self.handles.clone()
    }

    /// Run all shards in the pool
    ///
    /// Spawns a task per shard and waits for all of them to stop.
    pub async fn run(self) {
        let mut tasks = Vec::with_capacity(self.connections.len());

        for connection in self.connections {
            let shard_id = connection.id();
            tasks.push((shard_id, tokio::spawn(connection.run())));
        }

        for (shard_id, task) in tasks {
            if let Err(e) = task.await {
                error!(shard_id, error = %e, "Shard task failed");
            }
        }

        info!(pool_id = self.pool_id, "Shard pool shut down");
    }
}

/// Ask every shard to disconnect, waiting up to `grace` for them to stop
pub async fn shutdown(handles: &[ShardHandle], grace: Duration) {
    for handle in handles {
        if let Err(e) = handle.disconnect("Shutting down") {
            warn!(shard_id = handle.id(), error = %e, "Shard already stopped");
        }
    }

    let all_stopped = futures_util::future::join_all(handles.iter().map(ShardHandle::stopped));
    if tokio::time::timeout(grace, all_stopped).await.is_err() {
        warn!(grace_ms = grace.as_millis() as u64, "Shards did not stop within grace period");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientOptions;
    use crate::transport::WebSocketConnector;

    #[test]
    fn test_shards_per_pool_constant() {
        assert_eq!(SHARDS_PER_POOL, 25);
    }

    #[test]
    fn test_shard_range_calculation() {
        // Pool 0: shards 0-24
        assert_eq!(pool_shard_range(0, 100), 0..25);
        // Pool 3: shards 75-99
        assert_eq!(pool_shard_range(3, 100), 75..100);
        // Partial last pool
        assert_eq!(pool_shard_range(1, 30), 25..30);
        // Pool beyond the shard count owns nothing
        assert!(pool_shard_range(4, 100).is_empty());
    }

    #[test]
    fn rejects_shards_outside_total() {
        let state = ShardState::new(0, [0, 5].into_iter(), 2);
        let client = Client::new(ClientOptions::new("token", 2), state);
        let result = ShardPool::new(
            client,
            Arc::new(EventRegistry::new()),
            Arc::new(WebSocketConnector),
        );
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[test]
    fn one_connection_per_shard() {
        let state = ShardState::new(1, pool_shard_range(1, 30), 30);
        let client = Client::new(ClientOptions::new("token", 30), state);
        let pool = ShardPool::new(
            client,
            Arc::new(EventRegistry::new()),
            Arc::new(WebSocketConnector),
        )
        .unwrap();

        let ids: Vec<u32> = pool.handles().iter().map(ShardHandle::id).collect();
        assert_eq!(ids, vec![25, 26, 27, 28, 29]);
        assert_eq!(pool.pool_id(), 1);
    }
}

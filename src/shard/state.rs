//! Shard state tracking
//!
//! Shared, pool-wide view of every shard this process runs. Connections
//! report into it (health, heartbeat registration, counters); the health
//! endpoints and handlers read from it.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle state of a shard connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardHealth {
    /// No transport; a reconnect may follow
    Disconnected,
    /// Opening a transport
    Connecting,
    /// Transport open, waiting for Hello
    AwaitingHello,
    /// Identify sent, waiting for READY
    Identifying,
    /// Resume sent, waiting for RESUMED
    Resuming,
    /// Session established and receiving events
    Ready,
    /// Permanently disconnected on request
    Stopped,
}

impl ShardHealth {
    /// Returns true if the shard is healthy
    pub fn is_healthy(&self) -> bool {
        matches!(self, ShardHealth::Ready | ShardHealth::Resuming)
    }

    /// Returns true if the shard is ready to receive events
    pub fn is_ready(&self) -> bool {
        matches!(self, ShardHealth::Ready)
    }
}

/// State for a single shard
#[derive(Debug)]
pub struct ShardStateEntry {
    pub health: ShardHealth,
    pub guilds: u64,
    pub events_received: AtomicU64,
    pub events_routed: AtomicU64,
    pub route_failures: AtomicU64,
    pub reconnects: AtomicU64,
    /// Interval of the shard's live heartbeat timer, if one is registered
    pub heartbeat_interval: Option<Duration>,
    pub latency: Option<Duration>,
    pub last_heartbeat_ack: Option<Instant>,
    pub connected_at: Option<Instant>,
}

impl Default for ShardStateEntry {
    fn default() -> Self {
        Self {
            health: ShardHealth::Disconnected,
            guilds: 0,
            events_received: AtomicU64::new(0),
            events_routed: AtomicU64::new(0),
            route_failures: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            heartbeat_interval: None,
            latency: None,
            last_heartbeat_ack: None,
            connected_at: None,
        }
    }
}

/// Per-shard summary for readiness reporting
#[derive(Debug, Clone, Serialize)]
pub struct ShardSummary {
    pub shard_id: u32,
    pub health: ShardHealth,
    pub guilds: u64,
    pub latency_ms: Option<u64>,
}

/// Shared state across all shards in a pool
#[derive(Debug, Clone)]
pub struct ShardState {
    inner: Arc<ShardStateInner>,
}

#[derive(Debug)]
struct ShardStateInner {
    pool_id: u32,
    shards: DashMap<u32, ShardStateEntry>,
    total_shards: u32,
}

impl ShardState {
    /// Create a new shard state tracker
    pub fn new(pool_id: u32, shard_ids: impl Iterator<Item = u32>, total_shards: u32) -> Self {
        let shards = DashMap::new();
        for shard_id in shard_ids {
            shards.insert(shard_id, ShardStateEntry::default());
        }

        Self {
            inner: Arc::new(ShardStateInner {
                pool_id,
                shards,
                total_shards,
            }),
        }
    }

    pub fn pool_id(&self) -> u32 {
        self.inner.pool_id
    }

    /// Get total shards across the cluster
    pub fn total_shards(&self) -> u32 {
        self.inner.total_shards
    }

    /// Shard ids tracked by this pool, ascending
    pub fn shard_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.inner.shards.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Update shard health
    pub fn set_health(&self, shard_id: u32, health: ShardHealth) {
        if let Some(mut entry) = self.inner.shards.get_mut(&shard_id) {
            entry.health = health;
            match health {
                ShardHealth::Ready if entry.connected_at.is_none() => {
                    entry.connected_at = Some(Instant::now());
                }
                ShardHealth::Disconnected | ShardHealth::Stopped => {
                    entry.connected_at = None;
                    entry.latency = None;
                }
                _ => {}
            }
        }
    }

    /// Update shard guild count
    pub fn set_guilds(&self, shard_id: u32, count: u64) {
        if let Some(mut entry) = self.inner.shards.get_mut(&shard_id) {
            entry.guilds = count;
        }
    }

    /// Apply a guild join (+1) or leave (-1), returning the new count
    pub fn adjust_guilds(&self, shard_id: u32, delta: i64) -> Option<u64> {
        let mut entry = self.inner.shards.get_mut(&shard_id)?;
        entry.guilds = entry.guilds.saturating_add_signed(delta);
        Some(entry.guilds)
    }

    /// Increment event received counter
    pub fn record_event(&self, shard_id: u32) {
        if let Some(entry) = self.inner.shards.get(&shard_id) {
            entry.events_received.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Increment event routed counter
    pub fn record_route(&self, shard_id: u32) {
        if let Some(entry) = self.inner.shards.get(&shard_id) {
            entry.events_routed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Increment route failure counter
    pub fn record_route_failure(&self, shard_id: u32) {
        if let Some(entry) = self.inner.shards.get(&shard_id) {
            entry.route_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_reconnect(&self, shard_id: u32) {
        if let Some(entry) = self.inner.shards.get(&shard_id) {
            entry.reconnects.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a heartbeat acknowledgement and its round trip
    pub fn record_heartbeat_ack(&self, shard_id: u32, latency: Option<Duration>) {
        if let Some(mut entry) = self.inner.shards.get_mut(&shard_id) {
            entry.last_heartbeat_ack = Some(Instant::now());
            if latency.is_some() {
                entry.latency = latency;
            }
        }
    }

    /// A shard started its heartbeat timer
    pub fn heartbeat_started(&self, shard_id: u32, interval: Duration) {
        if let Some(mut entry) = self.inner.shards.get_mut(&shard_id) {
            entry.heartbeat_interval = Some(interval);
        }
    }

    /// A shard cancelled its heartbeat timer
    pub fn heartbeat_stopped(&self, shard_id: u32) {
        if let Some(mut entry) = self.inner.shards.get_mut(&shard_id) {
            entry.heartbeat_interval = None;
            entry.latency = None;
        }
    }

    pub fn heartbeat_interval(&self, shard_id: u32) -> Option<Duration> {
        self.inner
            .shards
            .get(&shard_id)
            .and_then(|e| e.heartbeat_interval)
    }

    /// Number of shards with a registered heartbeat timer
    pub fn active_heartbeats(&self) -> usize {
        self.inner
            .shards
            .iter()
            .filter(|e| e.heartbeat_interval.is_some())
            .count()
    }

    /// Get health for a specific shard
    pub fn get_health(&self, shard_id: u32) -> Option<ShardHealth> {
        self.inner.shards.get(&shard_id).map(|e| e.health)
    }

    pub fn latency(&self, shard_id: u32) -> Option<Duration> {
        self.inner.shards.get(&shard_id).and_then(|e| e.latency)
    }

    pub fn guilds(&self, shard_id: u32) -> Option<u64> {
        self.inner.shards.get(&shard_id).map(|e| e.guilds)
    }

    pub fn reconnects(&self, shard_id: u32) -> u64 {
        self.inner
            .shards
            .get(&shard_id)
            .map_or(0, |e| e.reconnects.load(Ordering::Relaxed))
    }

    /// Get total events received across all shards
    pub fn total_events_received(&self) -> u64 {
        self.inner
            .shards
            .iter()
            .map(|e| e.events_received.load(Ordering::Relaxed))
            .sum()
    }

    /// Get total events routed across all shards
    pub fn total_events_routed(&self) -> u64 {
        self.inner
            .shards
            .iter()
            .map(|e| e.events_routed.load(Ordering::Relaxed))
            .sum()
    }

    /// Get total guilds across all shards
    pub fn total_guilds(&self) -> u64 {
        self.inner.shards.iter().map(|e| e.guilds).sum()
    }

    /// Get count of ready shards
    pub fn ready_shards(&self) -> usize {
        self.inner
            .shards
            .iter()
            .filter(|e| e.health.is_ready())
            .count()
    }

    /// Get count of healthy shards (ready or resuming)
    pub fn healthy_shards(&self) -> usize {
        self.inner
            .shards
            .iter()
            .filter(|e| e.health.is_healthy())
            .count()
    }

    /// Get total shard count in this pool
    pub fn shard_count(&self) -> usize {
        self.inner.shards.len()
    }

    /// Check if pool is ready (at least one shard ready)
    pub fn is_ready(&self) -> bool {
        self.ready_shards() > 0
    }

    /// Check if pool is fully healthy
    pub fn is_healthy(&self) -> bool {
        self.healthy_shards() == self.shard_count()
    }

    pub fn summaries(&self) -> Vec<ShardSummary> {
        let mut summaries: Vec<ShardSummary> = self
            .inner
            .shards
            .iter()
            .map(|e| ShardSummary {
                shard_id: *e.key(),
                health: e.health,
                guilds: e.guilds,
                latency_ms: e.latency.map(|l| l.as_millis() as u64),
            })
            .collect();
        summaries.sort_unstable_by_key(|s| s.shard_id);
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ShardState {
        ShardState::new(0, 0..3, 3)
    }

    #[test]
    fn ready_and_healthy_counts() {
        let state = state();
        assert!(!state.is_ready());

        state.set_health(0, ShardHealth::Ready);
        state.set_health(1, ShardHealth::Resuming);
        assert_eq!(state.ready_shards(), 1);
        assert_eq!(state.healthy_shards(), 2);
        assert!(state.is_ready());
        assert!(!state.is_healthy());
    }

    #[test]
    fn heartbeat_registration_follows_start_and_stop() {
        let state = state();
        state.heartbeat_started(1, Duration::from_millis(41_250));
        assert_eq!(state.active_heartbeats(), 1);
        assert_eq!(state.heartbeat_interval(1), Some(Duration::from_millis(41_250)));

        state.heartbeat_stopped(1);
        assert_eq!(state.active_heartbeats(), 0);
        assert_eq!(state.heartbeat_interval(1), None);
    }

    #[test]
    fn guild_count_never_underflows() {
        let state = state();
        assert_eq!(state.adjust_guilds(0, 1), Some(1));
        assert_eq!(state.adjust_guilds(0, -1), Some(0));
        assert_eq!(state.adjust_guilds(0, -1), Some(0));
        assert_eq!(state.adjust_guilds(9, 1), None, "unknown shard");
    }

    #[test]
    fn disconnect_clears_latency() {
        let state = state();
        state.set_health(2, ShardHealth::Ready);
        state.record_heartbeat_ack(2, Some(Duration::from_millis(80)));
        assert_eq!(state.latency(2), Some(Duration::from_millis(80)));

        state.set_health(2, ShardHealth::Disconnected);
        assert_eq!(state.latency(2), None);
    }

    #[test]
    fn summaries_are_sorted() {
        let state = ShardState::new(1, [27, 25, 26].into_iter(), 30);
        let ids: Vec<u32> = state.summaries().iter().map(|s| s.shard_id).collect();
        assert_eq!(ids, vec![25, 26, 27]);
        assert_eq!(state.shard_ids(), vec![25, 26, 27]);
    }
}

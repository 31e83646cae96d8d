//! Guild membership tracking

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use super::EventHandler;
use crate::client::Client;
use crate::error::BoxError;
use crate::gateway::{event_names, Envelope};
use crate::metrics;
use crate::shard::ShardHandle;

/// Keeps per-shard guild counts in `ShardState` from GUILD_CREATE and
/// GUILD_DELETE.
///
/// Guild ids are remembered so that replays after a resume or an outage
/// (GUILD_CREATE for a guild already known) do not inflate the count.
#[derive(Debug, Default)]
pub struct GuildTracker {
    guilds: DashMap<String, u32>,
}

impl GuildTracker {
    pub const EVENTS: [&'static str; 2] = [event_names::GUILD_CREATE, event_names::GUILD_DELETE];

    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.guilds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty()
    }
}

#[async_trait]
impl EventHandler for GuildTracker {
    async fn run(
        &self,
        envelope: Arc<Envelope>,
        shard: ShardHandle,
        client: Client,
    ) -> Result<(), BoxError> {
        let shard_id = shard.id();
        let guild_id = envelope
            .d
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or("guild event without id")?
            .to_string();

        let delta = match envelope.event_name() {
            Some(event_names::GUILD_CREATE) => {
                if self.guilds.insert(guild_id.clone(), shard_id).is_some() {
                    0
                } else {
                    1
                }
            }
            Some(event_names::GUILD_DELETE) => {
                // unavailable=true is an outage, not a leave
                if envelope.d.get("unavailable").and_then(|v| v.as_bool()) == Some(true) {
                    0
                } else if self.guilds.remove(&guild_id).is_some() {
                    -1
                } else {
                    0
                }
            }
            _ => 0,
        };

        if delta != 0 {
            if let Some(count) = client.state().adjust_guilds(shard_id, delta) {
                metrics::set_guilds(shard_id, count);
                debug!(shard_id, guild_id = %guild_id, guilds = count, "Guild count changed");
            }
        }
        Ok(())
    }
}

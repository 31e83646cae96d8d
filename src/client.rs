//! Owning-client context
//!
//! [`ClientOptions`] carries the credentials and session parameters every
//! shard identifies with. [`Client`] bundles them with the pool-wide
//! [`ShardState`] and is handed to every dispatch handler.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use twilight_model::gateway::Intents;

use crate::gateway::DEFAULT_GATEWAY_URL;
use crate::presence::Presence;
use crate::shard::ShardState;

/// Default bounded wait for Hello after a transport opens
pub const DEFAULT_HELLO_TIMEOUT: Duration = Duration::from_secs(20);

/// Default settle time before the ready signal fires
pub const DEFAULT_READY_DELAY: Duration = Duration::from_millis(1_500);

/// Default member count above which guilds are sent without offline members
pub const DEFAULT_LARGE_THRESHOLD: u64 = 50;

#[derive(Clone)]
pub struct ClientOptions {
    pub token: String,
    pub intents: Intents,
    /// Total shards across every process
    pub shard_count: u32,
    /// Initial presence sent with Identify
    pub presence: Presence,
    pub large_threshold: u64,
    /// Base gateway URL used for fresh identifies
    pub gateway_url: String,
    pub hello_timeout: Duration,
    pub ready_delay: Duration,
    /// Report unknown opcodes and malformed frames on the diagnostic stream
    pub development: bool,
}

impl ClientOptions {
    pub fn new(token: impl Into<String>, shard_count: u32) -> Self {
        Self {
            token: token.into(),
            intents: Intents::GUILDS | Intents::GUILD_MEMBERS,
            shard_count,
            presence: Presence::default(),
            large_threshold: DEFAULT_LARGE_THRESHOLD,
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            hello_timeout: DEFAULT_HELLO_TIMEOUT,
            ready_delay: DEFAULT_READY_DELAY,
            development: false,
        }
    }

    pub fn with_intents(mut self, intents: Intents) -> Self {
        self.intents = intents;
        self
    }

    pub fn with_presence(mut self, presence: Presence) -> Self {
        self.presence = presence;
        self
    }

    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = url.into();
        self
    }

    pub fn with_hello_timeout(mut self, timeout: Duration) -> Self {
        self.hello_timeout = timeout;
        self
    }

    pub fn with_ready_delay(mut self, delay: Duration) -> Self {
        self.ready_delay = delay;
        self
    }

    pub fn with_large_threshold(mut self, threshold: u64) -> Self {
        self.large_threshold = threshold;
        self
    }

    pub fn with_development(mut self, development: bool) -> Self {
        self.development = development;
        self
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("shard_count", &self.shard_count)
            .field("presence", &self.presence)
            .field("large_threshold", &self.large_threshold)
            .field("gateway_url", &self.gateway_url)
            .field("hello_timeout", &self.hello_timeout)
            .field("ready_delay", &self.ready_delay)
            .field("development", &self.development)
            .finish()
    }
}

/// Shared client context
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    options: ClientOptions,
    state: ShardState,
}

impl Client {
    pub fn new(options: ClientOptions, state: ShardState) -> Self {
        Self {
            inner: Arc::new(ClientInner { options, state }),
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    pub fn state(&self) -> &ShardState {
        &self.inner.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_gateway_expectations() {
        let options = ClientOptions::new("token", 4);
        assert_eq!(options.shard_count, 4);
        assert_eq!(options.large_threshold, 50);
        assert_eq!(options.gateway_url, "wss://gateway.discord.gg");
        assert_eq!(options.hello_timeout, Duration::from_secs(20));
        assert_eq!(options.ready_delay, Duration::from_millis(1_500));
        assert!(!options.development);
        assert!(!options.intents.contains(Intents::MESSAGE_CONTENT));
    }

    #[test]
    fn debug_redacts_token() {
        let options = ClientOptions::new("super-secret", 1);
        assert!(!format!("{options:?}").contains("super-secret"));
    }
}

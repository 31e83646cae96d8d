//! Gateway configuration module
//!
//! Handles loading configuration from environment variables.

use crate::client::{
    ClientOptions, DEFAULT_HELLO_TIMEOUT, DEFAULT_LARGE_THRESHOLD, DEFAULT_READY_DELAY,
};
use crate::error::GatewayError;
use crate::gateway::{event_names, DEFAULT_GATEWAY_URL};
use crate::presence::{Activity, ActivityKind, Presence};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use twilight_model::gateway::presence::Status;
use twilight_model::gateway::Intents;

/// Dispatches forwarded to NATS when FORWARD_EVENTS is unset
pub const DEFAULT_FORWARD_EVENTS: [&str; 6] = [
    event_names::GUILD_CREATE,
    event_names::GUILD_DELETE,
    "GUILD_MEMBER_ADD",
    "GUILD_MEMBER_REMOVE",
    "GUILD_MEMBER_UPDATE",
    event_names::INTERACTION_CREATE,
];

/// Gateway configuration
#[derive(Clone)]
pub struct GatewayConfig {
    /// Discord bot token
    pub discord_token: String,

    /// Pool ID for this gateway instance (0-indexed)
    /// Each pool manages SHARDS_PER_POOL shards
    pub pool_id: u32,

    /// Total number of shards across all pools
    pub total_shards: u32,

    pub gateway_url: String,
    pub intents: Intents,
    pub presence: Presence,
    pub large_threshold: u64,
    pub hello_timeout: Duration,
    pub ready_delay: Duration,

    /// GATEWAY_ENV=development
    pub development: bool,

    /// NATS server URL(s) - comma-separated for multiple servers
    pub nats_url: Option<String>,

    /// Dispatch names forwarded to NATS
    pub forward_events: Vec<String>,

    /// Health/metrics HTTP port
    pub http_port: u16,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("discord_token", &"<redacted>")
            .field("pool_id", &self.pool_id)
            .field("total_shards", &self.total_shards)
            .field("gateway_url", &self.gateway_url)
            .field("intents", &self.intents)
            .field("development", &self.development)
            .field("nats_url", &self.nats_url)
            .field("forward_events", &self.forward_events)
            .field("http_port", &self.http_port)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |primary: &str, fallback: &str| lookup(primary).or_else(|| lookup(fallback));

        let discord_token = var("DISCORD_TOKEN", "DISCORD_BOT_TOKEN").ok_or_else(|| {
            GatewayError::Config("DISCORD_TOKEN or DISCORD_BOT_TOKEN must be set".to_string())
        })?;

        // POOL_ID replaces SHARD_ID for multi-shard pools
        let pool_id = parse_or("POOL_ID", var("POOL_ID", "SHARD_ID"), 0u32)?;
        let total_shards = parse_or("TOTAL_SHARDS", lookup("TOTAL_SHARDS"), 1u32)?;
        if total_shards == 0 {
            return Err(GatewayError::Config("TOTAL_SHARDS must be at least 1".to_string()));
        }

        let gateway_url = lookup("GATEWAY_URL").unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string());

        let intents = match lookup("GATEWAY_INTENTS") {
            Some(raw) => parse_intents(&raw)?,
            None => default_intents(),
        };

        let status = match lookup("PRESENCE_STATUS") {
            Some(raw) => parse_status(&raw)?,
            None => Status::Online,
        };
        let mut presence = Presence::new(status);
        if let Some(raw) = lookup("PRESENCE_ACTIVITY") {
            presence = presence.with_activity(parse_activity(&raw)?);
        }

        let large_threshold =
            parse_or("LARGE_THRESHOLD", lookup("LARGE_THRESHOLD"), DEFAULT_LARGE_THRESHOLD)?;
        if !(50..=250).contains(&large_threshold) {
            return Err(GatewayError::Config(
                "LARGE_THRESHOLD must be between 50 and 250".to_string(),
            ));
        }

        let hello_timeout = parse_millis("HELLO_TIMEOUT_MS", lookup("HELLO_TIMEOUT_MS"), DEFAULT_HELLO_TIMEOUT)?;
        let ready_delay = parse_millis("READY_DELAY_MS", lookup("READY_DELAY_MS"), DEFAULT_READY_DELAY)?;

        let development = lookup("GATEWAY_ENV")
            .map(|v| v.eq_ignore_ascii_case("development"))
            .unwrap_or(false);

        let nats_url = lookup("NATS_URL").filter(|v| !v.trim().is_empty());

        let forward_events = match lookup("FORWARD_EVENTS") {
            Some(raw) => parse_event_list(&raw),
            None => DEFAULT_FORWARD_EVENTS.iter().map(|s| s.to_string()).collect(),
        };

        let http_port = parse_or("HTTP_PORT", var("HTTP_PORT", "METRICS_PORT"), 9090u16)?;

        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            discord_token,
            pool_id,
            total_shards,
            gateway_url,
            intents,
            presence,
            large_threshold,
            hello_timeout,
            ready_delay,
            development,
            nats_url,
            forward_events,
            http_port,
            log_level,
        })
    }

    /// Options every shard of this process identifies with
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions::new(self.discord_token.clone(), self.total_shards)
            .with_intents(self.intents)
            .with_presence(self.presence.clone())
            .with_gateway_url(self.gateway_url.clone())
            .with_large_threshold(self.large_threshold)
            .with_hello_timeout(self.hello_timeout)
            .with_ready_delay(self.ready_delay)
            .with_development(self.development)
    }
}

/// Minimal intents: guild lifecycle and member events.
/// MESSAGE_CONTENT is privileged and not needed.
pub fn default_intents() -> Intents {
    Intents::GUILDS | Intents::GUILD_MEMBERS
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, GatewayError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| GatewayError::Config(format!("{key} must be a valid number: {e}"))),
        None => Ok(default),
    }
}

fn parse_millis(key: &str, raw: Option<String>, default: Duration) -> Result<Duration, GatewayError> {
    let ms = parse_or(key, raw, default.as_millis() as u64)?;
    Ok(Duration::from_millis(ms))
}

fn parse_intents(raw: &str) -> Result<Intents, GatewayError> {
    let bits: u64 = raw
        .trim()
        .parse()
        .map_err(|e| GatewayError::Config(format!("GATEWAY_INTENTS must be a bitmask: {e}")))?;
    Ok(Intents::from_bits_truncate(bits))
}

fn parse_status(raw: &str) -> Result<Status, GatewayError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "online" => Ok(Status::Online),
        "idle" => Ok(Status::Idle),
        "dnd" => Ok(Status::DoNotDisturb),
        "invisible" => Ok(Status::Invisible),
        other => Err(GatewayError::Config(format!(
            "PRESENCE_STATUS '{other}' is not one of online, idle, dnd, invisible"
        ))),
    }
}

/// `kind:name`, or a bare name which is shown as Playing
fn parse_activity(raw: &str) -> Result<Activity, GatewayError> {
    let (kind, name) = match raw.split_once(':') {
        Some((kind, name)) => (
            kind.parse::<ActivityKind>()
                .map_err(|e| GatewayError::Config(format!("PRESENCE_ACTIVITY: {e}")))?,
            name,
        ),
        None => (ActivityKind::Playing, raw),
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(GatewayError::Config("PRESENCE_ACTIVITY name is empty".to_string()));
    }
    Ok(Activity::new(kind, name))
}

fn parse_event_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<GatewayConfig, GatewayError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_intents_are_minimal() {
        let intents = default_intents();

        assert!(intents.contains(Intents::GUILDS));
        assert!(intents.contains(Intents::GUILD_MEMBERS));
        assert!(!intents.contains(Intents::MESSAGE_CONTENT));
    }

    #[test]
    fn test_default_values() {
        let config = load(&[("DISCORD_TOKEN", "t")]).unwrap();

        assert_eq!(config.pool_id, 0);
        assert_eq!(config.total_shards, 1);
        assert_eq!(config.gateway_url, DEFAULT_GATEWAY_URL);
        assert_eq!(config.http_port, 9090);
        assert_eq!(config.hello_timeout, DEFAULT_HELLO_TIMEOUT);
        assert_eq!(config.ready_delay, DEFAULT_READY_DELAY);
        assert!(!config.development);
        assert!(config.nats_url.is_none());
        assert_eq!(config.forward_events.len(), DEFAULT_FORWARD_EVENTS.len());
    }

    #[test]
    fn test_token_required() {
        assert!(matches!(load(&[]), Err(GatewayError::Config(_))));
        assert!(load(&[("DISCORD_BOT_TOKEN", "t")]).is_ok());
    }

    #[test]
    fn test_backwards_compatible_names() {
        let config = load(&[
            ("DISCORD_TOKEN", "t"),
            ("SHARD_ID", "2"),
            ("TOTAL_SHARDS", "60"),
            ("METRICS_PORT", "8080"),
        ])
        .unwrap();

        assert_eq!(config.pool_id, 2);
        assert_eq!(config.http_port, 8080);
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err = load(&[("DISCORD_TOKEN", "t"), ("TOTAL_SHARDS", "many")]).unwrap_err();
        assert!(err.to_string().contains("TOTAL_SHARDS"));

        assert!(load(&[("DISCORD_TOKEN", "t"), ("TOTAL_SHARDS", "0")]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "t"), ("LARGE_THRESHOLD", "10")]).is_err());
    }

    #[test]
    fn test_presence_from_env() {
        let config = load(&[
            ("DISCORD_TOKEN", "t"),
            ("PRESENCE_STATUS", "DND"),
            ("PRESENCE_ACTIVITY", "watching: the gateway"),
        ])
        .unwrap();

        assert_eq!(config.presence.status, Status::DoNotDisturb);
        assert_eq!(config.presence.activities.len(), 1);
        assert_eq!(config.presence.activities[0].kind, ActivityKind::Watching);
        assert_eq!(config.presence.activities[0].name, "the gateway");

        assert!(load(&[("DISCORD_TOKEN", "t"), ("PRESENCE_STATUS", "away")]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "t"), ("PRESENCE_ACTIVITY", "dancing:x")]).is_err());
    }

    #[test]
    fn test_bare_activity_is_playing() {
        let activity = parse_activity("chess").unwrap();
        assert_eq!(activity.kind, ActivityKind::Playing);
        assert_eq!(activity.name, "chess");
    }

    #[test]
    fn test_intents_bitmask() {
        let config = load(&[("DISCORD_TOKEN", "t"), ("GATEWAY_INTENTS", "513")]).unwrap();
        assert!(config.intents.contains(Intents::GUILDS));
        assert!(config.intents.contains(Intents::GUILD_MESSAGES));
        assert!(!config.intents.contains(Intents::GUILD_MEMBERS));
    }

    #[test]
    fn test_event_list_normalized() {
        assert_eq!(
            parse_event_list(" guild_create, ,INTERACTION_CREATE"),
            vec!["GUILD_CREATE", "INTERACTION_CREATE"]
        );
    }

    #[test]
    fn test_client_options_carry_config() {
        let config = load(&[
            ("DISCORD_TOKEN", "t"),
            ("TOTAL_SHARDS", "4"),
            ("GATEWAY_ENV", "development"),
            ("HELLO_TIMEOUT_MS", "5000"),
        ])
        .unwrap();
        let options = config.client_options();

        assert_eq!(options.shard_count, 4);
        assert!(options.development);
        assert_eq!(options.hello_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = load(&[("DISCORD_TOKEN", "super-secret")]).unwrap();
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}

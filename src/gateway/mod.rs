//! Gateway wire protocol
//!
//! Envelope decoding, opcodes, close codes and the outgoing request
//! builders sent by a shard connection.

mod command;
mod envelope;
mod opcode;

pub use command::{
    encode, Command, ConnectionProperties, Heartbeat, Identify, Resume,
};
pub use envelope::{Envelope, Hello, ReadyInfo};
pub use opcode::{close_code, OpCode};

/// Gateway API version requested in the connection URL
pub const API_VERSION: u8 = 10;

/// Default public gateway endpoint
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg";

/// Dispatch event names the connection itself reacts to
pub mod event_names {
    pub const READY: &str = "READY";
    pub const RESUMED: &str = "RESUMED";
    pub const GUILD_CREATE: &str = "GUILD_CREATE";
    pub const GUILD_DELETE: &str = "GUILD_DELETE";
    pub const INTERACTION_CREATE: &str = "INTERACTION_CREATE";
}

/// Build the connection URL for a gateway base, pinning version and encoding.
///
/// Any query string already present on `base` (a `resume_gateway_url` may
/// carry one) is replaced.
pub fn connect_url(base: &str) -> String {
    let base = base.split('?').next().unwrap_or(base).trim_end_matches('/');
    format!("{base}/?v={API_VERSION}&encoding=json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_url_pins_version_and_encoding() {
        assert_eq!(
            connect_url(DEFAULT_GATEWAY_URL),
            "wss://gateway.discord.gg/?v=10&encoding=json"
        );
    }

    #[test]
    fn connect_url_normalizes_resume_urls() {
        assert_eq!(
            connect_url("wss://gateway-us-east1-b.discord.gg/"),
            "wss://gateway-us-east1-b.discord.gg/?v=10&encoding=json"
        );
        assert_eq!(
            connect_url("wss://gateway-us-east1-b.discord.gg/?v=9"),
            "wss://gateway-us-east1-b.discord.gg/?v=10&encoding=json"
        );
    }
}

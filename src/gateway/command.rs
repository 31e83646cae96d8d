//! Outgoing gateway requests
//!
//! Pure constructors: nothing here touches the transport. `encode` wraps a
//! command in the `{ op, d }` envelope the gateway expects.

use serde::Serialize;
use twilight_model::gateway::Intents;

use super::OpCode;
use crate::presence::Presence;

/// A payload the client sends under a fixed opcode
pub trait Command: Serialize {
    const OPCODE: OpCode;
}

#[derive(Serialize)]
struct Outgoing<'a, T> {
    op: u8,
    d: &'a T,
}

/// Serialize a command into a gateway text frame
pub fn encode<C: Command>(command: &C) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Outgoing {
        op: C::OPCODE.as_u8(),
        d: command,
    })
}

/// Heartbeat carrying the last seen sequence (null before the first dispatch)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Heartbeat(pub Option<u64>);

impl Command for Heartbeat {
    const OPCODE: OpCode = OpCode::Heartbeat;
}

/// Client properties reported in Identify
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        let name = env!("CARGO_PKG_NAME");
        Self {
            os: std::env::consts::OS.to_string(),
            browser: name.to_string(),
            device: format!("{name}@{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Starts a new session
#[derive(Clone, Serialize)]
pub struct Identify {
    pub token: String,
    pub intents: Intents,
    pub properties: ConnectionProperties,
    pub compress: bool,
    pub large_threshold: u64,
    /// `[shard_index, shard_count]`
    pub shard: [u32; 2],
    pub presence: Presence,
}

impl Identify {
    pub fn new(
        token: impl Into<String>,
        intents: Intents,
        shard: [u32; 2],
        large_threshold: u64,
        presence: Presence,
    ) -> Self {
        Self {
            token: token.into(),
            intents,
            properties: ConnectionProperties::default(),
            compress: false,
            large_threshold,
            shard,
            presence,
        }
    }

    pub fn with_properties(mut self, properties: ConnectionProperties) -> Self {
        self.properties = properties;
        self
    }
}

impl std::fmt::Debug for Identify {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identify")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("shard", &self.shard)
            .field("large_threshold", &self.large_threshold)
            .finish_non_exhaustive()
    }
}

impl Command for Identify {
    const OPCODE: OpCode = OpCode::Identify;
}

/// Continues an interrupted session
///
/// Both fields are required by construction: there is no way to build a
/// Resume without a session id and a sequence.
#[derive(Clone, Serialize)]
pub struct Resume {
    pub token: String,
    pub session_id: String,
    pub seq: u64,
}

impl Resume {
    pub fn new(token: impl Into<String>, session_id: impl Into<String>, seq: u64) -> Self {
        Self {
            token: token.into(),
            session_id: session_id.into(),
            seq,
        }
    }
}

impl std::fmt::Debug for Resume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resume")
            .field("token", &"<redacted>")
            .field("session_id", &self.session_id)
            .field("seq", &self.seq)
            .finish()
    }
}

impl Command for Resume {
    const OPCODE: OpCode = OpCode::Resume;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn encoded<C: Command>(command: &C) -> Value {
        serde_json::from_str(&encode(command).unwrap()).unwrap()
    }

    #[test]
    fn heartbeat_carries_sequence_or_null() {
        assert_eq!(encoded(&Heartbeat(Some(42))), json!({"op": 1, "d": 42}));
        assert_eq!(encoded(&Heartbeat(None)), json!({"op": 1, "d": null}));
    }

    #[test]
    fn resume_wire_shape() {
        assert_eq!(
            encoded(&Resume::new("token", "abc", 42)),
            json!({"op": 6, "d": {"token": "token", "session_id": "abc", "seq": 42}})
        );
    }

    #[test]
    fn identify_declares_shard_and_disables_compression() {
        let identify = Identify::new(
            "token",
            Intents::GUILDS | Intents::GUILD_MEMBERS,
            [2, 8],
            50,
            Presence::default(),
        );
        let value = encoded(&identify);

        assert_eq!(value["op"], 2);
        assert_eq!(value["d"]["shard"], json!([2, 8]));
        assert_eq!(value["d"]["compress"], false);
        assert_eq!(value["d"]["large_threshold"], 50);
        assert_eq!(
            value["d"]["intents"],
            (Intents::GUILDS | Intents::GUILD_MEMBERS).bits()
        );
        assert_eq!(value["d"]["presence"]["status"], "online");
        assert!(value["d"]["properties"]["os"].is_string());
    }

    #[test]
    fn debug_output_redacts_token() {
        let identify = Identify::new("secret-token", Intents::GUILDS, [0, 1], 50, Presence::default());
        let resume = Resume::new("secret-token", "abc", 1);
        assert!(!format!("{identify:?}").contains("secret-token"));
        assert!(!format!("{resume:?}").contains("secret-token"));
    }
}

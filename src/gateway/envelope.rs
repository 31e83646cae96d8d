//! Received gateway envelopes

use super::OpCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decoded unit of gateway communication: `{ op, d, s, t }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

impl Envelope {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Known opcode, or None for opcodes this connection does not handle
    pub fn opcode(&self) -> Option<OpCode> {
        OpCode::from_u8(self.op)
    }

    pub fn event_name(&self) -> Option<&str> {
        self.t.as_deref()
    }

    /// Resumability flag carried by an InvalidSession payload
    pub fn resumable(&self) -> bool {
        self.d.as_bool().unwrap_or(false)
    }
}

/// Hello payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Hello {
    /// Milliseconds between heartbeats
    pub heartbeat_interval: u64,
}

/// Fields of the READY dispatch needed to resume later
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadyInfo {
    pub session_id: String,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_dispatch() {
        let envelope =
            Envelope::decode(r#"{"op":0,"d":{"id":"1"},"s":5,"t":"MESSAGE_CREATE"}"#).unwrap();
        assert_eq!(envelope.opcode(), Some(OpCode::Dispatch));
        assert_eq!(envelope.s, Some(5));
        assert_eq!(envelope.event_name(), Some("MESSAGE_CREATE"));
    }

    #[test]
    fn null_and_missing_fields_decode_as_none() {
        let envelope = Envelope::decode(r#"{"op":11,"d":null,"s":null,"t":null}"#).unwrap();
        assert_eq!(envelope.opcode(), Some(OpCode::HeartbeatAck));
        assert_eq!(envelope.s, None);
        assert_eq!(envelope.t, None);

        let envelope = Envelope::decode(r#"{"op":11}"#).unwrap();
        assert_eq!(envelope.d, Value::Null);
    }

    #[test]
    fn rejects_frames_without_opcode() {
        assert!(Envelope::decode(r#"{"d":null}"#).is_err());
        assert!(Envelope::decode("not json").is_err());
    }

    #[test]
    fn hello_payload() {
        let envelope =
            Envelope::decode(r#"{"op":10,"d":{"heartbeat_interval":45000},"s":null,"t":null}"#)
                .unwrap();
        let hello: Hello = serde_json::from_value(envelope.d).unwrap();
        assert_eq!(hello.heartbeat_interval, 45_000);
    }

    #[test]
    fn invalid_session_flag_defaults_to_not_resumable() {
        let resumable = Envelope::decode(r#"{"op":9,"d":true}"#).unwrap();
        let fresh = Envelope::decode(r#"{"op":9,"d":false}"#).unwrap();
        let missing = Envelope::decode(r#"{"op":9}"#).unwrap();
        assert!(resumable.resumable());
        assert!(!fresh.resumable());
        assert!(!missing.resumable());
    }

    #[test]
    fn ready_info_tolerates_missing_resume_url() {
        let info: ReadyInfo =
            serde_json::from_value(serde_json::json!({"session_id": "abc", "v": 10})).unwrap();
        assert_eq!(info.session_id, "abc");
        assert_eq!(info.resume_gateway_url, None);
    }
}

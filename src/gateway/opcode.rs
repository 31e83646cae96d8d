//! Gateway opcodes and close codes

/// Opcodes handled by a shard connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Named event delivered to handlers (received)
    Dispatch = 0,
    /// Liveness ping (sent; may also be requested by the server)
    Heartbeat = 1,
    /// Start a new session (sent)
    Identify = 2,
    /// Update the client's presence (sent)
    PresenceUpdate = 3,
    /// Continue an interrupted session (sent)
    Resume = 6,
    /// Server asks the client to reconnect and resume (received)
    Reconnect = 7,
    /// Session rejected; payload says whether it may be resumed (received)
    InvalidSession = 9,
    /// First message on a fresh transport, carries the heartbeat interval (received)
    Hello = 10,
    /// Acknowledges a heartbeat (received)
    HeartbeatAck = 11,
}

impl OpCode {
    pub fn from_u8(op: u8) -> Option<Self> {
        Some(match op {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::PresenceUpdate,
            6 => Self::Resume,
            7 => Self::Reconnect,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Label used in logs and metrics
    pub fn name(self) -> &'static str {
        match self {
            Self::Dispatch => "dispatch",
            Self::Heartbeat => "heartbeat",
            Self::Identify => "identify",
            Self::PresenceUpdate => "presence_update",
            Self::Resume => "resume",
            Self::Reconnect => "reconnect",
            Self::InvalidSession => "invalid_session",
            Self::Hello => "hello",
            Self::HeartbeatAck => "heartbeat_ack",
        }
    }
}

/// WebSocket close codes with protocol meaning
pub mod close_code {
    /// Intentional disconnect; the session is discarded and no reconnect follows
    pub const NORMAL: u16 = 1000;
    /// Client-initiated reconnect; the server keeps the session resumable
    pub const RECONNECT: u16 = 4000;
    /// Token rejected by the server
    pub const AUTHENTICATION_FAILED: u16 = 4004;
    /// Resume sent with a sequence the server does not recognise
    pub const INVALID_SEQ: u16 = 4007;
    /// Session expired on the server side
    pub const SESSION_TIMED_OUT: u16 = 4009;

    /// Server close codes after which resuming is pointless
    pub fn invalidates_session(code: u16) -> bool {
        matches!(code, INVALID_SEQ | SESSION_TIMED_OUT)
    }

    /// Close codes that indicate a configuration problem rather than a
    /// network one (bad token, bad shard, disallowed intents).
    pub fn is_configuration_error(code: u16) -> bool {
        matches!(code, AUTHENTICATION_FAILED | 4010..=4014)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_values_match_wire_protocol() {
        let pairs = [
            (OpCode::Dispatch, 0),
            (OpCode::Heartbeat, 1),
            (OpCode::Identify, 2),
            (OpCode::PresenceUpdate, 3),
            (OpCode::Resume, 6),
            (OpCode::Reconnect, 7),
            (OpCode::InvalidSession, 9),
            (OpCode::Hello, 10),
            (OpCode::HeartbeatAck, 11),
        ];

        for (op, value) in pairs {
            assert_eq!(op.as_u8(), value);
            assert_eq!(OpCode::from_u8(value), Some(op));
        }
    }

    #[test]
    fn unhandled_opcodes_are_unknown() {
        for value in [4, 5, 8, 12, 31, 255] {
            assert_eq!(OpCode::from_u8(value), None, "opcode {value}");
        }
    }

    #[test]
    fn only_sequence_and_timeout_closes_invalidate_session() {
        assert!(close_code::invalidates_session(close_code::INVALID_SEQ));
        assert!(close_code::invalidates_session(close_code::SESSION_TIMED_OUT));
        assert!(!close_code::invalidates_session(close_code::RECONNECT));
        assert!(!close_code::invalidates_session(close_code::NORMAL));
        assert!(!close_code::invalidates_session(4001));
    }

    #[test]
    fn configuration_close_codes() {
        assert!(close_code::is_configuration_error(4004));
        assert!(close_code::is_configuration_error(4014));
        assert!(!close_code::is_configuration_error(4000));
        assert!(!close_code::is_configuration_error(4009));
    }
}

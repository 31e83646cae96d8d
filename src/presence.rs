//! Presence payloads
//!
//! Shared by the Identify request (initial presence) and the
//! PresenceUpdate command.

use serde::Serialize;
use twilight_model::gateway::presence::Status;

use crate::gateway::{Command, OpCode};

/// Activity kind as sent on the wire (integer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum ActivityKind {
    Playing,
    Streaming,
    Listening,
    Watching,
    Custom,
    Competing,
}

impl From<ActivityKind> for u8 {
    fn from(kind: ActivityKind) -> Self {
        match kind {
            ActivityKind::Playing => 0,
            ActivityKind::Streaming => 1,
            ActivityKind::Listening => 2,
            ActivityKind::Watching => 3,
            ActivityKind::Custom => 4,
            ActivityKind::Competing => 5,
        }
    }
}

impl std::str::FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "playing" => Ok(Self::Playing),
            "streaming" => Ok(Self::Streaming),
            "listening" => Ok(Self::Listening),
            "watching" => Ok(Self::Watching),
            "custom" => Ok(Self::Custom),
            "competing" => Ok(Self::Competing),
            other => Err(format!("unknown activity type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Activity {
    pub fn new(kind: ActivityKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            url: None,
        }
    }

    /// Stream URL, only shown by clients for `Streaming` activities
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Presence as sent in Identify and PresenceUpdate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Presence {
    /// Unix time (ms) the client went idle, or null
    pub since: Option<u64>,
    pub activities: Vec<Activity>,
    pub status: Status,
    pub afk: bool,
}

impl Presence {
    pub fn new(status: Status) -> Self {
        Self {
            since: None,
            activities: Vec::new(),
            status,
            afk: false,
        }
    }

    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.activities.push(activity);
        self
    }
}

impl Default for Presence {
    fn default() -> Self {
        Self::new(Status::Online)
    }
}

impl Command for Presence {
    const OPCODE: OpCode = OpCode::PresenceUpdate;
}

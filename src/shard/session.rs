//! Session continuity state
//!
//! The session id and the sequence are not always set together. Every
//! dispatch moves the sequence, including any that arrive before READY has
//! supplied a session id, so heartbeats always carry the latest sequence.
//! The pair that matters holds instead:
//!
//! - a Resume point exists only while both halves are set
//! - the resume URL is only reported alongside a Resume point
//! - clearing drops the session id, the sequence and the URL together

use crate::gateway::ReadyInfo;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    session_id: Option<String>,
    sequence: Option<u64>,
    resume_url: Option<String>,
}

impl SessionState {
    /// Record a dispatch sequence. Never moves backwards.
    pub fn observe_sequence(&mut self, seq: u64) {
        self.sequence = Some(self.sequence.map_or(seq, |current| current.max(seq)));
    }

    /// Adopt the session announced by READY
    pub fn establish(&mut self, ready: ReadyInfo) {
        self.session_id = Some(ready.session_id);
        self.resume_url = ready.resume_gateway_url;
    }

    /// Session id and sequence to resume from, if both are known
    pub fn resume_point(&self) -> Option<(&str, u64)> {
        match (&self.session_id, self.sequence) {
            (Some(id), Some(seq)) => Some((id.as_str(), seq)),
            _ => None,
        }
    }

    pub fn is_resumable(&self) -> bool {
        self.resume_point().is_some()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    /// Gateway the server asked us to resume against, only meaningful
    /// while a resume point exists
    pub fn resume_url(&self) -> Option<&str> {
        if self.is_resumable() {
            self.resume_url.as_deref()
        } else {
            None
        }
    }
}

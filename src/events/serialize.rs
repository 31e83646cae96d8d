//! Event serialization for message broker
//!
//! Converts dispatch envelopes into the JSON payloads published on NATS.

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::gateway::{Envelope, OpCode};

/// Generic gateway event payload
#[derive(Debug, Clone, Serialize)]
pub struct GatewayEvent {
    pub event_id: String,
    pub event_type: String,
    pub shard_id: u32,
    pub timestamp: u64,
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    pub user_id: Option<String>,
    pub data: Value,
}

/// Broker event type for a dispatch name
pub fn event_type(event_name: &str) -> String {
    match event_name {
        "GUILD_CREATE" => "guild.join".to_string(),
        "GUILD_DELETE" => "guild.leave".to_string(),
        "GUILD_UPDATE" => "guild.update".to_string(),
        "GUILD_MEMBER_ADD" => "member.join".to_string(),
        "GUILD_MEMBER_REMOVE" => "member.leave".to_string(),
        "GUILD_MEMBER_UPDATE" => "member.update".to_string(),
        "INTERACTION_CREATE" => "interaction.create".to_string(),
        other => other.to_ascii_lowercase(),
    }
}

/// Serialize a dispatch envelope to a GatewayEvent payload
///
/// Returns None for anything that is not a named dispatch.
pub fn serialize_event(envelope: &Envelope, shard_id: u32) -> Option<GatewayEvent> {
    if envelope.opcode() != Some(OpCode::Dispatch) {
        return None;
    }
    let name = envelope.event_name()?;
    let d = &envelope.d;

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |t| t.as_millis() as u64);

    let event_type = event_type(name);
    let guild_id = match event_type.as_str() {
        "guild.join" | "guild.leave" | "guild.update" => string_at(d, &["id"]),
        _ => string_at(d, &["guild_id"]),
    };
    let channel_id = string_at(d, &["channel_id"]).or_else(|| string_at(d, &["channel", "id"]));
    let user_id = string_at(d, &["user", "id"])
        .or_else(|| string_at(d, &["member", "user", "id"]))
        .or_else(|| string_at(d, &["author", "id"]));

    let data = match event_type.as_str() {
        "guild.join" => json!({
            "id": d.get("id"),
            "name": d.get("name"),
            "member_count": d.get("member_count"),
        }),
        "guild.leave" => json!({
            "unavailable": d.get("unavailable").and_then(Value::as_bool).unwrap_or(false),
        }),
        "member.join" => json!({
            "username": d.pointer("/user/username"),
            "discriminator": d.pointer("/user/discriminator"),
        }),
        "member.leave" => Value::Null,
        "member.update" => json!({
            "roles": d.get("roles").cloned().unwrap_or_else(|| json!([])),
            "nick": d.get("nick"),
        }),
        "interaction.create" => json!({
            "interaction_id": d.get("id"),
            "interaction_type": d.get("type"),
            "interaction_token": d.get("token"),
        }),
        _ => d.clone(),
    };

    Some(GatewayEvent {
        event_id: Uuid::new_v4().to_string(),
        event_type,
        shard_id,
        timestamp,
        guild_id,
        channel_id,
        user_id,
        data,
    })
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    current.as_str().map(str::to_string)
}

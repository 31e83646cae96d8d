//! Wire format conformance tests
//!
//! Encodes every outgoing gateway request, plus the payloads published to
//! NATS, and compares them against the committed JSON fixtures in
//! tests/fixtures/.
//!
//! ## Fixture regeneration
//!
//! To regenerate fixtures after an intentional wire format change:
//! ```bash
//! REGENERATE_FIXTURES=1 cargo test --test wire_format
//! ```

use serde_json::{json, Value};
use std::path::PathBuf;
use twilight_model::gateway::presence::Status;
use twilight_model::gateway::Intents;

use liquid_gateway::events::serialize_event;
use liquid_gateway::gateway::{encode, ConnectionProperties, Envelope, Heartbeat, Identify, Resume};
use liquid_gateway::presence::{Activity, ActivityKind, Presence};

/// Fixture directory resolved via CARGO_MANIFEST_DIR.
fn fixtures_dir() -> PathBuf {
    let fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    assert!(
        fixtures.exists(),
        "Fixture directory does not exist at {}",
        fixtures.display()
    );
    fixtures
}

/// Load a committed fixture by name (without .json extension).
fn load_fixture(name: &str) -> Value {
    let path = fixtures_dir().join(format!("{name}.json"));
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {e}", path.display()));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {e}", path.display()))
}

/// Write a fixture to disk (for regeneration mode).
fn write_fixture(name: &str, value: &Value) {
    let path = fixtures_dir().join(format!("{name}.json"));
    let content = serde_json::to_string_pretty(value).unwrap();
    let content = format!("{content}\n");
    std::fs::write(&path, content)
        .unwrap_or_else(|e| panic!("Failed to write fixture {}: {e}", path.display()));
    eprintln!("Regenerated fixture: {}", path.display());
}

fn assert_matches_fixture(name: &str, actual: Value) {
    if std::env::var("REGENERATE_FIXTURES").is_ok() {
        write_fixture(name, &actual);
        return;
    }
    assert_eq!(
        actual,
        load_fixture(name),
        "Wire format mismatch for fixture '{name}'. \
         If intentional, run: REGENERATE_FIXTURES=1 cargo test --test wire_format"
    );
}

fn encoded(text: Result<String, serde_json::Error>) -> Value {
    serde_json::from_str(&text.expect("command encodes")).unwrap()
}

/// Gateway-bound request with deterministic inputs for a given fixture
fn build_command(fixture_name: &str) -> Value {
    match fixture_name {
        "identify" => {
            let presence = Presence::new(Status::Online)
                .with_activity(Activity::new(ActivityKind::Watching, "shard 2"));
            let identify = Identify::new(
                "fixture-token",
                Intents::GUILDS | Intents::GUILD_MEMBERS,
                [2, 4],
                50,
                presence,
            )
            .with_properties(ConnectionProperties {
                os: "linux".to_string(),
                browser: "liquid-gateway".to_string(),
                device: "liquid-gateway".to_string(),
            });
            encoded(encode(&identify))
        }
        "resume" => encoded(encode(&Resume::new("fixture-token", "9f3c2d1e", 1337))),
        "heartbeat" => encoded(encode(&Heartbeat(Some(1337)))),
        "heartbeat-initial" => encoded(encode(&Heartbeat(None))),
        "presence-update" => {
            let presence = Presence::new(Status::DoNotDisturb)
                .with_activity(Activity::new(ActivityKind::Listening, "the gateway"));
            encoded(encode(&presence))
        }
        other => panic!("Unknown fixture: {other}"),
    }
}

/// Broker payload for a fixed dispatch, with the random fields pinned
fn build_broker_event(fixture_name: &str) -> Value {
    let (name, d, event_id) = match fixture_name {
        "guild-join" => (
            "GUILD_CREATE",
            json!({
                "id": "123456789012345678",
                "name": "Test Guild",
                "member_count": 42,
                "channels": [],
            }),
            "00000000-0000-4000-8000-000000000001",
        ),
        "interaction-create" => (
            "INTERACTION_CREATE",
            json!({
                "id": "444444444444444444",
                "type": 2,
                "token": "aW50ZXJhY3Rpb25fdG9rZW5fZXhhbXBsZQ",
                "guild_id": "123456789012345678",
                "channel_id": "333333333333333333",
                "member": {"user": {"id": "987654321098765432"}},
            }),
            "00000000-0000-4000-8000-000000000006",
        ),
        other => panic!("Unknown fixture: {other}"),
    };

    let envelope = Envelope {
        op: 0,
        d,
        s: Some(1),
        t: Some(name.to_string()),
    };
    let mut event = serialize_event(&envelope, 0).expect("dispatch serializes");
    event.event_id = event_id.to_string();
    event.timestamp = 1_700_000_000_000;
    serde_json::to_value(event).unwrap()
}

const COMMAND_FIXTURES: &[&str] = &[
    "identify",
    "resume",
    "heartbeat",
    "heartbeat-initial",
    "presence-update",
];

const BROKER_FIXTURES: &[&str] = &["guild-join", "interaction-create"];

/// Required envelope fields for every published GatewayEvent.
const REQUIRED_ENVELOPE_FIELDS: &[&str] = &[
    "event_id",
    "event_type",
    "shard_id",
    "timestamp",
    "guild_id",
    "channel_id",
    "user_id",
    "data",
];

#[test]
fn commands_match_committed_fixtures() {
    for name in COMMAND_FIXTURES {
        assert_matches_fixture(name, build_command(name));
    }
}

#[test]
fn broker_events_match_committed_fixtures() {
    for name in BROKER_FIXTURES {
        assert_matches_fixture(name, build_broker_event(name));
    }
}

#[test]
fn commands_are_op_and_data_only() {
    for name in COMMAND_FIXTURES {
        let fixture = load_fixture(name);
        let obj = fixture.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["d", "op"], "fixture '{name}'");
    }
}

#[test]
fn broker_fixtures_have_required_envelope_fields() {
    for name in BROKER_FIXTURES {
        let fixture = load_fixture(name);
        let obj = fixture.as_object().unwrap_or_else(|| {
            panic!("Fixture '{name}' is not a JSON object");
        });

        for field in REQUIRED_ENVELOPE_FIELDS {
            assert!(
                obj.contains_key(*field),
                "Fixture '{name}' missing required envelope field '{field}'"
            );
        }

        let event_id = obj["event_id"].as_str().unwrap();
        uuid::Uuid::parse_str(event_id).unwrap_or_else(|e| {
            panic!("Fixture '{name}' has invalid UUID event_id '{event_id}': {e}");
        });
    }
}

/// Interaction payloads carry `interaction_token`, never a bare `token`.
#[test]
fn interaction_token_field_name() {
    let fixture = load_fixture("interaction-create");
    let data = fixture["data"].as_object().expect("data should be object");
    assert!(data.contains_key("interaction_token"));
    assert!(!data.contains_key("token"));
}

/// Identify never carries a zlib flag: compression is not negotiated.
#[test]
fn identify_disables_compression() {
    assert_eq!(load_fixture("identify")["d"]["compress"], false);
}

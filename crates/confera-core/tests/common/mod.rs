#![allow(dead_code)]
use serde_json::Value;

/// Helper to create a JSON value from a string slice.
/// Panics if the JSON is invalid (intended for tests).
pub fn json_from(text: &str) -> Value {
    serde_json::from_str(text).expect("Failed to parse test JSON")
}

/// Returns a nested meeting-room payload fixture.
pub fn room_payload() -> &'static str {
    r#"{
        "name": "weekly-sync",
        "privacy": "private",
        "config": {
            "max_participants": 12,
            "enable_recording": "cloud",
            "exp": 1735689600
        },
        "tags": ["eng", "sync"]
    }"#
}

/// Same payload as [`room_payload`] with every object's keys in another order.
pub fn room_payload_reordered() -> &'static str {
    r#"{
        "tags": ["eng", "sync"],
        "config": {
            "exp": 1735689600,
            "enable_recording": "cloud",
            "max_participants": 12
        },
        "privacy": "private",
        "name": "weekly-sync"
    }"#
}

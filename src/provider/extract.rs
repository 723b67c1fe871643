//! Best-effort extraction of identifiers from provider responses
//!
//! Providers disagree on where the instance id and token live: some nest
//! them under an `instance` object, some return flat keys, some use
//! different spellings. Each value is looked up through an ordered list of
//! candidate paths and the first non-empty scalar wins.

use serde_json::Value;

/// Candidate paths for the provider-assigned instance identifier
const INSTANCE_ID_PATHS: &[&[&str]] = &[
    &["instanceId"],
    &["instance", "instanceId"],
    &["instance", "id"],
    &["instance", "name"],
    &["instance"],
    &["name"],
    &["id"],
];

/// Candidate paths for the instance secret token
const TOKEN_PATHS: &[&[&str]] = &[
    &["token"],
    &["instance", "token"],
    &["instanceToken"],
    &["instance_token"],
];

/// Candidate paths for the connection status
const STATUS_PATHS: &[&[&str]] = &[
    &["status"],
    &["connect", "status"],
    &["connect", "state"],
    &["instance", "status"],
    &["state"],
];

/// Instance identifier, if the provider returned one
#[must_use]
pub fn instance_id(body: &Value) -> Option<String> {
    first_string(body, INSTANCE_ID_PATHS)
}

/// Instance token, if the provider returned one
#[must_use]
pub fn token(body: &Value) -> Option<String> {
    first_string(body, TOKEN_PATHS)
}

/// Connection status, if any of the known fields carry one
#[must_use]
pub fn status(body: &Value) -> Option<String> {
    first_string(body, STATUS_PATHS)
}

/// First candidate path that resolves to a non-empty string or number
#[must_use]
pub fn first_string(body: &Value, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| {
        let value = path.iter().try_fold(body, |node, key| node.get(*key))?;
        scalar(value)
    })
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn flat_keys() {
        let body = json!({"instanceId": "loja-1", "token": "abc"});
        assert_eq!(instance_id(&body).as_deref(), Some("loja-1"));
        assert_eq!(token(&body).as_deref(), Some("abc"));
    }

    #[test]
    fn nested_instance_object() {
        let body = json!({"instance": {"id": "r7x", "token": "t0k"}, "connected": false});
        assert_eq!(instance_id(&body).as_deref(), Some("r7x"));
        assert_eq!(token(&body).as_deref(), Some("t0k"));
    }

    #[test]
    fn nested_name_beats_top_level_name() {
        let body = json!({"instance": {"name": "inner"}, "name": "outer"});
        assert_eq!(instance_id(&body).as_deref(), Some("inner"));
    }

    #[test]
    fn string_instance_field() {
        let body = json!({"instance": "plain", "instanceToken": "t"});
        assert_eq!(instance_id(&body).as_deref(), Some("plain"));
        assert_eq!(token(&body).as_deref(), Some("t"));
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let body = json!({"id": 42});
        assert_eq!(instance_id(&body).as_deref(), Some("42"));
    }

    #[test]
    fn blank_values_are_skipped() {
        let body = json!({"instanceId": "  ", "name": "fallback", "token": ""});
        assert_eq!(instance_id(&body).as_deref(), Some("fallback"));
        assert!(token(&body).is_none());
    }

    #[test]
    fn status_from_nested_connect() {
        assert_eq!(
            status(&json!({"connect": {"state": "open"}})).as_deref(),
            Some("open")
        );
        assert_eq!(
            status(&json!({"status": "connected", "state": "x"})).as_deref(),
            Some("connected")
        );
        assert!(status(&json!({"qrcode": "..."})).is_none());
    }
}

//! Deterministic responses used while no provider base URL is configured

use serde_json::{Value, json};

use crate::text::{random_token, slug_name};

/// Connection state reported before a device has scanned the QR code
pub const WAITING_QR: &str = "waiting-qr";

/// Prefix of the placeholder QR marker
pub const QR_MARKER_PREFIX: &str = "UAZAPI_MOCK_";

/// Synthetic instance id: slugged name plus a random suffix
#[must_use]
pub fn instance_id(name: &str) -> String {
    format!("{}-{}", slug_name(name), random_token(6).to_lowercase())
}

/// Synthetic opaque instance token
#[must_use]
pub fn token() -> String {
    random_token(32)
}

/// Placeholder QR marker for an instance
#[must_use]
pub fn qr_marker(instance_id: &str) -> String {
    format!("{QR_MARKER_PREFIX}{instance_id}")
}

/// Create-instance response
#[must_use]
pub fn created(instance_id: &str, token: &str) -> Value {
    json!({
        "instanceId": instance_id,
        "token": token,
        "mock": true,
        "connect": {
            "status": WAITING_QR,
            "qrcode": qr_marker(instance_id),
            "message": "provider not configured, scan is simulated",
        },
    })
}

/// Status snapshot
#[must_use]
pub fn status(instance_id: &str) -> Value {
    json!({
        "instance": instance_id,
        "status": WAITING_QR,
        "qrcode": qr_marker(instance_id),
        "mock": true,
        "connect": { "status": WAITING_QR },
    })
}

/// QR payload; also used as the placeholder when a real provider has none
#[must_use]
pub fn qr(instance_id: &str) -> Value {
    json!({
        "instance": instance_id,
        "qrcode": qr_marker(instance_id),
        "status": WAITING_QR,
    })
}

/// Webhook registration acknowledgment
#[must_use]
pub fn webhook_saved() -> Value {
    json!({ "ok": true, "mock": true, "message": "webhook saved (mock)" })
}

/// Text send acknowledgment
#[must_use]
pub fn sent(to: &str) -> Value {
    json!({ "ok": true, "mock": true, "to": to, "message": "message accepted (mock)" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_slugged_and_unique() {
        let a = instance_id("Loja Centro");
        let b = instance_id("Loja Centro");
        assert!(a.starts_with("loja-centro-"));
        assert_eq!(a.len(), "loja-centro-".len() + 6);
        assert_ne!(a, b);
    }

    #[test]
    fn created_payload_waits_for_qr() {
        let body = created("x-1", "tok");
        assert_eq!(body["connect"]["status"], WAITING_QR);
        assert_eq!(body["connect"]["qrcode"], "UAZAPI_MOCK_x-1");
        assert_eq!(body["token"], "tok");
    }
}

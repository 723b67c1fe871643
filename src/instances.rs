//! Instance lifecycle: provisioning, status polling, QR, webhook
//! registration and outbound text through the provider gateway
//!
//! The registry row written here is what inbound webhook delivery uses to
//! resolve the owning tenant, so local writes are never rolled back when a
//! later provider call fails.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::db::{Instance, InstanceRepo, InstanceUpsert};
use crate::provider::{ProviderGateway, extract, mock};
use crate::tenant::Tenant;
use crate::text::random_token;
use crate::{Error, Result};

/// Orchestrates provider calls and the instance registry
#[derive(Clone)]
pub struct InstanceManager {
    provider: Arc<ProviderGateway>,
    registry: InstanceRepo,
}

impl InstanceManager {
    #[must_use]
    pub const fn new(provider: Arc<ProviderGateway>, registry: InstanceRepo) -> Self {
        Self { provider, registry }
    }

    /// Whether calls go to a real provider
    #[must_use]
    pub fn provider_configured(&self) -> bool {
        self.provider.is_configured()
    }

    /// Provision an instance for `tenant`
    ///
    /// Returns the provider's response with `instanceId` and `token`
    /// normalized to top-level keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the provider gives no token, a
    /// provider error if the call fails, or a database error if the
    /// registry write fails
    pub async fn create(&self, tenant: Tenant, name: &str) -> Result<Value> {
        let name = match name.trim() {
            "" => format!("instance-{}", random_token(6).to_lowercase()),
            trimmed => trimmed.to_string(),
        };

        let body = self.provider.create_instance(&name).await?;

        let instance_id = extract::instance_id(&body).unwrap_or_else(|| {
            let generated = mock::instance_id(&name);
            tracing::warn!(instance_id = %generated, "provider returned no instance id, generated one");
            generated
        });
        let token = extract::token(&body).ok_or_else(|| {
            Error::Validation(format!("provider returned no token for instance {instance_id}"))
        })?;

        self.registry.upsert(&InstanceUpsert {
            instance_id: &instance_id,
            token: &token,
            tenant,
            webhook_url: None,
        })?;

        tracing::info!(
            instance_id = %instance_id,
            org_id = tenant.org_id,
            flow_id = tenant.flow_id,
            mock = !self.provider.is_configured(),
            "instance created"
        );

        let mut out = into_object(body);
        out.insert("instanceId".to_string(), Value::String(instance_id));
        out.insert("token".to_string(), Value::String(token));
        Ok(Value::Object(out))
    }

    /// Poll connection status
    ///
    /// Without a `token`, the stored one is used. The normalized snapshot
    /// always carries `instance` and, when derivable, `status`; it is saved
    /// onto the registry row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a blank instance id, or a provider
    /// error if the call fails
    pub async fn status(&self, instance_id: &str, token: Option<&str>) -> Result<Value> {
        let instance_id = require_instance(instance_id)?;
        let token = self.token_or_stored(instance_id, token);

        let body = self.provider.status(instance_id, token.as_deref()).await?;
        let snapshot = normalize_status(instance_id, body);

        match self.registry.set_status(instance_id, &snapshot) {
            Ok(true) => {}
            Ok(false) => tracing::debug!(instance_id, "status polled for unregistered instance"),
            Err(e) => tracing::warn!(instance_id, error = %e, "failed to persist status snapshot"),
        }

        Ok(snapshot)
    }

    /// Fetch the QR/pairing payload; falls back to a `waiting-qr` placeholder
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a blank instance id
    pub async fn qr(&self, instance_id: &str, token: Option<&str>) -> Result<Value> {
        let instance_id = require_instance(instance_id)?;
        let token = self.token_or_stored(instance_id, token);

        Ok(self.provider.qr(instance_id, token.as_deref()).await)
    }

    /// Persist a webhook URL for the instance, then register it upstream
    ///
    /// `body` is `{url, token, events?}`. The local row is written first and
    /// kept even if the provider rejects the registration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a blank instance id or URL, a
    /// database error if the local write fails, or a provider error if
    /// registration fails
    pub async fn set_webhook(&self, tenant: Tenant, instance_id: &str, body: Value) -> Result<Value> {
        let instance_id = require_instance(instance_id)?;
        let mut body = into_object(body);

        let url = string_field(&body, "url")
            .ok_or_else(|| Error::Validation("missing webhook url".to_string()))?;
        let token = string_field(&body, "token").unwrap_or_default();

        self.registry.upsert(&InstanceUpsert {
            instance_id,
            token: &token,
            tenant,
            webhook_url: Some(&url),
        })?;
        tracing::info!(instance_id, org_id = tenant.org_id, flow_id = tenant.flow_id, "webhook url saved");

        if token.is_empty() {
            if let Some(stored) = self.stored_token(instance_id) {
                body.insert("token".to_string(), Value::String(stored));
            }
        }

        self.provider
            .set_webhook(instance_id, &Value::Object(body))
            .await
            .inspect_err(|e| {
                tracing::warn!(instance_id, error = %e, "provider webhook registration failed, local url kept");
            })
    }

    /// Send a text message through the instance
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when `to` or `text` is blank, or a
    /// provider error when delivery fails
    pub async fn send_text(
        &self,
        instance_id: &str,
        token: Option<&str>,
        to: &str,
        text: &str,
    ) -> Result<Value> {
        let instance_id = require_instance(instance_id)?;
        let (to, text) = (to.trim(), text.trim());
        if to.is_empty() || text.is_empty() {
            return Err(Error::Validation("missing to/text".to_string()));
        }

        let token = self.token_or_stored(instance_id, token).unwrap_or_default();
        self.provider.send_text(instance_id, &token, to, text).await
    }

    /// Instances owned by `tenant`
    ///
    /// # Errors
    ///
    /// Returns error if the registry query fails
    pub fn list(&self, tenant: Tenant) -> Result<Vec<Instance>> {
        self.registry.list_for_tenant(tenant)
    }

    fn token_or_stored(&self, instance_id: &str, token: Option<&str>) -> Option<String> {
        token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .or_else(|| self.stored_token(instance_id))
    }

    fn stored_token(&self, instance_id: &str) -> Option<String> {
        match self.registry.find(instance_id) {
            Ok(found) => found.map(|i| i.token).filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!(instance_id, error = %e, "registry lookup failed");
                None
            }
        }
    }
}

fn require_instance(instance_id: &str) -> Result<&str> {
    let trimmed = instance_id.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("missing instance".to_string()));
    }
    Ok(trimmed)
}

/// Ensure `instance` and `status` keys without dropping provider fields
fn normalize_status(instance_id: &str, body: Value) -> Value {
    let mut out = into_object(body);
    out.entry("instance")
        .or_insert_with(|| Value::String(instance_id.to_string()));

    if !out.contains_key("status") {
        if let Some(status) = extract::status(&Value::Object(out.clone())) {
            out.insert("status".to_string(), Value::String(status));
        }
    }

    Value::Object(out)
}

fn into_object(body: Value) -> Map<String, Value> {
    match body {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("provider".to_string(), other);
            map
        }
    }
}

fn string_field(body: &Map<String, Value>, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn manager() -> InstanceManager {
        InstanceManager::new(
            Arc::new(ProviderGateway::mock()),
            InstanceRepo::new(init_memory().unwrap()),
        )
    }

    #[tokio::test]
    async fn mock_create_registers_tenant() {
        let manager = manager();
        let tenant = Tenant::new(5, 2);

        let created = manager.create(tenant, "Loja Centro").await.unwrap();
        let id = created["instanceId"].as_str().unwrap();
        assert!(id.starts_with("loja-centro-"));
        assert_eq!(created["connect"]["status"], mock::WAITING_QR);

        let listed = manager.list(tenant).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].instance_id, id);
        assert_eq!(listed[0].token, created["token"].as_str().unwrap());
    }

    #[tokio::test]
    async fn blank_name_gets_generated() {
        let created = manager().create(Tenant::new(1, 1), "   ").await.unwrap();
        assert!(created["instanceId"].as_str().unwrap().starts_with("instance-"));
    }

    #[tokio::test]
    async fn status_snapshot_is_persisted() {
        let manager = manager();
        let created = manager.create(Tenant::new(1, 1), "a").await.unwrap();
        let id = created["instanceId"].as_str().unwrap();

        let status = manager.status(id, None).await.unwrap();
        assert_eq!(status["status"], mock::WAITING_QR);

        let row = manager.registry.find(id).unwrap().unwrap();
        assert_eq!(row.status.unwrap()["status"], mock::WAITING_QR);
    }

    #[tokio::test]
    async fn blank_instance_is_rejected() {
        let err = manager().status("  ", None).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn webhook_requires_url_and_persists() {
        let manager = manager();
        let tenant = Tenant::new(3, 3);

        let err = manager
            .set_webhook(tenant, "i1", json!({"token": "t"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(manager.registry.find("i1").unwrap().is_none());

        let out = manager
            .set_webhook(tenant, "i1", json!({"url": "http://agent/webhook/i1", "token": "t"}))
            .await
            .unwrap();
        assert_eq!(out["ok"], true);

        let row = manager.registry.find("i1").unwrap().unwrap();
        assert_eq!(row.webhook_url.as_deref(), Some("http://agent/webhook/i1"));
        assert_eq!(row.tenant, tenant);
    }

    #[tokio::test]
    async fn send_text_validates_fields() {
        let err = manager().send_text("i1", None, "", "oi").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn normalize_derives_status_from_connect() {
        let out = normalize_status("i1", json!({"connect": {"state": "open"}}));
        assert_eq!(out["status"], "open");
        assert_eq!(out["instance"], "i1");

        let kept = normalize_status("i1", json!({"status": "connected", "instance": "other"}));
        assert_eq!(kept["status"], "connected");
        assert_eq!(kept["instance"], "other");
    }
}

//! Messaging provider gateway
//!
//! Thin HTTP client over the provider's instance API (create, status, QR,
//! webhook registration, text send). Without a configured base URL every
//! operation answers with a deterministic mock so the rest of the gateway
//! stays usable in development.

pub mod extract;
pub mod mock;

use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::config::ProviderConfig;
use crate::{Error, Result};

/// Fallback message when a failed send carries no usable body
const SEND_FAILED_MESSAGE: &str = "disconnected or provider error";

/// Where providers put the reason for a failed call
const FAILURE_MESSAGE_PATHS: &[&[&str]] = &[&["error"], &["message"], &["error", "message"]];

/// Authentication header attached to every provider request
struct ProviderAuth {
    name: HeaderName,
    value: SecretString,
}

/// Client for the external messaging provider
pub struct ProviderGateway {
    client: Client,
    /// `None` switches every operation into mock mode
    base_url: Option<String>,
    auth: Option<ProviderAuth>,
}

impl std::fmt::Debug for ProviderGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderGateway")
            .field("base_url", &self.base_url)
            .field("auth_header", &self.auth.as_ref().map(|a| a.name.as_str()))
            .finish_non_exhaustive()
    }
}

impl ProviderGateway {
    /// Create a gateway from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the auth header is malformed or the HTTP client
    /// cannot be built
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let auth = resolve_auth(config)?;

        if config.base_url.is_none() {
            tracing::info!("messaging provider not configured, using mock mode");
        }

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            auth,
        })
    }

    /// Gateway that always answers with mocks
    #[must_use]
    pub fn mock() -> Self {
        Self {
            client: Client::new(),
            base_url: None,
            auth: None,
        }
    }

    /// Whether a real provider is configured
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Create an instance
    ///
    /// The returned body is the provider's raw response; use [`extract`] to
    /// pull identifiers out of it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if the provider is unreachable or refuses
    pub async fn create_instance(&self, name: &str) -> Result<Value> {
        let Some(base) = &self.base_url else {
            return Ok(mock::created(&mock::instance_id(name), &mock::token()));
        };

        let req = self
            .client
            .post(format!("{base}/instances"))
            .json(&json!({ "name": name }));
        let (status, body) = self.execute(req).await?;

        if !status.is_success() {
            return Err(Error::Provider(format!(
                "instance creation failed: {status} {}",
                snippet(&body)
            )));
        }

        Ok(serde_json::from_str(&body).unwrap_or_else(|_| json!({})))
    }

    /// Fetch the connection status of an instance
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if the provider is unreachable or refuses
    pub async fn status(&self, instance_id: &str, token: Option<&str>) -> Result<Value> {
        let Some(base) = &self.base_url else {
            return Ok(mock::status(instance_id));
        };

        let req = with_token(
            self.client
                .get(format!("{base}/instances/{}/status", escape(instance_id))),
            token,
        );
        let (status, body) = self.execute(req).await?;

        if !status.is_success() {
            return Err(Error::Provider(format!(
                "status lookup failed: {status} {}",
                snippet(&body)
            )));
        }

        Ok(serde_json::from_str(&body).unwrap_or_else(|_| json!({})))
    }

    /// Fetch the QR/pairing payload
    ///
    /// Tries `/qr` then `/qrcode` and returns the first non-empty 2xx body.
    /// Never fails: when neither path answers, a `waiting-qr` placeholder is
    /// returned.
    pub async fn qr(&self, instance_id: &str, token: Option<&str>) -> Value {
        let Some(base) = &self.base_url else {
            return mock::qr(instance_id);
        };

        for suffix in ["qr", "qrcode"] {
            let url = format!("{base}/instances/{}/{suffix}", escape(instance_id));
            let req = with_token(self.client.get(&url), token);

            match self.execute(req).await {
                Ok((status, body)) if status.is_success() && !body.trim().is_empty() => {
                    return serde_json::from_str(&body).unwrap_or_else(|_| {
                        json!({ "instance": instance_id, "qrcode": body.trim() })
                    });
                }
                Ok((status, _)) => {
                    tracing::debug!(instance_id, %status, path = suffix, "qr path returned nothing");
                }
                Err(e) => {
                    tracing::debug!(instance_id, error = %e, path = suffix, "qr path failed");
                }
            }
        }

        tracing::info!(instance_id, "no qr payload from provider, returning placeholder");
        json!({ "instance": instance_id, "status": mock::WAITING_QR })
    }

    /// Register a webhook with the provider
    ///
    /// `body` is passed through unchanged (`url`, `token`, optional `events`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if the provider is unreachable or refuses
    pub async fn set_webhook(&self, instance_id: &str, body: &Value) -> Result<Value> {
        let Some(base) = &self.base_url else {
            return Ok(mock::webhook_saved());
        };

        let req = self
            .client
            .post(format!("{base}/instances/{}/webhook", escape(instance_id)))
            .json(body);
        let (status, text) = self.execute(req).await?;

        if !status.is_success() {
            return Err(Error::Provider(format!(
                "webhook registration failed: {status} {}",
                snippet(&text)
            )));
        }

        Ok(serde_json::from_str(&text).unwrap_or_else(|_| json!({ "ok": true })))
    }

    /// Send a text message through an instance
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderUnavailable`] when the provider answers with
    /// a 4xx/5xx (typically a disconnected device), or [`Error::Provider`]
    /// if it cannot be reached
    pub async fn send_text(
        &self,
        instance_id: &str,
        token: &str,
        to: &str,
        text: &str,
    ) -> Result<Value> {
        let Some(base) = &self.base_url else {
            return Ok(mock::sent(to));
        };

        let req = self
            .client
            .post(format!("{base}/instances/{}/send/text", escape(instance_id)))
            .json(&json!({ "token": token, "to": to, "text": text }));
        let (status, body) = self.execute(req).await?;

        if status.is_client_error() || status.is_server_error() {
            tracing::warn!(instance_id, %status, "provider rejected text send");
            return Err(Error::ProviderUnavailable(failure_message(&body)));
        }

        Ok(serde_json::from_str(&body).unwrap_or_else(|_| json!({ "ok": true })))
    }

    /// Attach auth, send, and read the body as text
    async fn execute(&self, mut req: RequestBuilder) -> Result<(StatusCode, String)> {
        if let Some(auth) = &self.auth {
            let mut value = HeaderValue::from_str(auth.value.expose_secret())
                .map_err(|e| Error::Config(format!("invalid provider auth value: {e}")))?;
            value.set_sensitive(true);
            req = req.header(auth.name.clone(), value);
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::Provider(format!("request failed: {e}")))?;
        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("json"));
        let body = response
            .text()
            .await
            .map_err(|e| Error::Provider(format!("failed to read response: {e}")))?;

        tracing::debug!(%status, is_json, bytes = body.len(), "provider response");
        Ok((status, body))
    }
}

/// Resolve the auth header from the name and value template
///
/// `%s` in the template is replaced by the API key; an empty template means
/// the raw key. Nothing is sent when either side ends up empty.
fn resolve_auth(config: &ProviderConfig) -> Result<Option<ProviderAuth>> {
    let header = config.auth_header.trim();
    if header.is_empty() {
        return Ok(None);
    }

    let template = config.auth_value.trim();
    let value = if template.contains("%s") {
        if config.api_key.is_empty() {
            return Ok(None);
        }
        template.replace("%s", &config.api_key)
    } else if template.is_empty() {
        config.api_key.clone()
    } else {
        template.to_string()
    };
    if value.trim().is_empty() {
        return Ok(None);
    }

    let name = HeaderName::from_bytes(header.as_bytes())
        .map_err(|e| Error::Config(format!("invalid provider auth header {header:?}: {e}")))?;
    HeaderValue::from_str(&value)
        .map_err(|e| Error::Config(format!("invalid provider auth value: {e}")))?;

    Ok(Some(ProviderAuth {
        name,
        value: SecretString::from(value),
    }))
}

fn with_token(req: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token.map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => req.query(&[("token", token)]),
        None => req,
    }
}

fn escape(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Human-readable message from a failed provider response
fn failure_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = extract::first_string(&json, FAILURE_MESSAGE_PATHS) {
            return msg;
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        SEND_FAILED_MESSAGE.to_string()
    } else {
        crate::text::limit_chars(trimmed, 300)
    }
}

fn snippet(body: &str) -> String {
    crate::text::limit_chars(body, 200)
}

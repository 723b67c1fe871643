//! Relay of inbound provider events to the downstream AI agent
//!
//! One agent backend serves many tenants: unless the configured base already
//! names a concrete webhook, the instance id is appended as a path segment,
//! and tenant context travels on headers.

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tokio::task::JoinHandle;

use crate::config::AgentConfig;
use crate::tenant::{FLOW_HEADER, ORG_HEADER, Tenant};
use crate::{Error, Result};

/// Header carrying the instance id on forwarded events
pub const INSTANCE_ID_HEADER: &str = "X-Instance-ID";

/// Header carrying the instance token on forwarded events
pub const INSTANCE_TOKEN_HEADER: &str = "X-Instance-Token";

/// Path segments that mark a base URL as an already-complete webhook path
const WEBHOOK_SEGMENTS: &[&str] = &["webhook", "webhook-test"];

/// An inbound event ready to be relayed
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub instance_id: String,
    pub token: String,
    pub tenant: Tenant,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Forwards inbound events to the agent backend
#[derive(Debug, Clone)]
pub struct AgentForwarder {
    client: Client,
    base_url: String,
}

impl AgentForwarder {
    /// Create a forwarder from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Forwarding target for an instance
    #[must_use]
    pub fn target_url(&self, instance_id: &str) -> String {
        if names_concrete_webhook(&self.base_url) {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, urlencoding::encode(instance_id))
        }
    }

    /// Forward one event and wait for the agent's answer
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if the agent is unreachable or answers
    /// with an error status
    pub async fn forward(&self, event: &ForwardRequest) -> Result<()> {
        let url = self.target_url(&event.instance_id);
        let content_type = event
            .content_type
            .as_deref()
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or("application/json");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, content_type)
            .header(INSTANCE_ID_HEADER, &event.instance_id)
            .header(INSTANCE_TOKEN_HEADER, &event.token)
            .header(ORG_HEADER, event.tenant.org_id.to_string())
            .header(FLOW_HEADER, event.tenant.flow_id.to_string())
            .body(event.body.clone())
            .send()
            .await
            .map_err(|e| Error::Provider(format!("agent forward to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Provider(format!("agent at {url} answered {status}")));
        }

        tracing::debug!(instance_id = %event.instance_id, %status, "event forwarded to agent");
        Ok(())
    }

    /// Forward in the background; failures are logged and dropped
    ///
    /// The returned handle resolves once the attempt finishes. Callers that
    /// acknowledge the provider never wait on it.
    pub fn dispatch(&self, event: ForwardRequest) -> JoinHandle<()> {
        let forwarder = self.clone();
        tokio::spawn(async move {
            if let Err(e) = forwarder.forward(&event).await {
                tracing::warn!(
                    instance_id = %event.instance_id,
                    org_id = event.tenant.org_id,
                    flow_id = event.tenant.flow_id,
                    target = %forwarder.target_url(&event.instance_id),
                    error = %e,
                    "agent forward failed, event kept in webhook log only"
                );
            }
        })
    }
}

/// Whether the URL path has a `webhook`/`webhook-test` segment followed by
/// another non-empty segment (e.g. `/webhook/<id>`)
fn names_concrete_webhook(base: &str) -> bool {
    let Ok(url) = url::Url::parse(base) else {
        return false;
    };
    let Some(segments) = url.path_segments() else {
        return false;
    };

    let segments: Vec<&str> = segments.filter(|s| !s.is_empty()).collect();
    segments
        .windows(2)
        .any(|pair| WEBHOOK_SEGMENTS.contains(&pair[0]))
}

//! Inbound webhook ingestion
//!
//! Audit-log the raw event, resolve the owning tenant, and hand the event to
//! the forwarder. Only a missing instance id is an error; everything after
//! that is best-effort so the provider always gets its acknowledgment.

use tokio::task::JoinHandle;

use crate::db::webhook_log::SOURCE_PROVIDER;
use crate::db::{InstanceRepo, WebhookLogRepo};
use crate::forwarder::{AgentForwarder, ForwardRequest};
use crate::tenant::Tenant;
use crate::{Error, Result};

/// Outcome of accepting one inbound event
#[derive(Debug)]
pub struct IngestReceipt {
    /// Resolved tenant; anonymous when the instance is not registered
    pub tenant: Tenant,
    /// Whether the instance was found in the registry
    pub known: bool,
    /// Audit log row id, if logging succeeded
    pub log_id: Option<i64>,
    /// Background forward; never awaited on the request path
    pub forward: JoinHandle<()>,
}

/// Accepts provider events and relays them to the agent
#[derive(Clone)]
pub struct WebhookIngestor {
    registry: InstanceRepo,
    log: WebhookLogRepo,
    forwarder: AgentForwarder,
}

impl WebhookIngestor {
    #[must_use]
    pub const fn new(registry: InstanceRepo, log: WebhookLogRepo, forwarder: AgentForwarder) -> Self {
        Self {
            registry,
            log,
            forwarder,
        }
    }

    /// Accept one inbound event
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when `instance_id` is blank; nothing is
    /// logged or forwarded in that case
    pub fn ingest(
        &self,
        instance_id: &str,
        content_type: Option<&str>,
        body: Vec<u8>,
    ) -> Result<IngestReceipt> {
        let instance_id = instance_id.trim();
        if instance_id.is_empty() {
            return Err(Error::Validation("missing instance".to_string()));
        }

        let log_id = match self.log.append(SOURCE_PROVIDER, instance_id, &body) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(instance_id, error = %e, "failed to log inbound webhook");
                None
            }
        };

        let (tenant, token, known) = match self.registry.find(instance_id) {
            Ok(Some(instance)) => (instance.tenant, instance.token, true),
            Ok(None) => {
                tracing::info!(instance_id, "webhook for unregistered instance, forwarding anonymously");
                (Tenant::default(), String::new(), false)
            }
            Err(e) => {
                tracing::warn!(instance_id, error = %e, "registry lookup failed, forwarding anonymously");
                (Tenant::default(), String::new(), false)
            }
        };

        tracing::debug!(
            instance_id,
            org_id = tenant.org_id,
            flow_id = tenant.flow_id,
            bytes = body.len(),
            ?log_id,
            "webhook accepted"
        );

        let forward = self.forwarder.dispatch(ForwardRequest {
            instance_id: instance_id.to_string(),
            token,
            tenant,
            content_type: content_type.map(String::from),
            body,
        });

        Ok(IngestReceipt {
            tenant,
            known,
            log_id,
            forward,
        })
    }
}

//! Messaging provider webhook handler
//!
//! Receives raw provider events for one instance and relays them to the
//! agent. The provider retries anything that is not acknowledged, so once an
//! instance id is present the answer is always 202.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
};
use serde::Serialize;

use crate::api::ApiState;
use crate::api::error::ApiError;

/// Webhook acknowledgment
#[derive(Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
    pub status: &'static str,
}

/// Handle an inbound provider event
pub async fn handle_event(
    State(state): State<Arc<ApiState>>,
    Path(instance): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookResponse>), ApiError> {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());

    let receipt = state.ingestor.ingest(&instance, content_type, body.to_vec())?;
    tracing::debug!(
        instance_id = %instance.trim(),
        known = receipt.known,
        "provider event queued for agent"
    );
    // The forward runs detached; dropping the handle does not cancel it
    drop(receipt.forward);

    Ok((
        StatusCode::ACCEPTED,
        Json(WebhookResponse {
            ok: true,
            status: "queued",
        }),
    ))
}

/// `POST /webhooks/wa` without an instance segment
pub async fn missing_instance() -> ApiError {
    ApiError::bad_request("missing instance")
}

//! Webhook endpoints for messaging provider callbacks

use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, routing::post};

use super::ApiState;

pub mod wa;

/// Largest accepted provider event; media events can carry inline base64
pub const MAX_EVENT_BYTES: usize = 64 * 1024 * 1024;

/// Build webhooks router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route(
            "/wa/{instance}",
            post(wa::handle_event).layer(DefaultBodyLimit::max(MAX_EVENT_BYTES)),
        )
        .route("/wa", post(wa::missing_instance))
        .route("/wa/", post(wa::missing_instance))
        .with_state(state)
}

//! Messaging instance lifecycle endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ApiState;
use super::error::{ApiError, json_body};
use crate::db::Instance;
use crate::tenant::Tenant;

/// Create instance request
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateInstanceRequest {
    pub name: String,
}

/// Optional `?token=` on polling endpoints
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// Send text request
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SendTextRequest {
    pub token: Option<String>,
    pub to: String,
    pub text: String,
}

/// Registered instances of the calling tenant
#[derive(Serialize)]
pub struct InstanceListResponse {
    pub instances: Vec<Instance>,
}

/// Build instances router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(list_instances).post(create_instance))
        .route("/{instance}/status", get(instance_status))
        .route("/{instance}/qr", get(instance_qr))
        .route("/{instance}/qrcode", get(instance_qr))
        .route("/{instance}/webhook", post(set_webhook))
        .route("/{instance}/send/text", post(send_text))
        .with_state(state)
}

async fn create_instance(
    State(state): State<Arc<ApiState>>,
    tenant: Tenant,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request: CreateInstanceRequest = json_body(&body)?;
    let created = state.instances.create(tenant, &request.name).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_instances(
    State(state): State<Arc<ApiState>>,
    tenant: Tenant,
) -> Result<Json<InstanceListResponse>, ApiError> {
    let instances = state.instances.list(tenant)?;
    Ok(Json(InstanceListResponse { instances }))
}

async fn instance_status(
    State(state): State<Arc<ApiState>>,
    Path(instance): Path<String>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Value>, ApiError> {
    let status = state
        .instances
        .status(&instance, query.token.as_deref())
        .await?;
    Ok(Json(status))
}

async fn instance_qr(
    State(state): State<Arc<ApiState>>,
    Path(instance): Path<String>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Value>, ApiError> {
    let qr = state.instances.qr(&instance, query.token.as_deref()).await?;
    Ok(Json(qr))
}

async fn set_webhook(
    State(state): State<Arc<ApiState>>,
    tenant: Tenant,
    Path(instance): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body: Value = json_body(&body)?;
    let registered = state.instances.set_webhook(tenant, &instance, body).await?;
    Ok(Json(registered))
}

async fn send_text(
    State(state): State<Arc<ApiState>>,
    Path(instance): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request: SendTextRequest = json_body(&body)?;
    let sent = state
        .instances
        .send_text(&instance, request.token.as_deref(), &request.to, &request.text)
        .await?;
    Ok(Json(sent))
}

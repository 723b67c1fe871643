//! Conversational cataloging endpoints: chat and image upload

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderMap, header},
    routing::post,
};
use serde::Serialize;

use super::ApiState;
use super::error::{ApiError, json_body};
use crate::commerce::{ChatInput, ChatOutcome, DEFAULT_IMAGE_MIME, ProductSuggestion};
use crate::db::Product;
use crate::tenant::Tenant;

/// Largest accepted upload body
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Chat reply, with the aliases chat widgets look for
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub ok: bool,
    pub reply: String,
    pub message: String,
    pub text: String,
    pub content: String,
    pub choices: Vec<ChatChoice>,
    /// Catalog entry created when this message closed a pending product
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
}

#[derive(Debug, Serialize)]
pub struct ChatChoice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Serialize)]
pub struct ChoiceMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatResponse {
    fn new(reply: String, product: Option<Product>) -> Self {
        Self {
            ok: true,
            message: reply.clone(),
            text: reply.clone(),
            content: reply.clone(),
            choices: vec![ChatChoice {
                message: ChoiceMessage {
                    role: "assistant",
                    content: reply.clone(),
                },
            }],
            reply,
            product,
        }
    }
}

/// Result of an image upload
#[derive(Debug, Serialize)]
pub struct VisionUploadResponse {
    pub ok: bool,
    pub reply: String,
    pub image_url: String,
    pub suggest: ProductSuggestion,
}

/// Result of a plain image upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// Build chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route(
            "/vision/upload",
            post(vision_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/upload",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .with_state(state)
}

async fn chat(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<ChatResponse>, ApiError> {
    let input: ChatInput = json_body(&body)?;
    let response = match state.chat.handle(input).await? {
        ChatOutcome::Committed { reply, product } => ChatResponse::new(reply, Some(product)),
        outcome => ChatResponse::new(outcome.reply().to_string(), None),
    };
    Ok(Json(response))
}

/// Multipart fields of an upload
#[derive(Default)]
struct UploadForm {
    image: Option<(Vec<u8>, String)>,
    session_id: String,
    prompt: String,
}

async fn vision_upload(
    State(state): State<Arc<ApiState>>,
    tenant: Tenant,
    multipart: Multipart,
) -> Result<Json<VisionUploadResponse>, ApiError> {
    let form = read_form(multipart).await?;
    let Some((image, mime)) = form.image else {
        return Err(ApiError::bad_request("image file required"));
    };
    if image.is_empty() {
        return Err(ApiError::bad_request("image file is empty"));
    }

    let staged = state
        .vision
        .analyze_and_stage(&image, &mime, &form.session_id, tenant, &form.prompt)
        .await?;

    Ok(Json(VisionUploadResponse {
        ok: true,
        reply: staged.reply,
        image_url: staged.image_url,
        suggest: staged.suggestion,
    }))
}

/// Store an image without analysis and return where it is served
async fn upload_image(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let form = read_form(multipart).await?;
    let Some((image, mime)) = form.image.filter(|(bytes, _)| !bytes.is_empty()) else {
        return Err(ApiError::bad_request("image file required"));
    };

    let stored = state.uploads.save(&image, &mime).await?;
    Ok(Json(UploadResponse {
        url: absolute_url(&headers, &stored.url),
    }))
}

/// Prefix `path` with the scheme and host the client used, when known
fn absolute_url(headers: &HeaderMap, path: &str) -> String {
    let Some(host) = headers.get(header::HOST).and_then(|v| v.to_str().ok()) else {
        return path.to_string();
    };
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    format!("{scheme}://{host}{path}")
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("multipart parse error: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let mime = field.content_type().unwrap_or(DEFAULT_IMAGE_MIME).to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("read file error: {e}")))?;
                form.image = Some((bytes.to_vec(), mime));
            }
            "sessionId" | "prompt" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("multipart parse error: {e}")))?;
                if name == "sessionId" {
                    form.session_id = value;
                } else {
                    form.prompt = value;
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

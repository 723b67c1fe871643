//! Vision intake: image in, suggested product draft out
//!
//! The model is asked for strict JSON. Anything unusable (malformed reply,
//! blank title, failed call, no AI configured) degrades to a fallback
//! suggestion so the user can always continue to the price step.

use std::sync::Arc;

use base64::Engine;
use serde::Serialize;

use super::{PendingProduct, PendingProducts, ProductSuggestion, UploadStore};
use crate::Result;
use crate::ai::{CompletionProvider, CompletionRequest, ModelKind, PromptMessage};
use crate::tenant::Tenant;
use crate::text::limit_chars;

/// Media type assumed for uploads that do not declare an image type
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// Reply cap for the suggestion JSON (a 300 char description plus tags fits)
const VISION_MAX_TOKENS: u32 = 400;

const CATALOG_PROMPT: &str = "Você é um assistente de catalogação de e-commerce. \
Gere APENAS um JSON com os campos: \
{\"title\": string (máx 60 chars), \"description\": string (150-300 chars), \"category\": string, \"tags\": string[]}. \
Sem comentários, sem markdown, sem texto extra. Se a imagem não for clara, dê um título genérico.";

/// Result of staging an uploaded image
#[derive(Debug, Clone, Serialize)]
pub struct StagedProduct {
    pub image_url: String,
    #[serde(rename = "suggest")]
    pub suggestion: ProductSuggestion,
    pub reply: String,
    /// Whether a pending session was opened (false for anonymous uploads)
    #[serde(skip)]
    pub session_opened: bool,
}

/// Analyzes uploaded images and opens pending product sessions
#[derive(Clone)]
pub struct VisionIntake {
    ai: Option<Arc<dyn CompletionProvider>>,
    uploads: UploadStore,
    pending: Arc<PendingProducts>,
}

impl VisionIntake {
    #[must_use]
    pub fn new(
        ai: Option<Arc<dyn CompletionProvider>>,
        uploads: UploadStore,
        pending: Arc<PendingProducts>,
    ) -> Self {
        Self {
            ai,
            uploads,
            pending,
        }
    }

    /// Suggest metadata for an image, store it, and wait for a price
    ///
    /// # Errors
    ///
    /// Returns error only if the image cannot be stored
    pub async fn analyze_and_stage(
        &self,
        image: &[u8],
        mime: &str,
        session_id: &str,
        tenant: Tenant,
        hint: &str,
    ) -> Result<StagedProduct> {
        let mime = normalize_mime(mime);
        let hint = hint.trim();

        let suggestion = self.suggest(image, &mime, hint).await;
        let stored = self.uploads.save(image, &mime).await?;

        let session_id = session_id.trim();
        let session_opened = self.pending.open(
            session_id,
            PendingProduct {
                tenant,
                image_path: stored.path,
                image_url: stored.url.clone(),
                suggestion: suggestion.clone(),
            },
        );

        tracing::info!(
            session_id,
            org_id = tenant.org_id,
            flow_id = tenant.flow_id,
            image_url = %stored.url,
            session_opened,
            "product staged from image"
        );

        Ok(StagedProduct {
            reply: staged_reply(&suggestion),
            image_url: stored.url,
            suggestion,
            session_opened,
        })
    }

    async fn suggest(&self, image: &[u8], mime: &str, hint: &str) -> ProductSuggestion {
        let Some(ai) = &self.ai else {
            tracing::info!("AI not configured, using fallback product suggestion");
            return ProductSuggestion::fallback(hint, ProductSuggestion::default());
        };

        let data_url = format!(
            "data:{mime};base64,{}",
            base64::engine::general_purpose::STANDARD.encode(image)
        );
        let prompt = if hint.is_empty() {
            CATALOG_PROMPT.to_string()
        } else {
            format!("{CATALOG_PROMPT}\nDica: {hint}")
        };

        let request = CompletionRequest::new(
            ModelKind::Vision,
            vec![PromptMessage::user(prompt).with_image(data_url)],
        )
        .with_temperature(0.2)
        .with_max_tokens(VISION_MAX_TOKENS);

        match ai.complete(&request).await {
            Ok(reply) => parse_suggestion(&reply, hint),
            Err(e) => {
                tracing::warn!(provider = ai.name(), error = %e, "vision call failed, using fallback suggestion");
                ProductSuggestion::fallback(hint, ProductSuggestion::default())
            }
        }
    }
}

/// Anything that is not `image/*` is treated as PNG
fn normalize_mime(mime: &str) -> String {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    if essence.starts_with("image/") {
        essence
    } else {
        DEFAULT_IMAGE_MIME.to_string()
    }
}

/// Parse the model's JSON reply, falling back when unusable
fn parse_suggestion(reply: &str, hint: &str) -> ProductSuggestion {
    match serde_json::from_str::<ProductSuggestion>(strip_code_fence(reply)) {
        Ok(parsed) if !parsed.title.trim().is_empty() => parsed,
        Ok(partial) => {
            tracing::debug!("model suggestion has no title, using fallback");
            ProductSuggestion::fallback(hint, partial)
        }
        Err(e) => {
            tracing::debug!(error = %e, "model suggestion is not valid JSON, using fallback");
            ProductSuggestion::fallback(hint, ProductSuggestion::default())
        }
    }
}

/// Remove a surrounding markdown code fence (```json ... ```)
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    // Drop the language tag on the opening line
    match inner.split_once('\n') {
        Some((first, rest)) if !first.trim_start().starts_with('{') => rest.trim(),
        _ => inner.trim(),
    }
}

fn staged_reply(suggestion: &ProductSuggestion) -> String {
    format!(
        "Sugeri **{}**.\nDescrição: {}\nCategoria: {}\nMe diga o preço (ex.: 129,90) que eu já cadastro.",
        limit_chars(&suggestion.title, 60),
        limit_chars(&suggestion.description, 280),
        limit_chars(&suggestion.category, 80),
    )
}

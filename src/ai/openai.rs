//! OpenAI-compatible chat completions client (text and vision)

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{CompletionProvider, CompletionRequest, ModelKind, PromptMessage, Role};
use crate::config::AiConfig;
use crate::{Error, Result};

/// Chat completions client
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    text_model: String,
    vision_model: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("vision_model", &self.vision_model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: Role,
    content: Content<'a>,
}

/// Plain text, or parts when an image is attached
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Content<'a> {
    Text(&'a str),
    Parts(Vec<Part<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Part<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a client; returns `None` when no API key is configured
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn from_config(config: &AiConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            tracing::info!("AI API key not set, chat completions disabled");
            return Ok(None);
        };

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Some(Self {
            client,
            api_key: SecretString::from(api_key.to_string()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            text_model: config.text_model.clone(),
            vision_model: config.vision_model.clone(),
        }))
    }

    fn model(&self, kind: ModelKind) -> &str {
        match kind {
            ModelKind::Text => self.text_model.as_str(),
            ModelKind::Vision => self.vision_model.as_str(),
        }
    }
}

fn to_wire(message: &PromptMessage) -> ChatMessage<'_> {
    let content = match &message.image_url {
        Some(url) => Content::Parts(vec![
            Part::Text {
                text: &message.text,
            },
            Part::ImageUrl {
                image_url: ImageUrl { url },
            },
        ]),
        None => Content::Text(&message.text),
    };

    ChatMessage {
        role: message.role,
        content,
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let model = self.model(request.model);
        let body = ChatRequest {
            model,
            messages: request.messages.iter().map(to_wire).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Ai(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Ai(format!(
                "API error {status}: {}",
                crate::text::limit_chars(&text, 300)
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Ai(format!("parse error: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::Ai("empty response from completion API".to_string()))?;

        tracing::debug!(model, chars = content.chars().count(), "completion received");
        Ok(content)
    }
}

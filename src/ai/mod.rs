//! AI completion services used by the chat router and vision intake

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use openai::OpenAiClient;

/// Author of a prompt message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Parse a caller-supplied role; anything unknown is treated as `user`
    #[must_use]
    pub fn parse_lenient(role: &str) -> Self {
        match role.trim().to_lowercase().as_str() {
            "system" => Self::System,
            "assistant" | "bot" | "ai" => Self::Assistant,
            _ => Self::User,
        }
    }
}

/// One message in a completion prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: Role,
    pub text: String,
    /// Inline image (data URL or public URL) attached to this message
    pub image_url: Option<String>,
}

impl PromptMessage {
    #[must_use]
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            image_url: None,
        }
    }

    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    #[must_use]
    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}

/// Which configured model a request should use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// General chat
    Text,
    /// Image analysis
    Vision,
}

/// A completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: ModelKind,
    pub messages: Vec<PromptMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    #[must_use]
    pub const fn new(model: ModelKind, messages: Vec<PromptMessage>) -> Self {
        Self {
            model,
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A chat/vision completion backend
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Run a completion and return the assistant text
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Ai`] if the call fails or returns no text
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

//! Conversational product cataloging
//!
//! An uploaded image becomes an AI-suggested draft held per chat session
//! ([`pending`]); the next chat message that parses as a price ([`price`])
//! commits it to the catalog ([`chat`]).

pub mod chat;
pub mod pending;
pub mod price;
pub mod uploads;
pub mod vision;

use serde::{Deserialize, Serialize};

pub use chat::{ChatInput, ChatOutcome, ChatRouter, CommitOutcome, HistoryTurn};
pub use pending::{PendingProduct, PendingProducts};
pub use price::parse_price_to_cents;
pub use uploads::{StoredImage, UploadStore};
pub use vision::{DEFAULT_IMAGE_MIME, StagedProduct, VisionIntake};

/// Title used when neither the model nor the user gave one
pub const FALLBACK_TITLE: &str = "Produto";

/// Description used when the model reply is unusable
pub const FALLBACK_DESCRIPTION: &str = "Produto cadastrado automaticamente.";

/// Category used when the model reply is unusable
pub const FALLBACK_CATEGORY: &str = "Geral";

/// Product metadata proposed from an image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductSuggestion {
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
}

impl ProductSuggestion {
    /// Deterministic suggestion for when the model gives nothing usable
    ///
    /// Keeps a category or tags the model did manage to return.
    #[must_use]
    pub fn fallback(hint: &str, partial: Self) -> Self {
        let hint = hint.trim();
        Self {
            title: if hint.is_empty() { FALLBACK_TITLE } else { hint }.to_string(),
            description: FALLBACK_DESCRIPTION.to_string(),
            category: if partial.category.trim().is_empty() {
                FALLBACK_CATEGORY.to_string()
            } else {
                partial.category
            },
            tags: partial.tags,
        }
    }
}

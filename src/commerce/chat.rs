//! Chat routing: price resolution for pending products, general chat
//! otherwise

use std::sync::Arc;

use serde::Deserialize;

use super::{PendingProducts, parse_price_to_cents};
use crate::ai::{CompletionProvider, CompletionRequest, ModelKind, PromptMessage, Role};
use crate::db::{CatalogRepo, NewProduct, Product};
use crate::text::{first_non_blank, limit_chars};
use crate::{Error, Result};

/// Re-prompt sent when a pending session gets a message that is not a price
pub const PRICE_REPROMPT: &str =
    "Por favor, informe o preço no formato 12,34 ou 12.34 (ex.: 129,90).";

/// A previous turn supplied by the caller
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryTurn {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// Incoming chat message
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatInput {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
    #[serde(default)]
    pub system: Option<String>,
}

/// Result of trying to close a pending session with a price
#[derive(Debug)]
pub enum CommitOutcome {
    /// No pending product for the session
    NoSession,
    /// A pending product exists but the text is not a price; it stays open
    InvalidPrice,
    /// The product was written to the catalog and the session closed
    Committed(Product),
}

/// What the router answered
#[derive(Debug)]
pub enum ChatOutcome {
    Committed { reply: String, product: Product },
    Reprompt { reply: String },
    Reply { reply: String },
}

impl ChatOutcome {
    #[must_use]
    pub fn reply(&self) -> &str {
        match self {
            Self::Committed { reply, .. } | Self::Reprompt { reply } | Self::Reply { reply } => reply,
        }
    }
}

/// Routes chat messages to price resolution or a general completion
#[derive(Clone)]
pub struct ChatRouter {
    ai: Option<Arc<dyn CompletionProvider>>,
    pending: Arc<PendingProducts>,
    catalog: CatalogRepo,
}

impl ChatRouter {
    #[must_use]
    pub fn new(
        ai: Option<Arc<dyn CompletionProvider>>,
        pending: Arc<PendingProducts>,
        catalog: CatalogRepo,
    ) -> Self {
        Self {
            ai,
            pending,
            catalog,
        }
    }

    /// Handle one chat message
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty message,
    /// [`Error::NotConfigured`] when general chat is needed but no AI is
    /// configured, and AI or database errors otherwise
    pub async fn handle(&self, input: ChatInput) -> Result<ChatOutcome> {
        let message = input.message.trim();
        if message.is_empty() {
            return Err(Error::Validation("message required".to_string()));
        }

        let session_id = input.session_id.as_deref().map_or("", str::trim);
        match self.try_commit(session_id, message)? {
            CommitOutcome::Committed(product) => {
                return Ok(ChatOutcome::Committed {
                    reply: committed_reply(&product),
                    product,
                });
            }
            CommitOutcome::InvalidPrice => {
                return Ok(ChatOutcome::Reprompt {
                    reply: PRICE_REPROMPT.to_string(),
                });
            }
            CommitOutcome::NoSession => {}
        }

        let reply = self
            .complete(input.system.as_deref(), &input.history, message)
            .await?;
        Ok(ChatOutcome::Reply { reply })
    }

    /// Close the pending session for `session_id` if `raw_price` parses
    ///
    /// The entry is removed only once the price parses; if the catalog
    /// insert then fails it is put back.
    ///
    /// # Errors
    ///
    /// Returns error if the catalog insert fails
    pub fn try_commit(&self, session_id: &str, raw_price: &str) -> Result<CommitOutcome> {
        if session_id.is_empty() || !self.pending.contains(session_id) {
            return Ok(CommitOutcome::NoSession);
        }

        let Some(cents) = parse_price_to_cents(raw_price) else {
            tracing::debug!(session_id, "pending product got a non-price message");
            return Ok(CommitOutcome::InvalidPrice);
        };

        // Another request may have committed between the check and here
        let Some(pending) = self.pending.take(session_id) else {
            return Ok(CommitOutcome::NoSession);
        };

        let suggestion = &pending.suggestion;
        let tags = suggestion.tags.join(", ");
        let new_product = NewProduct {
            tenant: pending.tenant,
            title: limit_chars(&suggestion.title, 60),
            slug: limit_chars(first_non_blank(&[suggestion.description.as_str(), tags.as_str()]), 300),
            image_url: pending.image_url.clone(),
            price_cents: cents,
            category: limit_chars(&suggestion.category, 80),
        };

        match self.catalog.insert(new_product) {
            Ok(product) => {
                tracing::info!(
                    session_id,
                    product_id = product.id,
                    price_cents = cents,
                    "pending product committed"
                );
                Ok(CommitOutcome::Committed(product))
            }
            Err(e) => {
                tracing::error!(session_id, error = %e, "catalog insert failed, keeping pending product");
                self.pending.restore(session_id, pending);
                Err(e)
            }
        }
    }

    async fn complete(
        &self,
        system: Option<&str>,
        history: &[HistoryTurn],
        message: &str,
    ) -> Result<String> {
        let Some(ai) = &self.ai else {
            return Err(Error::NotConfigured("OPENAI_API_KEY not set".to_string()));
        };

        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(system) = system.map(str::trim).filter(|s| !s.is_empty()) {
            messages.push(PromptMessage::system(system));
        }
        messages.extend(
            history
                .iter()
                .map(|turn| PromptMessage::new(Role::parse_lenient(&turn.role), turn.content.clone())),
        );
        messages.push(PromptMessage::user(message));

        ai.complete(&CompletionRequest::new(ModelKind::Text, messages))
            .await
    }
}

#[allow(clippy::cast_precision_loss)]
fn committed_reply(product: &Product) -> String {
    format!(
        "✅ Produto **{}** cadastrado por R$ {:.2}.\nCategoria: {}\nImagem: {}",
        product.title,
        product.price_cents as f64 / 100.0,
        product.category,
        product.image_url,
    )
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::commerce::{PendingProduct, ProductSuggestion};
    use crate::db::init_memory;
    use crate::tenant::Tenant;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl CompletionProvider for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.seen.lock().unwrap().push(request.clone());
            Ok("Olá! Como posso ajudar?".to_string())
        }
    }

    fn pending_product() -> PendingProduct {
        PendingProduct {
            tenant: Tenant::new(7, 3),
            image_path: PathBuf::from("uploads/prod_1.png"),
            image_url: "/uploads/prod_1.png".to_string(),
            suggestion: ProductSuggestion {
                title: "Luminária de mesa".to_string(),
                description: String::new(),
                category: "Casa".to_string(),
                tags: vec!["iluminação".to_string(), "decor".to_string()],
            },
        }
    }

    fn router(ai: Option<Arc<dyn CompletionProvider>>) -> (ChatRouter, Arc<PendingProducts>, CatalogRepo) {
        let pending = Arc::new(PendingProducts::default());
        let catalog = CatalogRepo::new(init_memory().unwrap());
        (
            ChatRouter::new(ai, pending.clone(), catalog.clone()),
            pending,
            catalog,
        )
    }

    fn input(message: &str, session: Option<&str>) -> ChatInput {
        ChatInput {
            message: message.to_string(),
            session_id: session.map(String::from),
            ..ChatInput::default()
        }
    }

    #[tokio::test]
    async fn price_commits_pending_product() {
        let (router, pending, catalog) = router(None);
        pending.open("s1", pending_product());

        let outcome = router.handle(input("129,90", Some("s1"))).await.unwrap();
        let ChatOutcome::Committed { reply, product } = outcome else {
            panic!("expected commit");
        };

        assert_eq!(product.price_cents, 12990);
        assert_eq!(product.tenant, Tenant::new(7, 3));
        assert_eq!(product.slug, "iluminação, decor");
        assert_eq!(product.stock, 0);
        assert!(reply.contains("R$ 129.90"));
        assert!(reply.contains("Luminária de mesa"));
        assert!(pending.get("s1").is_none());
        assert_eq!(catalog.list(Tenant::new(7, 3)).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn non_price_reprompts_and_keeps_session() {
        let (router, pending, catalog) = router(None);
        pending.open("s1", pending_product());

        let outcome = router.handle(input("quanto custa?", Some("s1"))).await.unwrap();
        assert!(matches!(outcome, ChatOutcome::Reprompt { .. }));
        assert_eq!(outcome.reply(), PRICE_REPROMPT);
        assert_eq!(pending.get("s1").unwrap(), pending_product());
        assert!(catalog.list(Tenant::new(7, 3)).unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let (router, _, _) = router(None);
        let err = router.handle(input("   ", Some("s1"))).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn general_chat_without_ai_is_not_configured() {
        let (router, _, _) = router(None);
        let err = router.handle(input("oi", None)).await.unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)));
    }

    #[tokio::test]
    async fn general_chat_builds_prompt() {
        let ai = Arc::new(Recording::default());
        let (router, _, _) = router(Some(ai.clone()));

        let outcome = router
            .handle(ChatInput {
                message: "oi".to_string(),
                session_id: Some("no-pending".to_string()),
                history: vec![
                    HistoryTurn {
                        role: "assistant".to_string(),
                        content: "bem-vindo".to_string(),
                    },
                    HistoryTurn {
                        role: "robot".to_string(),
                        content: "x".to_string(),
                    },
                ],
                system: Some("Seja breve.".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(outcome.reply(), "Olá! Como posso ajudar?");

        let seen = ai.seen.lock().unwrap();
        let roles: Vec<Role> = seen[0].messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::Assistant, Role::User, Role::User]
        );
        assert_eq!(seen[0].model, ModelKind::Text);
    }
}

//! HTTP API server for the shopchat gateway

pub mod chat;
pub mod error;
pub mod health;
pub mod instances;
pub mod webhooks;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

use crate::Config;
use crate::ai::{CompletionProvider, OpenAiClient};
use crate::commerce::{ChatRouter, PendingProducts, UploadStore, VisionIntake};
use crate::db::{CatalogRepo, DbPool, InstanceRepo, WebhookLogRepo};
use crate::forwarder::{AgentForwarder, INSTANCE_ID_HEADER, INSTANCE_TOKEN_HEADER};
use crate::ingest::WebhookIngestor;
use crate::instances::InstanceManager;
use crate::provider::ProviderGateway;
use crate::tenant::{FLOW_HEADER, ORG_HEADER};
use crate::{Error, Result};

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub db: DbPool,
    pub instances: InstanceManager,
    pub ingestor: WebhookIngestor,
    pub vision: VisionIntake,
    pub chat: ChatRouter,
    pub pending: Arc<PendingProducts>,
    pub uploads: UploadStore,
    /// Whether a completion provider is available
    pub ai_configured: bool,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    config: Config,
    db: DbPool,
    provider: Option<ProviderGateway>,
    completion: Option<Arc<dyn CompletionProvider>>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(config: Config, db: DbPool) -> Self {
        Self {
            config,
            db,
            provider: None,
            completion: None,
        }
    }

    /// Use this provider gateway instead of one built from configuration
    #[must_use]
    pub fn provider(mut self, provider: ProviderGateway) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use this completion provider instead of the configured OpenAI client
    #[must_use]
    pub fn completion_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completion = Some(provider);
        self
    }

    /// Build the API server
    ///
    /// # Errors
    ///
    /// Returns error if an HTTP client cannot be built or the provider auth
    /// header is malformed
    pub fn build(self) -> Result<ApiServer> {
        let config = self.config;

        let provider = match self.provider {
            Some(provider) => provider,
            None => ProviderGateway::new(&config.provider)?,
        };
        let completion = match self.completion {
            Some(completion) => Some(completion),
            None => OpenAiClient::from_config(&config.ai)?
                .map(|client| Arc::new(client) as Arc<dyn CompletionProvider>),
        };
        if completion.is_none() {
            tracing::info!("AI not configured: chat disabled, uploads use fallback suggestions");
        }

        let registry = InstanceRepo::new(self.db.clone());
        let instances = InstanceManager::new(Arc::new(provider), registry.clone());
        let ingestor = WebhookIngestor::new(
            registry,
            WebhookLogRepo::new(self.db.clone()),
            AgentForwarder::new(&config.agent)?,
        );

        let uploads = UploadStore::new(&config.uploads);
        let pending = Arc::new(PendingProducts::new(config.pending.ttl));
        let vision = VisionIntake::new(completion.clone(), uploads.clone(), pending.clone());
        let chat = ChatRouter::new(
            completion.clone(),
            pending.clone(),
            CatalogRepo::new(self.db.clone()),
        );

        let state = Arc::new(ApiState {
            db: self.db,
            instances,
            ingestor,
            vision,
            chat,
            pending,
            uploads: uploads.clone(),
            ai_configured: completion.is_some(),
        });

        Ok(ApiServer {
            state,
            port: config.server.port,
            allowed_origins: config.server.allowed_origins,
            request_timeout: config.server.request_timeout,
            uploads,
        })
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    allowed_origins: Vec<String>,
    request_timeout: Duration,
    uploads: UploadStore,
}

impl ApiServer {
    /// Shared handler state
    #[must_use]
    pub fn state(&self) -> Arc<ApiState> {
        self.state.clone()
    }

    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let router = Router::new()
            .nest("/wa/instances", instances::router(self.state.clone()))
            .nest("/webhooks", webhooks::router(self.state.clone()))
            .merge(chat::router(self.state.clone()))
            .merge(health::router())
            .merge(health::ready_router(self.state.clone()))
            .nest_service(self.uploads.public_prefix(), ServeDir::new(self.uploads.dir()));

        router
            .layer(self.cors())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                self.request_timeout,
            ))
            .layer(TraceLayer::new_for_http())
    }

    /// CORS for browser chat widgets; no configured origins means any
    fn cors(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        let allow_origin = if origins.is_empty() {
            AllowOrigin::from(Any)
        } else {
            AllowOrigin::list(origins)
        };

        let mut allow_headers = vec![header::CONTENT_TYPE, header::AUTHORIZATION];
        allow_headers.extend(
            [ORG_HEADER, FLOW_HEADER, INSTANCE_ID_HEADER, INSTANCE_TOKEN_HEADER]
                .into_iter()
                .filter_map(|name| HeaderName::from_bytes(name.as_bytes()).ok()),
        );

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(Any)
            .allow_headers(allow_headers)
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(
            port = self.port,
            provider_mock = !self.state.instances.provider_configured(),
            ai = self.state.ai_configured,
            "API server listening"
        );

        axum::serve(listener, self.router())
            .await
            .map_err(|e| Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

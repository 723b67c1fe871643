//! Configuration management for the shopchat gateway
//!
//! Built once at startup and handed to each component. Precedence is
//! env > TOML file > default.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Default forwarding target for inbound provider events
pub const DEFAULT_AGENT_BASE_URL: &str = "http://localhost:5678/webhook";

/// Default model for general chat completions
pub const DEFAULT_TEXT_MODEL: &str = "gpt-4o-mini";

/// Default model for image analysis
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o";

const DEFAULT_AI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_PORT: u16 = 8080;

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Path to the `SQLite` database file
    pub database_path: PathBuf,

    /// Messaging provider gateway
    pub provider: ProviderConfig,

    /// Downstream AI agent that receives forwarded webhook events
    pub agent: AgentConfig,

    /// Chat and vision completion services
    pub ai: AiConfig,

    /// Where uploaded product images are stored and served from
    pub uploads: UploadConfig,

    /// Pending product session store
    pub pending: PendingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Allowed CORS origins; empty means any origin
    pub allowed_origins: Vec<String>,

    /// Server-wide deadline for a single inbound request
    pub request_timeout: Duration,
}

/// Messaging provider configuration
///
/// A missing `base_url` switches every provider operation into mock mode.
#[derive(Clone)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub api_key: String,
    /// Authentication header name (e.g. `Authorization`, `X-API-KEY`)
    pub auth_header: String,
    /// Authentication header value template, `%s` is replaced by the key
    pub auth_value: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("auth_header", &self.auth_header)
            .field("auth_value", &self.auth_value)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Downstream agent forwarding configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub base_url: String,
    pub timeout: Duration,
}

/// AI completion service configuration
#[derive(Clone)]
pub struct AiConfig {
    /// API key; `None` disables general chat completions
    pub api_key: Option<String>,
    pub base_url: String,
    pub text_model: String,
    pub vision_model: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("api_key", &self.api_key.as_deref().map(redact))
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("vision_model", &self.vision_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Upload storage configuration
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory images are written to
    pub dir: PathBuf,
    /// URL prefix the directory is served under
    pub public_prefix: String,
}

/// Pending product session configuration
#[derive(Debug, Clone, Default)]
pub struct PendingConfig {
    /// Expire abandoned sessions after this long; `None` keeps them until
    /// committed or overwritten
    pub ttl: Option<Duration>,
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "[redacted]" }
}

impl Config {
    /// Load configuration from the process environment and config file
    ///
    /// # Errors
    ///
    /// Returns error if a configured URL is malformed
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed config file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a configured URL is malformed
    pub fn from_sources<F>(fc: file::ShopchatConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let env_secs = |key: &str| env(key).and_then(|v| v.parse::<u64>().ok());

        let server = ServerConfig {
            port: env("SHOPCHAT_PORT")
                .or_else(|| env("PORT"))
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
            allowed_origins: env("ALLOWED_ORIGINS")
                .map(|v| split_list(&v))
                .or(fc.server.allowed_origins)
                .map(|origins| origins.into_iter().filter(|o| o != "*").collect())
                .unwrap_or_default(),
            request_timeout: Duration::from_secs(
                env_secs("SHOPCHAT_REQUEST_TIMEOUT_SECS")
                    .or(fc.server.request_timeout_secs)
                    .unwrap_or(60),
            ),
        };

        let database_path = env("DATABASE_PATH")
            .or(fc.database.path)
            .map_or_else(default_database_path, PathBuf::from);

        let provider = ProviderConfig {
            base_url: env("UAZAPI_BASE")
                .or(fc.provider.base_url)
                .map(|u| u.trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty()),
            api_key: env("UAZAPI_TOKEN").or(fc.provider.api_key).unwrap_or_default(),
            auth_header: env("UAZAPI_AUTH_HEADER")
                .or(fc.provider.auth_header)
                .unwrap_or_else(|| "Authorization".to_string()),
            auth_value: env("UAZAPI_AUTH_VALUE")
                .or(fc.provider.auth_value)
                .unwrap_or_else(|| "Bearer %s".to_string()),
            timeout: Duration::from_secs(
                env_secs("UAZAPI_TIMEOUT_SECS")
                    .or(fc.provider.timeout_secs)
                    .unwrap_or(35),
            ),
        };
        if let Some(base) = &provider.base_url {
            validate_url("provider base URL", base)?;
        }

        let agent = AgentConfig {
            base_url: env("AGENT_WEBHOOK_BASE")
                .or(fc.agent.base_url)
                .unwrap_or_else(|| DEFAULT_AGENT_BASE_URL.to_string()),
            timeout: Duration::from_secs(
                env_secs("AGENT_TIMEOUT_SECS")
                    .or(fc.agent.timeout_secs)
                    .unwrap_or(20),
            ),
        };
        validate_url("agent webhook base URL", &agent.base_url)?;

        let ai = AiConfig {
            api_key: env("OPENAI_API_KEY").or(fc.ai.api_key),
            base_url: env("OPENAI_BASE_URL")
                .or(fc.ai.base_url)
                .unwrap_or_else(|| DEFAULT_AI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            text_model: env("TEXT_MODEL")
                .or(fc.ai.text_model)
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            vision_model: env("VISION_MODEL")
                .or(fc.ai.vision_model)
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            timeout: Duration::from_secs(
                env_secs("OPENAI_TIMEOUT_SECS")
                    .or(fc.ai.timeout_secs)
                    .unwrap_or(30),
            ),
        };
        validate_url("AI base URL", &ai.base_url)?;

        let uploads = UploadConfig {
            dir: PathBuf::from(
                env("UPLOAD_DIR")
                    .or(fc.uploads.dir)
                    .unwrap_or_else(|| "uploads".to_string()),
            ),
            public_prefix: normalize_prefix(
                &env("UPLOAD_PUBLIC_PREFIX")
                    .or(fc.uploads.public_prefix)
                    .unwrap_or_else(|| "/uploads".to_string()),
            ),
        };

        let pending = PendingConfig {
            ttl: env_secs("PENDING_TTL_SECS")
                .or(fc.pending.ttl_secs)
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        };

        Ok(Self {
            server,
            database_path,
            provider,
            agent,
            ai,
            uploads,
            pending,
        })
    }

    /// Whether the messaging provider is configured (otherwise mock mode)
    #[must_use]
    pub const fn provider_configured(&self) -> bool {
        self.provider.base_url.is_some()
    }
}

/// Default database path: `~/.local/share/shopchat/shopchat.db` on Linux
fn default_database_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("shopchat.db"),
        |d| d.data_dir().join("shopchat").join("shopchat.db"),
    )
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Leading slash, no trailing slash; uploads cannot be served at the root
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/uploads".to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn validate_url(what: &str, value: &str) -> Result<()> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| Error::Config(format!("invalid {what} {value:?}: {e}")))
}

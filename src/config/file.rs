//! TOML configuration file loading
//!
//! Supports `~/.config/shopchat/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ShopchatConfigFile {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseFileConfig,

    /// Messaging provider settings
    #[serde(default)]
    pub provider: ProviderFileConfig,

    /// Downstream agent forwarding
    #[serde(default)]
    pub agent: AgentFileConfig,

    /// AI completion services
    #[serde(default)]
    pub ai: AiFileConfig,

    /// Upload storage
    #[serde(default)]
    pub uploads: UploadsFileConfig,

    /// Pending product sessions
    #[serde(default)]
    pub pending: PendingFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub port: Option<u16>,
    pub allowed_origins: Option<Vec<String>>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DatabaseFileConfig {
    pub path: Option<String>,
}

/// Messaging provider (uazapi-style) configuration
#[derive(Debug, Default, Deserialize)]
pub struct ProviderFileConfig {
    /// Base URL; leaving it unset keeps the gateway in mock mode
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub auth_header: Option<String>,
    /// Header value template, `%s` is replaced by the API key
    pub auth_value: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AgentFileConfig {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AiFileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub text_model: Option<String>,
    pub vision_model: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadsFileConfig {
    pub dir: Option<String>,
    pub public_prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PendingFileConfig {
    pub ttl_secs: Option<u64>,
}

/// Load the TOML config file from `SHOPCHAT_CONFIG` or the standard path
///
/// Returns `ShopchatConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ShopchatConfigFile {
    let path = std::env::var("SHOPCHAT_CONFIG")
        .ok()
        .map(PathBuf::from)
        .or_else(config_file_path);

    let Some(path) = path else {
        return ShopchatConfigFile::default();
    };

    if !path.exists() {
        return ShopchatConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ShopchatConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ShopchatConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the TOML is malformed
pub fn parse(content: &str) -> crate::Result<ShopchatConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/shopchat/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("shopchat").join("config.toml"))
}

//! Configuration management for ChatRelay
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{ChatRelayError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for ChatRelay
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream completion provider settings
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Conversation store limits
    #[serde(default)]
    pub store: StoreConfig,
    /// Terminal client settings
    #[serde(default)]
    pub client: ClientConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum accepted request body size in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// Upstream provider configuration
///
/// Both supported provider types speak the OpenAI chat-completions wire
/// format; they differ only in their default base URL and model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use ("groq" or "openai")
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    /// Bearer credential for the provider API
    #[serde(default)]
    pub api_key: Option<String>,

    /// Optional API base URL override (useful for tests and local mocks)
    #[serde(default)]
    pub api_base: Option<String>,

    /// Model requested from the provider
    #[serde(default)]
    pub model: Option<String>,

    /// Timeout for one-shot completion requests (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_provider_type() -> String {
    "groq".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            api_key: None,
            api_base: None,
            model: None,
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl ProviderConfig {
    /// Base URL for the configured provider, honoring `api_base`
    ///
    /// # Examples
    ///
    /// ```
    /// use chatrelay::config::ProviderConfig;
    ///
    /// let config = ProviderConfig::default();
    /// assert_eq!(config.resolved_api_base(), "https://api.groq.com/openai/v1");
    /// ```
    pub fn resolved_api_base(&self) -> String {
        if let Some(base) = &self.api_base {
            return base.trim_end_matches('/').to_string();
        }
        match self.provider_type.as_str() {
            "openai" => "https://api.openai.com/v1".to_string(),
            _ => "https://api.groq.com/openai/v1".to_string(),
        }
    }

    /// Model for the configured provider, honoring `model`
    pub fn resolved_model(&self) -> String {
        if let Some(model) = &self.model {
            return model.clone();
        }
        match self.provider_type.as_str() {
            "openai" => "gpt-4o-mini".to_string(),
            _ => "llama3-70b-8192".to_string(),
        }
    }

    /// One-shot request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Conversation store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum messages retained per conversation (oldest evicted first)
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Conversations idle longer than this are treated as absent (seconds)
    #[serde(default = "default_expiry_seconds")]
    pub expiry_seconds: u64,

    /// Interval between proactive sweeps of expired conversations (seconds)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_max_messages() -> usize {
    50
}

fn default_expiry_seconds() -> u64 {
    60 * 60 * 24
}

fn default_sweep_interval() -> u64 {
    60 * 30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            expiry_seconds: default_expiry_seconds(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

impl StoreConfig {
    /// Expiry window as a [`Duration`]
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_seconds)
    }

    /// Sweep interval as a [`Duration`]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

/// Terminal client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the chat API
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Timeout for non-streaming requests (seconds)
    #[serde(default = "default_client_timeout")]
    pub request_timeout_seconds: u64,

    /// Sampling temperature sent with each request
    #[serde(default = "default_client_temperature")]
    pub temperature: f64,

    /// Completion token limit sent with each request
    #[serde(default = "default_client_max_tokens")]
    pub max_tokens: u32,
}

fn default_server_url() -> String {
    "http://localhost:3000/api/v1".to_string()
}

fn default_client_timeout() -> u64 {
    30
}

fn default_client_temperature() -> f64 {
    0.7
}

fn default_client_max_tokens() -> u32 {
    2048
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            request_timeout_seconds: default_client_timeout(),
            temperature: default_client_temperature(),
            max_tokens: default_client_max_tokens(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ChatRelayError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ChatRelayError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        // Provider overrides
        if let Ok(key) = std::env::var("CHATRELAY_API_KEY") {
            self.provider.api_key = Some(key);
        } else if let Ok(key) = std::env::var("GROQ_API_KEY") {
            self.provider.api_key = Some(key);
        }

        if let Ok(provider_type) = std::env::var("CHATRELAY_PROVIDER") {
            self.provider.provider_type = provider_type;
        }

        if let Ok(model) = std::env::var("CHATRELAY_MODEL") {
            self.provider.model = Some(model);
        }

        if let Ok(api_base) = std::env::var("CHATRELAY_API_BASE") {
            self.provider.api_base = Some(api_base);
        }

        // Server overrides
        if let Ok(host) = std::env::var("CHATRELAY_HOST") {
            self.server.host = host;
        }

        let port = std::env::var("CHATRELAY_PORT").or_else(|_| std::env::var("PORT"));
        if let Ok(port) = port {
            match port.parse::<u16>() {
                Ok(v) => self.server.port = v,
                Err(_) => tracing::warn!("Invalid PORT: {}", port),
            }
        }

        // Store overrides
        if let Ok(max_messages) = std::env::var("CHATRELAY_MAX_MESSAGES") {
            match max_messages.parse() {
                Ok(v) => self.store.max_messages = v,
                Err(_) => tracing::warn!("Invalid CHATRELAY_MAX_MESSAGES: {}", max_messages),
            }
        }

        if let Ok(expiry) = std::env::var("CHATRELAY_EXPIRY_SECONDS") {
            match expiry.parse() {
                Ok(v) => self.store.expiry_seconds = v,
                Err(_) => tracing::warn!("Invalid CHATRELAY_EXPIRY_SECONDS: {}", expiry),
            }
        }

        if let Ok(interval) = std::env::var("CHATRELAY_SWEEP_INTERVAL_SECONDS") {
            match interval.parse() {
                Ok(v) => self.store.sweep_interval_seconds = v,
                Err(_) => {
                    tracing::warn!("Invalid CHATRELAY_SWEEP_INTERVAL_SECONDS: {}", interval)
                }
            }
        }

        // Client overrides
        if let Ok(server_url) = std::env::var("CHATRELAY_SERVER_URL") {
            self.client.server_url = server_url;
        }

        // Logging overrides
        if let Ok(json_logs) = std::env::var("CHATRELAY_JSON_LOGS") {
            match json_logs.parse::<bool>() {
                Ok(v) => self.logging.json = v,
                Err(_) => tracing::warn!("Invalid value for CHATRELAY_JSON_LOGS: {}", json_logs),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.json_logs {
            self.logging.json = true;
        }

        match &cli.command {
            crate::cli::Commands::Serve { host, port } => {
                if let Some(host) = host {
                    self.server.host = host.clone();
                }
                if let Some(port) = port {
                    self.server.port = *port;
                }
            }
            crate::cli::Commands::Chat { server, .. } | crate::cli::Commands::Health { server } => {
                if let Some(server) = server {
                    self.client.server_url = server.clone();
                }
            }
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges.
    /// Provider credentials are checked separately by
    /// [`Config::validate_provider`] since only the server needs them.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(
                ChatRelayError::Config("server.port must be greater than 0".to_string()).into(),
            );
        }

        if self.server.body_limit_bytes == 0 {
            return Err(ChatRelayError::Config(
                "server.body_limit_bytes must be greater than 0".to_string(),
            )
            .into());
        }

        if self.store.max_messages == 0 {
            return Err(ChatRelayError::Config(
                "store.max_messages must be greater than 0".to_string(),
            )
            .into());
        }

        if self.store.expiry_seconds == 0 {
            return Err(ChatRelayError::Config(
                "store.expiry_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.store.sweep_interval_seconds == 0 {
            return Err(ChatRelayError::Config(
                "store.sweep_interval_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if !(0.0..=2.0).contains(&self.client.temperature) {
            return Err(ChatRelayError::Config(
                "client.temperature must be between 0.0 and 2.0".to_string(),
            )
            .into());
        }

        if self.client.max_tokens == 0 || self.client.max_tokens > 4096 {
            return Err(ChatRelayError::Config(
                "client.max_tokens must be between 1 and 4096".to_string(),
            )
            .into());
        }

        if self.client.request_timeout_seconds == 0 {
            return Err(ChatRelayError::Config(
                "client.request_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if url::Url::parse(&self.client.server_url).is_err() {
            return Err(ChatRelayError::Config(format!(
                "client.server_url is not a valid URL: {}",
                self.client.server_url
            ))
            .into());
        }

        Ok(())
    }

    /// Validate the settings the relay server needs to reach its provider
    ///
    /// # Errors
    ///
    /// Returns error if the provider type is unknown, the API key is
    /// missing or too short, or the API base is not a valid URL.
    pub fn validate_provider(&self) -> Result<()> {
        let valid_providers = ["groq", "openai"];
        if !valid_providers.contains(&self.provider.provider_type.as_str()) {
            return Err(ChatRelayError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                valid_providers.join(", ")
            ))
            .into());
        }

        match self.provider.api_key.as_deref() {
            Some(key) if key.len() >= 10 => {}
            _ => {
                return Err(ChatRelayError::Config(
                    "provider API key is required (set GROQ_API_KEY or CHATRELAY_API_KEY)"
                        .to_string(),
                )
                .into())
            }
        }

        let base = self.provider.resolved_api_base();
        if url::Url::parse(&base).is_err() {
            return Err(ChatRelayError::Config(format!(
                "provider.api_base is not a valid URL: {}",
                base
            ))
            .into());
        }

        if self.provider.request_timeout_seconds == 0 {
            return Err(ChatRelayError::Config(
                "provider.request_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

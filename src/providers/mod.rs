//! Provider module for ChatRelay
//!
//! This module contains the completion provider abstraction, the
//! OpenAI-compatible relay used for Groq and OpenAI, the shared
//! `data:` stream framing, and an in-process fake for tests.

pub mod base;
pub mod fake;
pub mod openai;
pub mod sse;

pub use base::{
    Completion, CompletionParams, CompletionProvider, DeltaStream, Message, Role,
    DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
};
pub use openai::OpenAiCompatibleProvider;

use std::sync::Arc;

use crate::config::ProviderConfig;
use crate::error::{ChatRelayError, Result};

/// Create a provider instance based on configuration
///
/// Both `groq` and `openai` speak the same wire contract and differ only in
/// their default base URL and model.
///
/// # Errors
///
/// Returns error if the provider type is unknown or initialization fails
///
/// # Examples
///
/// ```
/// use chatrelay::config::ProviderConfig;
/// use chatrelay::providers::create_provider;
///
/// let config = ProviderConfig {
///     api_key: Some("gsk_0123456789".to_string()),
///     ..ProviderConfig::default()
/// };
/// let provider = create_provider(&config).unwrap();
/// assert_eq!(provider.name(), "groq");
/// ```
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider_type.as_str() {
        "groq" | "openai" => Ok(Arc::new(OpenAiCompatibleProvider::new(config)?)),
        other => Err(ChatRelayError::Config(format!("Unknown provider type: {}", other)).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider_type: &str) -> ProviderConfig {
        ProviderConfig {
            provider_type: provider_type.to_string(),
            api_key: Some("gsk_0123456789".to_string()),
            ..ProviderConfig::default()
        }
    }

    #[test]
    fn test_create_provider_groq() {
        let provider = create_provider(&config("groq")).unwrap();
        assert_eq!(provider.name(), "groq");
    }

    #[test]
    fn test_create_provider_openai() {
        let provider = create_provider(&config("openai")).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn test_create_provider_unknown_type() {
        let result = create_provider(&config("copilot"));
        assert!(result.is_err());
        assert!(result
            .err()
            .unwrap()
            .to_string()
            .contains("Unknown provider type"));
    }

    #[test]
    fn test_create_provider_missing_key() {
        let mut cfg = config("groq");
        cfg.api_key = None;
        assert!(create_provider(&cfg).is_err());
    }
}

//! Provider profiles: type, model, credentials, and completion options.

use crate::error::InterfaceError;
use serde::{Deserialize, Serialize};

/// Supported provider families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderType {
    OpenAi,
    Anthropic,
    Ollama,
    LocalCustom,
}

impl ProviderType {
    /// Parse a provider type from its configuration slug
    pub fn parse(type_str: &str) -> Result<Self, InterfaceError> {
        match type_str {
            "openai" => Ok(ProviderType::OpenAi),
            "anthropic" => Ok(ProviderType::Anthropic),
            "ollama" => Ok(ProviderType::Ollama),
            "local" => Ok(ProviderType::LocalCustom),
            _ => Err(InterfaceError::ConfigError(format!(
                "Invalid provider type: {}. Must be openai, anthropic, ollama, or local",
                type_str
            ))),
        }
    }

    pub fn default_endpoint(self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAi => Some("https://api.openai.com/v1"),
            ProviderType::Anthropic => Some("https://api.anthropic.com"),
            ProviderType::Ollama => Some("http://localhost:11434"),
            ProviderType::LocalCustom => None,
        }
    }

    pub fn api_key_env_var(self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAi => Some("OPENAI_API_KEY"),
            ProviderType::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderType::Ollama | ProviderType::LocalCustom => None,
        }
    }

    /// Whether an API key must be resolvable for requests to succeed
    pub fn requires_api_key(self) -> bool {
        matches!(self, ProviderType::OpenAi | ProviderType::Anthropic)
    }
}

/// Generation options forwarded with every request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Configuration for one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider_type: ProviderType,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub options: CompletionOptions,
}

impl ProviderConfig {
    pub fn new(provider_type: ProviderType, model: impl Into<String>) -> Self {
        Self {
            provider_type,
            model: model.into(),
            api_key: None,
            endpoint: None,
            options: CompletionOptions::default(),
        }
    }

    /// Resolve the API key: explicit config first, then the provider's
    /// conventional environment variable.
    pub fn resolve_api_key(&self) -> Result<Option<String>, InterfaceError> {
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                return Ok(Some(key.clone()));
            }
        }
        if let Some(var) = self.provider_type.api_key_env_var() {
            if let Ok(key) = std::env::var(var) {
                if !key.is_empty() {
                    return Ok(Some(key));
                }
            }
        }
        if self.provider_type.requires_api_key() {
            return Err(InterfaceError::ProviderNotConfigured(format!(
                "no API key for {:?} (set {} or configure api_key)",
                self.provider_type,
                self.provider_type.api_key_env_var().unwrap_or("api_key")
            )));
        }
        Ok(None)
    }

    /// Resolve the endpoint: explicit config first, then the provider default.
    pub fn resolved_endpoint(&self) -> Result<String, InterfaceError> {
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.is_empty() {
                return Ok(endpoint.trim_end_matches('/').to_string());
            }
        }
        self.provider_type
            .default_endpoint()
            .map(|e| e.to_string())
            .ok_or_else(|| {
                InterfaceError::ProviderNotConfigured(format!(
                    "no endpoint configured for {:?}",
                    self.provider_type
                ))
            })
    }
}

//! Thin HTTP clients for the supported provider families.

use crate::error::InterfaceError;
use crate::provider::profile::{ProviderConfig, ProviderType};
use crate::provider::ModelProviderClient;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

/// Build a client for the configured provider family.
pub fn create_provider_client(
    config: ProviderConfig,
) -> Result<Box<dyn ModelProviderClient>, InterfaceError> {
    match config.provider_type {
        ProviderType::OpenAi | ProviderType::LocalCustom => {
            Ok(Box::new(OpenAiClient::new(config)?))
        }
        ProviderType::Anthropic => Ok(Box::new(AnthropicClient::new(config)?)),
        ProviderType::Ollama => Ok(Box::new(OllamaClient::new(config)?)),
    }
}

async fn post_json(
    request: reqwest::RequestBuilder,
    provider: &str,
) -> Result<Value, InterfaceError> {
    let response = request
        .send()
        .await
        .map_err(|e| InterfaceError::ProviderRequestFailed(format!("{}: {}", provider, e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(InterfaceError::ProviderRequestFailed(format!(
            "{}: HTTP {}: {}",
            provider, status, body
        )));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| InterfaceError::ProviderRequestFailed(format!("{}: {}", provider, e)))
}

/// OpenAI-compatible chat-completions client (also serves local endpoints).
pub struct OpenAiClient {
    http: reqwest::Client,
    config: ProviderConfig,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: ProviderConfig) -> Result<Self, InterfaceError> {
        let endpoint = config.resolved_endpoint()?;
        let api_key = config.resolve_api_key()?;
        Ok(Self {
            http: reqwest::Client::new(),
            config,
            endpoint,
            api_key,
        })
    }
}

/// Extract the completion text from an OpenAI-style reply.
pub(crate) fn parse_openai_reply(reply: &Value) -> Result<String, InterfaceError> {
    reply["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| {
            InterfaceError::ProviderRequestFailed("openai: reply missing message content".into())
        })
}

#[async_trait]
impl ModelProviderClient for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<String, InterfaceError> {
        let mut body = json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
        });
        if let Some(temperature) = self.config.options.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = self.config.options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.endpoint))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!(model = %self.config.model, "openai completion request");
        let reply = post_json(request, "openai").await?;
        parse_openai_reply(&reply)
    }
}

/// Anthropic messages client.
pub struct AnthropicClient {
    http: reqwest::Client,
    config: ProviderConfig,
    endpoint: String,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(config: ProviderConfig) -> Result<Self, InterfaceError> {
        let endpoint = config.resolved_endpoint()?;
        let api_key = config.resolve_api_key()?.ok_or_else(|| {
            InterfaceError::ProviderNotConfigured("anthropic requires an API key".into())
        })?;
        Ok(Self {
            http: reqwest::Client::new(),
            config,
            endpoint,
            api_key,
        })
    }
}

/// Extract the completion text from an Anthropic messages reply.
pub(crate) fn parse_anthropic_reply(reply: &Value) -> Result<String, InterfaceError> {
    reply["content"][0]["text"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| {
            InterfaceError::ProviderRequestFailed("anthropic: reply missing content text".into())
        })
}

#[async_trait]
impl ModelProviderClient for AnthropicClient {
    async fn generate(&self, prompt: &str) -> Result<String, InterfaceError> {
        let body = json!({
            "model": self.config.model,
            "max_tokens": self.config.options.max_tokens.unwrap_or(4096),
            "messages": [{"role": "user", "content": prompt}],
        });

        let request = self
            .http
            .post(format!("{}/v1/messages", self.endpoint))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body);

        debug!(model = %self.config.model, "anthropic completion request");
        let reply = post_json(request, "anthropic").await?;
        parse_anthropic_reply(&reply)
    }
}

/// Ollama generate client for local models.
pub struct OllamaClient {
    http: reqwest::Client,
    config: ProviderConfig,
    endpoint: String,
}

impl OllamaClient {
    pub fn new(config: ProviderConfig) -> Result<Self, InterfaceError> {
        let endpoint = config.resolved_endpoint()?;
        Ok(Self {
            http: reqwest::Client::new(),
            config,
            endpoint,
        })
    }
}

/// Extract the completion text from an Ollama generate reply.
pub(crate) fn parse_ollama_reply(reply: &Value) -> Result<String, InterfaceError> {
    reply["response"].as_str().map(|s| s.to_string()).ok_or_else(|| {
        InterfaceError::ProviderRequestFailed("ollama: reply missing response field".into())
    })
}

#[async_trait]
impl ModelProviderClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, InterfaceError> {
        let body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
        });

        let request = self
            .http
            .post(format!("{}/api/generate", self.endpoint))
            .json(&body);

        debug!(model = %self.config.model, "ollama completion request");
        let reply = post_json(request, "ollama").await?;
        parse_ollama_reply(&reply)
    }
}

//! LLM provider integration.
//!
//! The shaping pipeline consumes providers through a single capability:
//! `generate(prompt) -> text`. Everything else here is thin client glue for
//! the hosted APIs; retry and backoff are the caller's concern.

pub mod clients;
pub mod profile;

pub use clients::{create_provider_client, AnthropicClient, OllamaClient, OpenAiClient};
pub use profile::{CompletionOptions, ProviderConfig, ProviderType};

use crate::error::InterfaceError;
use async_trait::async_trait;

/// Single-operation capability the shaping pipeline depends on.
#[async_trait]
pub trait ModelProviderClient: Send + Sync {
    /// Generate a completion for the prompt, returning the model's text.
    async fn generate(&self, prompt: &str) -> Result<String, InterfaceError>;
}

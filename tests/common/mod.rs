//! Shared test doubles for the integration suites.
#![allow(dead_code)]

use agentinterface::callback::{Callback, Interaction};
use agentinterface::error::InterfaceError;
use agentinterface::provider::ModelProviderClient;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

/// Model double that replays scripted replies and records prompts.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl ModelProviderClient for ScriptedLlm {
    async fn generate(&self, prompt: &str) -> Result<String, InterfaceError> {
        self.prompts.lock().push(prompt.to_string());
        self.replies.lock().pop_front().ok_or_else(|| {
            InterfaceError::ProviderRequestFailed("scripted replies exhausted".to_string())
        })
    }
}

/// Callback double that resolves immediately with a prepared interaction,
/// or times out when none remains.
pub struct ScriptedCallback {
    interactions: Mutex<VecDeque<Interaction>>,
    endpoint: String,
}

impl ScriptedCallback {
    pub fn new(interactions: Vec<Interaction>) -> Self {
        Self {
            interactions: Mutex::new(interactions.into()),
            endpoint: "http://localhost:0/callback/scripted".to_string(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl Callback for ScriptedCallback {
    async fn await_interaction(&self, timeout: Duration) -> Result<Interaction, InterfaceError> {
        match self.interactions.lock().pop_front() {
            Some(interaction) => Ok(interaction),
            None => Err(InterfaceError::InteractionTimeout(timeout)),
        }
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}

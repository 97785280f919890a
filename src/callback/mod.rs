//! Interaction callbacks: pairing an external event with a suspended waiter.
//!
//! A `Callback` is the rendezvous between a component emitted to a front
//! end and the agent coroutine waiting on the user's choice. Any transport
//! works; the HTTP implementation in [`http`] is the conventional one.

pub mod http;

pub use http::{CallbackServer, HttpCallback};

use crate::error::InterfaceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// A resolved user interaction: the action taken and its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub data: Value,
}

/// Rendezvous between one emitted component and one pending waiter.
#[async_trait]
pub trait Callback: Send + Sync {
    /// Wait for the user interaction, failing with
    /// [`InterfaceError::InteractionTimeout`] when the deadline passes.
    /// The pending entry is cleaned up on every exit path.
    async fn await_interaction(&self, timeout: Duration) -> Result<Interaction, InterfaceError>;

    /// Endpoint string an external actor uses to reach this interaction.
    fn endpoint(&self) -> String;
}

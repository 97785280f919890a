//! AgentInterface: typed UI component trees from free-form agent output.
//!
//! Wraps an agent whose invocation yields a plain value, a future, or an
//! async stream, and converts its free text into a validated component tree
//! via a language model, optionally pausing for a human-in-the-loop
//! interaction through an HTTP callback before resuming the agent.

pub mod callback;
pub mod component;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod provider;
pub mod shaper;

pub use callback::{Callback, HttpCallback, Interaction};
pub use component::{protocol, ComponentRegistry};
pub use dispatch::{
    enhance, extract_text, Agent, AgentOutput, CallbackFactory, ContinuationPolicy,
    EnhanceOptions, EnhancedAgent, EnhancedResponse,
};
pub use error::{InterfaceError, SchemaViolation};
pub use shaper::{shape, ShapingContext};

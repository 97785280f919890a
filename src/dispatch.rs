//! Mode Dispatcher
//!
//! Wraps an agent so each invocation carries a component tree. The agent's
//! output is probed once into a tagged variant — plain value, awaitable, or
//! async stream — and dispatched to one of two uniform outer contracts: a
//! resolved `(value, components)` pair, or a live event stream that passes
//! every upstream event through and appends exactly one `component` event.
//!
//! Shaping failures never reach the caller: the dispatcher logs a warning
//! and substitutes a one-node markdown tree carrying the original text.

use crate::callback::{Callback, HttpCallback};
use crate::config::{InterfaceConfig, DEFAULT_CALLBACK_PORT, DEFAULT_INTERACTION_TIMEOUT_SECS};
use crate::error::InterfaceError;
use crate::provider::ModelProviderClient;
use crate::shaper::{self, ShapingContext};
use async_stream::stream;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// An agent invocation's output, probed once into a tagged variant.
pub enum AgentOutput {
    /// A value produced synchronously
    Immediate(Value),
    /// A value still being produced
    Deferred(BoxFuture<'static, Value>),
    /// An asynchronous event sequence
    Streaming(BoxStream<'static, Value>),
}

impl std::fmt::Debug for AgentOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentOutput::Immediate(value) => f.debug_tuple("Immediate").field(value).finish(),
            AgentOutput::Deferred(_) => f.write_str("Deferred(..)"),
            AgentOutput::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}

impl AgentOutput {
    pub fn immediate(value: impl Into<Value>) -> Self {
        AgentOutput::Immediate(value.into())
    }

    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Value> + Send + 'static,
    {
        AgentOutput::Deferred(future.boxed())
    }

    pub fn streaming<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = Value> + Send + 'static,
    {
        AgentOutput::Streaming(Box::pin(stream))
    }
}

/// Anything invocable with positional arguments.
///
/// An adapter that cannot produce output for the given arguments fails with
/// [`InterfaceError::InvalidAgent`]; that is the one error the enhanced
/// call surfaces synchronously.
pub trait Agent: Send + Sync {
    fn invoke(&self, args: Vec<Value>) -> Result<AgentOutput, InterfaceError>;
}

impl<F> Agent for F
where
    F: Fn(Vec<Value>) -> Result<AgentOutput, InterfaceError> + Send + Sync,
{
    fn invoke(&self, args: Vec<Value>) -> Result<AgentOutput, InterfaceError> {
        (self)(args)
    }
}

/// Source of fresh callbacks for continuation rounds.
pub trait CallbackFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Callback>;
}

/// Where continuation rounds get their fresh callback from.
#[derive(Clone)]
pub enum ContinuationPolicy {
    /// Register a new HTTP interaction on this port each round
    Http { port: u16 },
    /// Custom callback source
    Factory(Arc<dyn CallbackFactory>),
    /// Continuation rounds run without a rendezvous
    Disabled,
}

impl Default for ContinuationPolicy {
    fn default() -> Self {
        ContinuationPolicy::Http {
            port: DEFAULT_CALLBACK_PORT,
        }
    }
}

impl ContinuationPolicy {
    fn next_callback(&self) -> Option<Arc<dyn Callback>> {
        match self {
            ContinuationPolicy::Http { port } => Some(Arc::new(HttpCallback::with_port(*port))),
            ContinuationPolicy::Factory(factory) => Some(factory.create()),
            ContinuationPolicy::Disabled => None,
        }
    }
}

/// Options for [`enhance`].
#[derive(Clone)]
pub struct EnhanceOptions {
    /// Whitelist of component types permitted for shaping
    pub components: Option<Vec<String>>,
    /// Rendezvous for the first interaction round
    pub callback: Option<Arc<dyn Callback>>,
    /// How long to wait for each user interaction
    pub interaction_timeout: Duration,
    /// Maximum number of human-interaction rounds; `None` is unbounded
    pub max_interaction_rounds: Option<usize>,
    /// Callback source for rounds after the first
    pub continuation: ContinuationPolicy,
}

impl Default for EnhanceOptions {
    fn default() -> Self {
        Self {
            components: None,
            callback: None,
            interaction_timeout: Duration::from_secs(DEFAULT_INTERACTION_TIMEOUT_SECS),
            max_interaction_rounds: None,
            continuation: ContinuationPolicy::default(),
        }
    }
}

impl EnhanceOptions {
    /// Derive options from loaded configuration.
    pub fn from_config(config: &InterfaceConfig) -> Self {
        Self {
            interaction_timeout: Duration::from_secs(config.interaction.timeout_secs),
            max_interaction_rounds: config.interaction.max_rounds,
            continuation: ContinuationPolicy::Http {
                port: config.callback.port,
            },
            ..Self::default()
        }
    }
}

/// What an enhanced call produces.
pub enum EnhancedResponse {
    /// The agent's (awaited) value paired with its component tree.
    /// Shaping failures are absorbed before this future resolves.
    Resolved(BoxFuture<'static, (Value, Value)>),
    /// Passthrough of the agent's own events plus one `component` event
    Streaming(BoxStream<'static, Value>),
}

impl std::fmt::Debug for EnhancedResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnhancedResponse::Resolved(_) => f.write_str("Resolved(..)"),
            EnhancedResponse::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}

/// Wrap an agent so its output carries a component tree.
pub fn enhance(
    agent: Arc<dyn Agent>,
    llm: Arc<dyn ModelProviderClient>,
    options: EnhanceOptions,
) -> EnhancedAgent {
    EnhancedAgent {
        agent,
        llm,
        components: options.components,
        callback: options.callback,
        interaction_timeout: options.interaction_timeout,
        max_interaction_rounds: options.max_interaction_rounds,
        continuation: options.continuation,
    }
}

/// An agent wrapped with component generation.
#[derive(Clone)]
pub struct EnhancedAgent {
    agent: Arc<dyn Agent>,
    llm: Arc<dyn ModelProviderClient>,
    components: Option<Vec<String>>,
    callback: Option<Arc<dyn Callback>>,
    interaction_timeout: Duration,
    max_interaction_rounds: Option<usize>,
    continuation: ContinuationPolicy,
}

impl EnhancedAgent {
    /// Invoke the agent once and wrap its output.
    ///
    /// Only [`InterfaceError::InvalidAgent`] (or whatever the agent itself
    /// fails with) surfaces here; everything downstream resolves inside the
    /// returned future or stream.
    pub fn call(&self, args: Vec<Value>) -> Result<EnhancedResponse, InterfaceError> {
        let output = self.agent.invoke(args.clone())?;
        Ok(match output {
            AgentOutput::Streaming(upstream) => {
                EnhancedResponse::Streaming(self.stream_events(upstream, args))
            }
            AgentOutput::Deferred(future) => {
                let this = self.clone();
                EnhancedResponse::Resolved(
                    async move {
                        let response = future.await;
                        let tree = this
                            .generate_components(&value_text(&response), &query_context(&args))
                            .await;
                        (response, tree)
                    }
                    .boxed(),
                )
            }
            AgentOutput::Immediate(response) => {
                let this = self.clone();
                EnhancedResponse::Resolved(
                    async move {
                        let tree = this
                            .generate_components(&value_text(&response), &query_context(&args))
                            .await;
                        (response, tree)
                    }
                    .boxed(),
                )
            }
        })
    }

    /// Shape text into a component tree, falling back to a single markdown
    /// node on any failure.
    async fn generate_components(&self, text: &str, query: &str) -> Value {
        let context = ShapingContext {
            query: query.to_string(),
            components: self.components.clone(),
        };
        let shaped = shaper::shape(text, &context, Some(self.llm.as_ref()))
            .await
            .and_then(|serialized| {
                serde_json::from_str::<Value>(&serialized)
                    .map_err(|e| InterfaceError::ShapingFailed(e.to_string()))
            });
        match shaped {
            Ok(tree) => tree,
            Err(error) => {
                warn!(%error, "component generation failed, falling back to prose");
                json!([{"type": "markdown", "data": {"content": text}}])
            }
        }
    }

    /// Streaming path: passthrough, collect, tack on one component event,
    /// then optionally rendezvous and resume the agent.
    fn stream_events(
        &self,
        upstream: BoxStream<'static, Value>,
        args: Vec<Value>,
    ) -> BoxStream<'static, Value> {
        let this = self.clone();
        Box::pin(stream! {
            let mut upstream = upstream;
            let mut query = query_context(&args);
            let trailing: Vec<Value> = args.iter().skip(1).cloned().collect();
            let mut callback = this.callback.clone();
            let mut rounds = 0usize;

            loop {
                let mut collected = String::new();
                while let Some(event) = upstream.next().await {
                    let text = extract_text(&event);
                    yield event;
                    if !text.is_empty() {
                        collected.push_str(&text);
                        collected.push(' ');
                    }
                }

                let text = collected.trim().to_string();
                if text.is_empty() {
                    break;
                }

                let components = this.generate_components(&text, &query).await;

                let limit_reached = this
                    .max_interaction_rounds
                    .map(|limit| rounds >= limit)
                    .unwrap_or(false);
                let active = if limit_reached { None } else { callback.clone() };

                let active = match active {
                    Some(active) => active,
                    None => {
                        yield json!({"type": "component", "data": {"components": components}});
                        break;
                    }
                };

                yield json!({
                    "type": "component",
                    "data": {
                        "components": components,
                        "callback_url": active.endpoint(),
                    }
                });

                let interaction = match active.await_interaction(this.interaction_timeout).await {
                    Ok(interaction) => interaction,
                    Err(InterfaceError::InteractionTimeout(_)) => {
                        warn!("user interaction timed out");
                        break;
                    }
                    Err(error) => {
                        warn!(%error, "interaction await failed");
                        break;
                    }
                };

                rounds += 1;
                debug!(round = rounds, action = %interaction.action, "continuing after interaction");

                query = format!("{}\n\nUser selected: {}", query, value_text(&interaction.data));
                let mut continuation_args = vec![Value::String(query.clone())];
                continuation_args.extend(trailing.iter().cloned());

                match this.agent.invoke(continuation_args) {
                    Ok(AgentOutput::Streaming(next)) => upstream = next,
                    // Non-streaming output re-enters the loop as a one-event stream
                    Ok(AgentOutput::Deferred(future)) => {
                        upstream = Box::pin(futures::stream::once(future));
                    }
                    Ok(AgentOutput::Immediate(value)) => {
                        upstream = Box::pin(futures::stream::once(async move { value }));
                    }
                    Err(error) => {
                        warn!(%error, "continuation invocation failed");
                        break;
                    }
                }

                // Don't register a callback the round bound forbids using
                let next_round_allowed = this
                    .max_interaction_rounds
                    .map(|limit| rounds < limit)
                    .unwrap_or(true);
                callback = if next_round_allowed {
                    this.continuation.next_callback()
                } else {
                    None
                };
            }
        })
    }
}

/// The stringified first positional argument, used as shaping context.
fn query_context(args: &[Value]) -> String {
    args.first()
        .map(value_text)
        .unwrap_or_else(|| "User request".to_string())
}

/// Render a value as prose: strings verbatim, everything else as JSON.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Extract displayable text from an arbitrary event. Never fails; events
/// with nothing extractable yield the empty string.
pub fn extract_text(event: &Value) -> String {
    if let Value::String(text) = event {
        return text.clone();
    }
    if let Value::Object(map) = event {
        for key in ["content", "text", "message", "output", "data"] {
            if let Some(value) = map.get(key) {
                if value_truthy(value) {
                    return value_text(value);
                }
            }
        }
    }
    let rendered = value_text(event);
    if rendered.is_empty() || rendered == "null" || rendered == "{}" {
        String::new()
    } else {
        rendered
    }
}

fn value_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

//! HTTP callback rendezvous.
//!
//! One listener exists per port for the whole process; callbacks register a
//! pending interaction in the listener's table and suspend on a oneshot
//! channel. The listener's handler resolves the entry from its own task,
//! which makes the channel the cross-context handoff. Removal from the
//! table is idempotent and guaranteed by a drop guard, so success, timeout,
//! and cancellation all clean up exactly once. A background sweep evicts
//! interactions that were registered but never awaited or resolved.
//!
//! Construction requires a running Tokio runtime: the listener and sweep
//! are spawned tasks.

use crate::callback::{Callback, Interaction};
use crate::config::{CallbackConfig, DEFAULT_CALLBACK_PORT};
use crate::error::InterfaceError;
use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, warn};
use uuid::Uuid;

struct PendingSlot {
    sender: oneshot::Sender<Interaction>,
    created_at: Instant,
}

type PendingTable = Arc<Mutex<HashMap<String, PendingSlot>>>;

/// Removes the pending entry when dropped, whatever the exit path.
struct PendingGuard {
    pending: PendingTable,
    id: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

/// Shared HTTP listener for one port.
pub struct CallbackServer {
    port: u16,
    pending: PendingTable,
}

static SERVERS: Mutex<Option<HashMap<u16, Arc<CallbackServer>>>> = Mutex::new(None);

impl CallbackServer {
    /// Get or start the shared listener for a port. Repeated calls with the
    /// same port return the same instance.
    pub fn shared(port: u16) -> Arc<CallbackServer> {
        Self::shared_with_config(&CallbackConfig {
            port,
            ..CallbackConfig::default()
        })
    }

    /// Get or start the shared listener described by `config`.
    pub fn shared_with_config(config: &CallbackConfig) -> Arc<CallbackServer> {
        let mut servers = SERVERS.lock();
        let map = servers.get_or_insert_with(HashMap::new);
        if let Some(existing) = map.get(&config.port) {
            return Arc::clone(existing);
        }
        let server = Arc::new(CallbackServer::start(config));
        map.insert(config.port, Arc::clone(&server));
        server
    }

    fn start(config: &CallbackConfig) -> CallbackServer {
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(serve(config.port, Arc::clone(&pending)));
        tokio::spawn(sweep_loop(
            Arc::clone(&pending),
            Duration::from_secs(config.stale_after_secs),
            Duration::from_secs(config.sweep_interval_secs),
        ));

        CallbackServer {
            port: config.port,
            pending,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether an interaction id is still waiting for resolution.
    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.lock().contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    fn register(&self, id: &str, sender: oneshot::Sender<Interaction>) -> PendingGuard {
        self.pending.lock().insert(
            id.to_string(),
            PendingSlot {
                sender,
                created_at: Instant::now(),
            },
        );
        debug!(callback_id = %id, "registered pending interaction");
        PendingGuard {
            pending: Arc::clone(&self.pending),
            id: id.to_string(),
        }
    }
}

async fn serve(port: u16, pending: PendingTable) {
    let app = Router::new()
        .route("/callback/:callback_id", post(handle_callback))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(pending);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(port, error = %e, "failed to bind callback listener");
            return;
        }
    };
    debug!(port, "callback listener started");

    if let Err(e) = axum::serve(listener, app).await {
        error!(port, error = %e, "callback listener terminated");
    }
}

async fn handle_callback(
    Path(callback_id): Path<String>,
    State(pending): State<PendingTable>,
    Json(interaction): Json<Interaction>,
) -> Json<Value> {
    let slot = pending.lock().remove(&callback_id);
    match slot {
        Some(slot) => {
            if slot.sender.send(interaction).is_err() {
                // Waiter already timed out or was cancelled; the event is discarded
                debug!(callback_id = %callback_id, "waiter gone before resolution");
            }
        }
        None => {
            debug!(callback_id = %callback_id, "no pending interaction for id");
        }
    }
    Json(json!({"status": "continued"}))
}

async fn sweep_loop(pending: PendingTable, stale_after: Duration, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let evicted = {
            let mut table = pending.lock();
            let before = table.len();
            table.retain(|_, slot| slot.created_at.elapsed() < stale_after);
            before - table.len()
        };
        if evicted > 0 {
            warn!(evicted, "evicted stale pending interactions");
        }
    }
}

/// One pending HTTP interaction, registered at construction.
pub struct HttpCallback {
    id: String,
    server: Arc<CallbackServer>,
    slot: Mutex<Option<(oneshot::Receiver<Interaction>, PendingGuard)>>,
}

impl HttpCallback {
    /// Register a new interaction on the default port.
    pub fn new() -> Self {
        Self::with_port(DEFAULT_CALLBACK_PORT)
    }

    /// Register a new interaction on a specific port.
    pub fn with_port(port: u16) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), port)
    }

    /// Register an interaction under a caller-chosen id.
    pub fn with_id(id: impl Into<String>, port: u16) -> Self {
        let id = id.into();
        let server = CallbackServer::shared(port);
        let (sender, receiver) = oneshot::channel();
        let guard = server.register(&id, sender);
        Self {
            id,
            server,
            slot: Mutex::new(Some((receiver, guard))),
        }
    }

    /// Register an interaction using the callback section of the config.
    pub fn from_config(config: &CallbackConfig) -> Self {
        let id = Uuid::new_v4().to_string();
        let server = CallbackServer::shared_with_config(config);
        let (sender, receiver) = oneshot::channel();
        let guard = server.register(&id, sender);
        Self {
            id,
            server,
            slot: Mutex::new(Some((receiver, guard))),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn server(&self) -> &Arc<CallbackServer> {
        &self.server
    }
}

impl Default for HttpCallback {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Callback for HttpCallback {
    async fn await_interaction(&self, timeout: Duration) -> Result<Interaction, InterfaceError> {
        let taken = self.slot.lock().take();
        let Some((receiver, guard)) = taken else {
            return Err(InterfaceError::InteractionUnavailable(format!(
                "interaction {} already awaited",
                self.id
            )));
        };

        // The guard lives inside this future: timeout, resolution, and
        // cancellation of the waiter all remove the table entry.
        let outcome = tokio::time::timeout(timeout, receiver).await;
        drop(guard);

        match outcome {
            Ok(Ok(interaction)) => {
                debug!(callback_id = %self.id, action = %interaction.action, "interaction resolved");
                Ok(interaction)
            }
            Ok(Err(_)) => Err(InterfaceError::InteractionUnavailable(format!(
                "pending entry for {} evicted before resolution",
                self.id
            ))),
            Err(_) => Err(InterfaceError::InteractionTimeout(timeout)),
        }
    }

    fn endpoint(&self) -> String {
        let host =
            std::env::var("AI_CALLBACK_HOST").unwrap_or_else(|_| "localhost".to_string());
        format!("http://{}:{}/callback/{}", host, self.server.port(), self.id)
    }
}

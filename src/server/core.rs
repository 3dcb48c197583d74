//! Bridge server lifecycle controller.
//!
//! The [`BridgeServer`] owns the HTTP listener (which also accepts WebSocket
//! upgrades), the connection registry, and the message relay. It is a cheap
//! cloneable handle; every clone controls the same server.
//!
//! # Example
//!
//! ```no_run
//! use webview_bridge::BridgeServer;
//! use serde_json::json;
//!
//! # async fn example() -> webview_bridge::Result<()> {
//! let server = BridgeServer::builder().root("./webview").build()?;
//!
//! server.set_message_handler(|payload| async move {
//!     println!("from UI: {payload}");
//!     Ok(())
//! });
//!
//! server.start().await?;
//! server.broadcast_to_clients(&json!({"type": "state", "ready": true}))?;
//! server.stop().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::http::{AccessGuard, AssetResolver, AssetRoots};
use crate::transport::{Broadcaster, ConnectionRegistry, HandlerResult, MessageRelay};

use super::builder::BridgeServerBuilder;
use super::config::ServerConfig;
use super::router::{self, RequestContext};

// ============================================================================
// Constants
// ============================================================================

/// Longest `stop()` waits for connection tasks and the listener to finish.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the server.
pub(crate) struct BridgeInner {
    /// Settings for the next start.
    config: RwLock<ServerConfig>,

    /// Asset roots, fixed at construction.
    resolver: AssetResolver,

    /// Open WebSocket clients.
    registry: Arc<ConnectionRegistry>,

    /// Host callbacks.
    relay: Arc<MessageRelay>,

    /// Listener task, present while running. Serializes start and stop.
    running: Mutex<Option<Running>>,

    /// Bound address while running, readable without awaiting.
    listening: RwLock<Option<SocketAddr>>,
}

/// Handles to a running listener.
struct Running {
    shutdown: oneshot::Sender<()>,
    serve_task: JoinHandle<std::io::Result<()>>,
}

// ============================================================================
// BridgeServer
// ============================================================================

/// Static asset server and WebSocket relay on a single port.
#[derive(Clone)]
pub struct BridgeServer {
    /// Shared inner state.
    pub(crate) inner: Arc<BridgeInner>,
}

// ============================================================================
// BridgeServer - Display
// ============================================================================

impl fmt::Debug for BridgeServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeServer")
            .field("config", &*self.inner.config.read())
            .field("local_addr", &self.local_addr())
            .field("connection_count", &self.connection_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// BridgeServer - Construction
// ============================================================================

impl BridgeServer {
    /// Creates a configuration builder for the server.
    #[inline]
    #[must_use]
    pub fn builder() -> BridgeServerBuilder {
        BridgeServerBuilder::new()
    }

    /// Creates a stopped server.
    #[must_use]
    pub fn new(config: ServerConfig, roots: AssetRoots) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                config: RwLock::new(config),
                resolver: AssetResolver::new(roots),
                registry: Arc::new(ConnectionRegistry::new()),
                relay: Arc::new(MessageRelay::new()),
                running: Mutex::new(None),
                listening: RwLock::new(None),
            }),
        }
    }

    /// Replaces port and password for the next [`start`](Self::start).
    ///
    /// A zero port selects [`DEFAULT_PORT`](super::DEFAULT_PORT); `None` or
    /// an empty password disables auth. A running listener is left alone.
    pub fn configure(&self, port: u16, password: Option<String>) {
        let mut config = self.inner.config.write();
        let keepalive = config.keepalive();
        *config = ServerConfig::new(port, password).with_keepalive(keepalive);
        debug!(port = config.port(), auth = config.password().is_some(), "Server reconfigured");
    }
}

// ============================================================================
// BridgeServer - Lifecycle
// ============================================================================

impl BridgeServer {
    /// Binds the listener and starts accepting.
    ///
    /// Returns once the socket is bound. Calling it while running logs and
    /// returns `Ok(())`; the existing listener stays up.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`] if the port can't be bound. The server stays
    /// stopped.
    pub async fn start(&self) -> Result<()> {
        let mut running = self.inner.running.lock().await;
        if running.is_some() {
            info!(local_addr = ?self.local_addr(), "Bridge server already running");
            return Ok(());
        }

        let config = self.inner.config.read().clone();
        let addr = config.bind_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::bind(addr, e))?;
        let local_addr = listener.local_addr()?;

        let guard = AccessGuard::new(config.password().map(str::to_string));
        let auth = guard.is_enabled();
        let ctx = Arc::new(RequestContext {
            guard,
            resolver: self.inner.resolver.clone(),
            registry: Arc::clone(&self.inner.registry),
            relay: Arc::clone(&self.inner.relay),
            keepalive: config.keepalive(),
        });

        self.inner.registry.reopen();

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let app = router::router(ctx).into_make_service_with_connect_info::<SocketAddr>();
        let serve_task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    // A dropped sender also means shut down.
                    let _ = shutdown_rx.await;
                })
                .await;
            debug!("Listener exited");
            result
        });

        *self.inner.listening.write() = Some(local_addr);
        *running = Some(Running {
            shutdown,
            serve_task,
        });

        info!(%local_addr, auth, "Bridge server started");
        Ok(())
    }

    /// Stops the server.
    ///
    /// Terminates every client connection without a close handshake, stops
    /// registering new upgrades, waits for the connection tasks to finish,
    /// then closes the listener and waits for in-flight HTTP requests. A
    /// no-op when not running.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if teardown takes longer than [`SHUTDOWN_TIMEOUT`]
    /// - [`Error::Shutdown`] if the listener task failed
    pub async fn stop(&self) -> Result<()> {
        let mut slot = self.inner.running.lock().await;
        let Some(running) = slot.take() else {
            debug!("Bridge server not running, nothing to stop");
            return Ok(());
        };
        *self.inner.listening.write() = None;

        let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
        let timeout_ms = SHUTDOWN_TIMEOUT.as_millis() as u64;

        let terminated = self.inner.registry.terminate_all();
        self.inner.registry.close();
        let connections_done = timeout_at(deadline, self.inner.registry.wait_for_tasks())
            .await
            .is_ok();
        if !connections_done {
            warn!("Connection tasks still running at shutdown deadline");
        }

        // The receiver is gone if the listener already exited.
        let _ = running.shutdown.send(());

        let mut serve_task = running.serve_task;
        let listener_result = match timeout_at(deadline, &mut serve_task).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => {
                error!(error = %e, "Listener failed during shutdown");
                Err(Error::shutdown(format!("listener failed: {e}")))
            }
            Ok(Err(e)) => {
                error!(error = %e, "Listener task failed during shutdown");
                Err(Error::shutdown(format!("listener task failed: {e}")))
            }
            Err(_) => {
                serve_task.abort();
                Err(Error::timeout("listener shutdown", timeout_ms))
            }
        };

        listener_result?;
        if !connections_done {
            return Err(Error::timeout("connection teardown", timeout_ms));
        }

        info!(terminated, "Bridge server stopped");
        Ok(())
    }

    /// Returns `true` while the listener is accepting.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.listening.read().is_some()
    }

    /// Returns the configured port.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.config.read().port()
    }

    /// Returns the bound address while running.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.inner.listening.read()
    }
}

// ============================================================================
// BridgeServer - Messaging
// ============================================================================

impl BridgeServer {
    /// Sends a host message to every connected browser.
    ///
    /// See [`Broadcaster::broadcast_to_clients`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if `message` fails to serialize.
    pub fn broadcast_to_clients<T: Serialize + ?Sized>(&self, message: &T) -> Result<usize> {
        self.broadcaster().broadcast_to_clients(message)
    }

    /// Returns a broadcast-only handle for host components.
    #[inline]
    #[must_use]
    pub fn broadcaster(&self) -> Broadcaster {
        Broadcaster::new(Arc::clone(&self.inner.registry))
    }

    /// Returns the number of connected browsers.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Registers the handler for `webview-message` payloads.
    pub fn set_message_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.inner.relay.set_message_handler(handler);
    }

    /// Registers the handler for `toolbar-action` names.
    pub fn set_toolbar_action_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.inner.relay.set_toolbar_action_handler(handler);
    }

    /// Removes the `webview-message` handler.
    #[inline]
    pub fn clear_message_handler(&self) {
        self.inner.relay.clear_message_handler();
    }

    /// Removes the `toolbar-action` handler.
    #[inline]
    pub fn clear_toolbar_action_handler(&self) {
        self.inner.relay.clear_toolbar_action_handler();
    }
}

// ============================================================================
// Tests
// ============================================================================

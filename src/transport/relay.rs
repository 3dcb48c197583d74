//! Message relay between browser clients and the host.
//!
//! Inbound frames are decoded and handed to one of two host callbacks.
//! Outbound host messages are wrapped once, serialized once, and the same
//! frame bytes are queued on every open connection.
//!
//! # Failure isolation
//!
//! A frame that doesn't decode is logged and dropped. A handler that returns
//! an error, or panics, is logged at the dispatch site. Neither closes the
//! connection or stops later frames.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::error::{HandlerError, Result};
use crate::identifiers::ConnectionId;
use crate::protocol::{Decoded, InboundEnvelope, OutboundEnvelope};

use super::registry::ConnectionRegistry;

// ============================================================================
// Types
// ============================================================================

/// Outcome of a host callback.
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Callback for `webview-message` payloads.
pub type MessageHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Callback for `toolbar-action` names.
pub type ToolbarActionHandler =
    Arc<dyn Fn(String) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

// ============================================================================
// MessageRelay
// ============================================================================

/// Routes decoded inbound envelopes to the registered host callbacks.
///
/// Each callback slot holds at most one handler; setting a handler replaces
/// the previous one. With a slot empty, that message class is dropped.
#[derive(Default)]
pub struct MessageRelay {
    message_handler: RwLock<Option<MessageHandler>>,
    toolbar_handler: RwLock<Option<ToolbarActionHandler>>,
}

impl std::fmt::Debug for MessageRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRelay")
            .field("message_handler", &self.message_handler.read().is_some())
            .field("toolbar_handler", &self.toolbar_handler.read().is_some())
            .finish()
    }
}

// ============================================================================
// MessageRelay - Handler Registration
// ============================================================================

impl MessageRelay {
    /// Creates a relay with no handlers registered.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the `webview-message` handler, replacing any previous one.
    pub fn set_message_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler: MessageHandler = Arc::new(move |payload| handler(payload).boxed());
        *self.message_handler.write() = Some(handler);
    }

    /// Registers the `toolbar-action` handler, replacing any previous one.
    pub fn set_toolbar_action_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler: ToolbarActionHandler = Arc::new(move |action| handler(action).boxed());
        *self.toolbar_handler.write() = Some(handler);
    }

    /// Removes the `webview-message` handler.
    pub fn clear_message_handler(&self) {
        *self.message_handler.write() = None;
    }

    /// Removes the `toolbar-action` handler.
    pub fn clear_toolbar_action_handler(&self) {
        *self.toolbar_handler.write() = None;
    }
}

// ============================================================================
// MessageRelay - Inbound Dispatch
// ============================================================================

impl MessageRelay {
    /// Decodes one text frame and runs the matching handler to completion.
    ///
    /// Called from the connection's event loop, so frames from one client
    /// reach the host in arrival order.
    pub async fn dispatch(&self, connection_id: ConnectionId, text: &str) {
        let envelope = match InboundEnvelope::decode(text) {
            Decoded::Envelope(envelope) => envelope,
            Decoded::Unrecognized => {
                debug!(%connection_id, "Ignoring unrecognized frame");
                return;
            }
            Decoded::Malformed(reason) => {
                warn!(%connection_id, %reason, "Dropping malformed frame");
                return;
            }
        };

        match envelope {
            InboundEnvelope::WebviewMessage { payload } => {
                // Clone out of the lock so a handler can re-register itself.
                let handler = self.message_handler.read().clone();
                match handler {
                    Some(handler) => {
                        invoke(connection_id, "webview-message", async move {
                            handler(payload).await
                        })
                        .await;
                    }
                    None => debug!(%connection_id, "No message handler, dropping webview message"),
                }
            }

            InboundEnvelope::ToolbarAction { action } => {
                let handler = self.toolbar_handler.read().clone();
                match handler {
                    Some(handler) => {
                        invoke(connection_id, "toolbar-action", async move {
                            handler(action).await
                        })
                        .await;
                    }
                    None => debug!(%connection_id, %action, "No toolbar handler, dropping action"),
                }
            }
        }
    }
}

/// Runs a handler future on its own task so a panic is contained, and logs
/// whatever went wrong.
async fn invoke<Fut>(connection_id: ConnectionId, kind: &'static str, handler: Fut)
where
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    match tokio::spawn(handler).await {
        Ok(Ok(())) => trace!(%connection_id, kind, "Handler completed"),
        Ok(Err(e)) => warn!(%connection_id, kind, error = %e, "Handler failed"),
        Err(e) if e.is_panic() => warn!(%connection_id, kind, "Handler panicked"),
        Err(e) => warn!(%connection_id, kind, error = %e, "Handler task cancelled"),
    }
}

// ============================================================================
// Broadcaster
// ============================================================================

/// Sends host messages to every connected browser.
///
/// A cheap, cloneable handle onto the one shared connection registry. Hand
/// it to any host component that needs to push messages; all of them share
/// the same sockets.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    /// Creates a broadcaster over a registry.
    #[inline]
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Wraps `message` as an `extension-message` and queues it on every open
    /// connection.
    ///
    /// Returns the number of connections the frame was queued on. Connections
    /// that are no longer open are skipped, not removed; their event loops
    /// remove them. An empty registry is the normal idle state and returns
    /// `Ok(0)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if `message` fails to serialize.
    pub fn broadcast_to_clients<T: Serialize + ?Sized>(&self, message: &T) -> Result<usize> {
        let connections = self.registry.snapshot();
        if connections.is_empty() {
            trace!("Broadcast skipped, no clients");
            return Ok(0);
        }

        let frame = Utf8Bytes::from(OutboundEnvelope::new(message).encode()?);

        let mut delivered = 0;
        for connection in &connections {
            if connection.send(Message::Text(frame.clone())) {
                delivered += 1;
            } else {
                trace!(connection_id = %connection.id(), "Skipping closed connection");
            }
        }

        debug!(delivered, registered = connections.len(), "Broadcast sent");
        Ok(delivered)
    }

    /// Returns the number of registered connections.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

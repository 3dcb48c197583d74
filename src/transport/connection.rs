//! WebSocket client connection and its event loop.
//!
//! Each upgraded socket gets one tracked tokio task that runs two halves:
//!
//! - the socket half reads frames, writes frames queued by broadcasts,
//!   optionally pings the client, and removes the connection from the
//!   registry when the socket closes or errors
//! - the dispatch half hands text frames to the relay one at a time, in
//!   arrival order
//!
//! A slow handler only delays later frames from the same client. Reads,
//! broadcasts and pings keep flowing.
//!
//! The [`ClientConnection`] handle held by the registry only queues frames
//! and can forcibly terminate the task. It never touches the socket itself.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, trace};

use crate::identifiers::ConnectionId;

use super::registry::ConnectionRegistry;
use super::relay::MessageRelay;

// ============================================================================
// ClientConnection
// ============================================================================

/// Handle to one browser client's WebSocket.
///
/// Cheap to clone; all clones refer to the same socket.
#[derive(Clone)]
pub struct ClientConnection {
    /// Registry key.
    id: ConnectionId,
    /// Peer address, for logging only.
    addr: Option<SocketAddr>,
    /// Frames waiting to be written by the event loop.
    outbound: mpsc::UnboundedSender<Message>,
    /// Cleared when the socket closes or the connection is terminated.
    open: Arc<AtomicBool>,
    /// Event loop task, once spawned.
    task: Arc<Mutex<Option<AbortHandle>>>,
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl ClientConnection {
    /// Creates a handle and the receiving end of its outbound queue.
    pub(crate) fn new(
        id: ConnectionId,
        addr: Option<SocketAddr>,
    ) -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let connection = Self {
            id,
            addr,
            outbound,
            open: Arc::new(AtomicBool::new(true)),
            task: Arc::new(Mutex::new(None)),
        };
        (connection, outbound_rx)
    }

    /// Returns the connection id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the peer address, if known.
    #[inline]
    #[must_use]
    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    /// Returns `true` while the socket is open or assumed open.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.outbound.is_closed()
    }

    /// Queues a frame for writing.
    ///
    /// Returns `false` without queuing if the connection is no longer open.
    pub fn send(&self, frame: Message) -> bool {
        if !self.is_open() {
            return false;
        }
        self.outbound.send(frame).is_ok()
    }

    /// Forcibly terminates the connection.
    ///
    /// No close handshake: the event loop task is aborted and the socket is
    /// dropped with it. Safe to call more than once.
    pub fn terminate(&self) {
        self.open.store(false, Ordering::Release);
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        trace!(connection_id = %self.id, "Connection terminated");
    }

    /// Records the event loop task so [`terminate`](Self::terminate) can abort it.
    pub(crate) fn attach_task(&self, task: AbortHandle) {
        let mut slot = self.task.lock();
        if self.open.load(Ordering::Acquire) {
            *slot = Some(task);
        } else {
            // Terminated before the loop was even spawned.
            task.abort();
        }
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Registers an upgraded socket and spawns its event loop.
///
/// Returns `None` if the registry is closed (server stopping); the socket is
/// dropped in that case.
pub(crate) fn spawn(
    socket: WebSocket,
    addr: Option<SocketAddr>,
    registry: Arc<ConnectionRegistry>,
    relay: Arc<MessageRelay>,
    keepalive: Option<Duration>,
) -> Option<ClientConnection> {
    let (connection, outbound_rx) = ClientConnection::new(ConnectionId::next(), addr);

    // Insert before spawning so a fast close can't race the insert.
    if !registry.insert(connection.clone()) {
        debug!(connection_id = %connection.id(), "Registry closed, dropping upgraded socket");
        return None;
    }

    let task = registry.spawn_tracked(run_event_loop(
        connection.id(),
        socket,
        outbound_rx,
        Arc::clone(&connection.open),
        Arc::clone(&registry),
        relay,
        keepalive,
    ));
    connection.attach_task(task.abort_handle());

    Some(connection)
}

/// Event loop that owns the socket.
///
/// Returns once the socket is gone and every frame read from it has been
/// dispatched.
async fn run_event_loop(
    id: ConnectionId,
    socket: WebSocket,
    outbound_rx: mpsc::UnboundedReceiver<Message>,
    open: Arc<AtomicBool>,
    registry: Arc<ConnectionRegistry>,
    relay: Arc<MessageRelay>,
    keepalive: Option<Duration>,
) {
    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<Utf8Bytes>();

    let socket_half = async move {
        let outcome = drive_socket(id, socket, outbound_rx, inbound_tx, keepalive).await;
        open.store(false, Ordering::Release);

        match outcome {
            Ok(()) => registry.remove_on_close(id),
            Err(e) => registry.remove_on_error(id, &e),
        }
    };

    let dispatch_half = async move {
        while let Some(text) = inbound_rx.recv().await {
            relay.dispatch(id, text.as_str()).await;
        }
        trace!(connection_id = %id, "Inbound queue drained");
    };

    tokio::join!(socket_half, dispatch_half);
}

/// Pumps frames between the socket and the two queues until it closes.
///
/// Dropping `inbound_tx` on return ends the dispatch half once it catches up.
async fn drive_socket(
    id: ConnectionId,
    socket: WebSocket,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    inbound_tx: mpsc::UnboundedSender<Utf8Bytes>,
    keepalive: Option<Duration>,
) -> Result<(), axum::Error> {
    let (mut ws_write, mut ws_read) = socket.split();
    let mut ping = keepalive.map(|period| {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    loop {
        tokio::select! {
            // Frames from the browser
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        // The receiver lives as long as this future.
                        let _ = inbound_tx.send(text);
                    }

                    Some(Ok(Message::Close(_))) | None => {
                        debug!(connection_id = %id, "WebSocket closed by client");
                        return Ok(());
                    }

                    Some(Err(e)) => return Err(e),

                    // Binary frames carry nothing in this protocol; pings are
                    // answered by the socket itself.
                    Some(Ok(_)) => {}
                }
            }

            // Frames queued by broadcasts
            frame = outbound_rx.recv() => {
                match frame {
                    Some(frame) => ws_write.send(frame).await?,
                    None => return Ok(()),
                }
            }

            _ = next_tick(&mut ping) => {
                ws_write.send(Message::Ping(Default::default())).await?;
                trace!(connection_id = %id, "Keep-alive ping sent");
            }
        }
    }
}

/// Waits for the next keep-alive tick, or forever when keep-alive is off.
async fn next_tick(ping: &mut Option<Interval>) {
    match ping {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_connection_is_open() {
        let (connection, _rx) = ClientConnection::new(ConnectionId::next(), None);
        assert!(connection.is_open());
    }

    #[tokio::test]
    async fn test_send_queues_frame() {
        let (connection, mut rx) = ClientConnection::new(ConnectionId::next(), None);
        assert!(connection.send(Message::Text("hello".into())));

        let frame = rx.recv().await.expect("frame queued");
        assert_eq!(frame, Message::Text("hello".into()));
    }

    #[test]
    fn test_terminate_closes_and_rejects_sends() {
        let (connection, _rx) = ClientConnection::new(ConnectionId::next(), None);
        connection.terminate();
        connection.terminate();

        assert!(!connection.is_open());
        assert!(!connection.send(Message::Text("late".into())));
    }

    #[test]
    fn test_dropped_receiver_means_closed() {
        let (connection, rx) = ClientConnection::new(ConnectionId::next(), None);
        drop(rx);
        assert!(!connection.is_open());
    }

    #[tokio::test]
    async fn test_attach_after_terminate_aborts_task() {
        let (connection, _rx) = ClientConnection::new(ConnectionId::next(), None);
        connection.terminate();

        let task = tokio::spawn(std::future::pending::<()>());
        connection.attach_task(task.abort_handle());

        let err = task.await.expect_err("task should be aborted");
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_clone_shares_state() {
        let (connection, _rx) = ClientConnection::new(ConnectionId::next(), None);
        let clone = connection.clone();
        connection.terminate();
        assert!(!clone.is_open());
        assert_eq!(clone.id(), connection.id());
    }
}

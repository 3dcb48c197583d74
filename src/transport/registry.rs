//! Live set of WebSocket client connections.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │           ConnectionRegistry             │
//! │  ┌────────────────────────────────────┐  │
//! │  │ conn-1 → ClientConnection          │  │
//! │  │ conn-2 → ClientConnection          │  │
//! │  │ conn-3 → ClientConnection          │  │
//! │  └────────────────────────────────────┘  │
//! └──────────────────────────────────────────┘
//!     ▲ insert (upgrade)     ▲ remove (close / error)
//!     │                      │
//!     └── snapshot (broadcast) reads a copy, never the live map
//! ```
//!
//! Connection tasks are spawned through the registry's task tracker, so
//! shutdown can wait until every socket has actually been dropped.

// ============================================================================
// Imports
// ============================================================================

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::identifiers::ConnectionId;

use super::connection::ClientConnection;

// ============================================================================
// ConnectionRegistry
// ============================================================================

/// Tracks every open browser connection.
///
/// Membership changes only through the lifecycle hooks: [`insert`] on
/// upgrade, [`remove_on_close`] and [`remove_on_error`] from the connection's
/// event loop, and [`terminate_all`] / [`close`] during shutdown.
///
/// [`insert`]: Self::insert
/// [`remove_on_close`]: Self::remove_on_close
/// [`remove_on_error`]: Self::remove_on_error
/// [`terminate_all`]: Self::terminate_all
/// [`close`]: Self::close
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Open connections by id.
    connections: RwLock<FxHashMap<ConnectionId, ClientConnection>>,
    /// Set while the server is stopped; upgrades are refused.
    closed: AtomicBool,
    /// Connection event loop tasks.
    tasks: TaskTracker,
}

// ============================================================================
// ConnectionRegistry - Queries
// ============================================================================

impl ConnectionRegistry {
    /// Creates an empty, open registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered connections.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Returns `true` if no connections are registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Returns `true` if the registry currently refuses new connections.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns `true` if the id is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().contains_key(&id)
    }

    /// Copies the current members.
    ///
    /// Broadcasts iterate this copy, so connections coming and going
    /// mid-broadcast can't disturb the iteration.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ClientConnection> {
        self.connections.read().values().cloned().collect()
    }
}

// ============================================================================
// ConnectionRegistry - Lifecycle Hooks
// ============================================================================

impl ConnectionRegistry {
    /// Adds a freshly upgraded connection.
    ///
    /// Returns `false` (and leaves the registry untouched) while closed.
    pub fn insert(&self, connection: ClientConnection) -> bool {
        let count = {
            let mut connections = self.connections.write();
            if self.is_closed() {
                return false;
            }
            connections.insert(connection.id(), connection.clone());
            connections.len()
        };

        info!(
            connection_id = %connection.id(),
            addr = ?connection.addr(),
            count,
            "Client connected"
        );
        true
    }

    /// Removes a connection whose socket closed. Idempotent.
    pub fn remove_on_close(&self, id: ConnectionId) {
        if let Some(count) = self.remove(id) {
            info!(connection_id = %id, count, "Client disconnected");
        }
    }

    /// Removes a connection whose socket errored. Idempotent.
    pub fn remove_on_error(&self, id: ConnectionId, error: &impl Display) {
        warn!(connection_id = %id, error = %error, "WebSocket error");
        if let Some(count) = self.remove(id) {
            info!(connection_id = %id, count, "Client disconnected after error");
        }
    }

    /// Spawns a connection task that shutdown will wait for.
    pub(crate) fn spawn_tracked<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(task)
    }

    /// Removes an id, returning the remaining count if it was present.
    fn remove(&self, id: ConnectionId) -> Option<usize> {
        let mut connections = self.connections.write();
        connections.remove(&id).map(|_| connections.len())
    }
}

// ============================================================================
// ConnectionRegistry - Shutdown
// ============================================================================

impl ConnectionRegistry {
    /// Terminates and removes every connection.
    ///
    /// Returns how many connections were terminated.
    pub fn terminate_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut connections = self.connections.write();
            connections.drain().map(|(_, c)| c).collect()
        };

        for connection in &drained {
            connection.terminate();
        }

        if !drained.is_empty() {
            debug!(count = drained.len(), "Terminated client connections");
        }
        drained.len()
    }

    /// Stops accepting connections and terminates any that slipped in.
    ///
    /// Pair with [`wait_for_tasks`](Self::wait_for_tasks) to know when the
    /// terminated tasks have finished.
    pub fn close(&self) {
        let stragglers: Vec<_> = {
            let mut connections = self.connections.write();
            self.closed.store(true, Ordering::Release);
            connections.drain().map(|(_, c)| c).collect()
        };
        self.tasks.close();

        for connection in &stragglers {
            connection.terminate();
        }
        debug!(stragglers = stragglers.len(), "Connection registry closed");
    }

    /// Accepts connections again after a [`close`](Self::close).
    pub fn reopen(&self) {
        self.tasks.reopen();
        self.closed.store(false, Ordering::Release);
    }

    /// Waits until every tracked connection task has finished.
    ///
    /// Only returns once the registry is [closed](Self::close).
    pub async fn wait_for_tasks(&self) {
        self.tasks.wait().await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use axum::extract::ws::Message;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::timeout;

    fn connection() -> (ClientConnection, UnboundedReceiver<Message>) {
        ClientConnection::new(ConnectionId::next(), None)
    }

    #[test]
    fn test_insert_and_remove_on_close() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = connection();

        assert!(registry.insert(conn.clone()));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(conn.id()));

        registry.remove_on_close(conn.id());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = connection();
        registry.insert(conn.clone());

        registry.remove_on_close(conn.id());
        registry.remove_on_close(conn.id());
        registry.remove_on_error(conn.id(), &"already gone");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_on_error_removes() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = connection();
        registry.insert(conn.clone());

        registry.remove_on_error(conn.id(), &"connection reset");
        assert!(!registry.contains(conn.id()));
    }

    #[test]
    fn test_snapshot_is_stable_under_mutation() {
        let registry = ConnectionRegistry::new();
        let (a, _a_rx) = connection();
        let (b, _b_rx) = connection();
        let (c, _c_rx) = connection();
        registry.insert(a.clone());
        registry.insert(b);

        let snapshot = registry.snapshot();
        registry.remove_on_close(a.id());
        registry.insert(c);

        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_terminate_all_clears_and_terminates() {
        let registry = ConnectionRegistry::new();
        let (a, _a_rx) = connection();
        let (b, _b_rx) = connection();
        registry.insert(a.clone());
        registry.insert(b.clone());

        assert_eq!(registry.terminate_all(), 2);
        assert!(registry.is_empty());
        assert!(!a.is_open());
        assert!(!b.is_open());
    }

    #[test]
    fn test_closed_registry_refuses_inserts_until_reopened() {
        let registry = ConnectionRegistry::new();
        let (a, _a_rx) = connection();
        let (b, _b_rx) = connection();

        registry.close();
        assert!(registry.is_closed());
        assert!(!registry.insert(a));
        assert!(registry.is_empty());

        registry.reopen();
        assert!(registry.insert(b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_close_terminates_stragglers() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = connection();
        registry.insert(conn.clone());

        registry.close();
        assert!(registry.is_empty());
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn test_close_waits_for_terminated_tasks() {
        struct DropFlag(std::sync::Arc<AtomicBool>);
        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::Release);
            }
        }

        let registry = ConnectionRegistry::new();
        let (conn, _rx) = connection();
        registry.insert(conn.clone());

        let dropped = std::sync::Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());
        let task = registry.spawn_tracked(async move {
            let _flag = flag;
            std::future::pending::<()>().await;
        });
        conn.attach_task(task.abort_handle());

        registry.terminate_all();
        registry.close();
        timeout(Duration::from_secs(2), registry.wait_for_tasks())
            .await
            .expect("tasks finish after terminate");

        assert!(dropped.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_reopen_tracks_new_tasks() {
        let registry = ConnectionRegistry::new();
        registry.close();
        registry.reopen();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        registry.spawn_tracked(async move {
            let _ = rx.await;
        });

        registry.close();
        assert!(
            timeout(Duration::from_millis(50), registry.wait_for_tasks())
                .await
                .is_err(),
            "wait should block on a running task"
        );

        tx.send(()).expect("task alive");
        timeout(Duration::from_secs(2), registry.wait_for_tasks())
            .await
            .expect("task finished");
    }
}

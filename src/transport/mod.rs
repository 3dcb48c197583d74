//! WebSocket transport layer.
//!
//! Browser clients connect to the same port the page is served from. Each
//! upgraded socket is registered in the [`ConnectionRegistry`] and driven by
//! its own event loop task.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Browser tab    │         WebSocket            │  BridgeServer   │
//! │                 │◄────────────────────────────►│                 │
//! │  bootstrap page │      same host:port          │  Connection     │
//! │  + UI bundle    │                              │  → MessageRelay │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. axum's `WebSocketUpgrade` - Validate the headers, write `101`
//! 2. `connection::spawn` - Register and start the tracked event loop
//! 3. Frames in → `MessageRelay::dispatch`, in order; broadcasts out via `Broadcaster`
//! 4. Close or error → removed from the registry
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Client connection handle and event loop |
//! | `registry` | Live connection set |
//! | `relay` | Inbound dispatch and outbound broadcast |

// ============================================================================
// Submodules
// ============================================================================

/// Client connection handle and event loop.
pub mod connection;

/// Live set of client connections.
pub mod registry;

/// Inbound dispatch and outbound broadcast.
pub mod relay;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::ClientConnection;
pub use registry::ConnectionRegistry;
pub use relay::{Broadcaster, HandlerResult, MessageHandler, MessageRelay, ToolbarActionHandler};

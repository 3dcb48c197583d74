//! Webview Bridge - serve an embedded UI to a plain browser.
//!
//! This library exposes a UI that normally runs inside a host application's
//! webview to an ordinary web browser. One port serves both the UI's static
//! build and a WebSocket that relays messages between the browser and the
//! host.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   HTTP (assets, SPA)    ┌──────────────────────────┐
//! │   Browser    │◄───────────────────────►│       BridgeServer       │
//! │              │                         │                          │
//! │  bootstrap   │   WebSocket (relay)     │  AccessGuard             │
//! │  page + UI   │◄───────────────────────►│  AssetResolver           │
//! └──────────────┘                         │  ConnectionRegistry      │
//!                                          │  MessageRelay ──► host   │
//!                                          └──────────────────────────┘
//! ```
//!
//! - **Browser → host**: `webview-message` and `toolbar-action` envelopes are
//!   decoded and handed to the registered handlers, in order per connection
//! - **Host → browser**: [`BridgeServer::broadcast_to_clients`] wraps a message
//!   as `extension-message` and fans it out to every open connection
//! - **Assets**: `/ext-assets/*` and `/audio/*` map to their own roots; any
//!   other path with an extension is served from the build root; everything
//!   else gets the bootstrap page
//!
//! # Quick Start
//!
//! ```no_run
//! use webview_bridge::{BridgeServer, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let server = BridgeServer::builder()
//!         .root("./webview")
//!         .port(3000)
//!         .build()?;
//!
//!     server.set_toolbar_action_handler(|action| async move {
//!         println!("toolbar: {action}");
//!         Ok(())
//!     });
//!
//!     server.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.stop().await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`http`] | Response builders, auth, assets, bootstrap page |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | WebSocket envelope types |
//! | [`server`] | [`BridgeServer`] lifecycle, configuration, axum router |
//! | [`transport`] | WebSocket connections, registry, relay |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// HTTP request handling.
///
/// Response builders, the access guard, static asset resolution and the
/// bootstrap page.
pub mod http;

/// Type-safe identifiers.
pub mod identifiers;

/// WebSocket envelope types.
pub mod protocol;

/// Bridge server lifecycle and configuration.
///
/// Use [`BridgeServer::builder()`] to create a configured server.
pub mod server;

/// WebSocket transport layer.
///
/// Connection handles, the connection registry, and the message relay.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Server types
pub use server::{BridgeServer, BridgeServerBuilder, DEFAULT_PORT, ServerConfig};

// Asset types
pub use http::{AUTH_REALM, AssetRoots, BundlePresence};

// Messaging types
pub use protocol::{InboundEnvelope, OutboundEnvelope};
pub use transport::{Broadcaster, HandlerResult};

// Error types
pub use error::{Error, HandlerError, Result};

// Identifier types
pub use identifiers::ConnectionId;

//! Bridge server: configuration, lifecycle, and request routing.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Fluent configuration |
//! | `config` | Port, password, keep-alive |
//! | `core` | [`BridgeServer`] lifecycle and messaging API |
//! | `router` | axum router, auth and CORS middleware |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent server configuration.
pub mod builder;

/// Listener settings.
pub mod config;

/// Server lifecycle controller.
pub mod core;

/// Request routing.
pub(crate) mod router;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::BridgeServerBuilder;
pub use config::{DEFAULT_PORT, ServerConfig};
pub use core::{BridgeServer, SHUTDOWN_TIMEOUT};

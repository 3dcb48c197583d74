//! HTTP side of the bridge.
//!
//! Everything here is independent of the listener: the router in
//! [`crate::server`] wires these pieces into axum.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `response` | Response builders, CORS headers |
//! | `auth` | Optional Basic authentication |
//! | `assets` | Asset roots, SPA routing, MIME types |
//! | `bootstrap` | Bootstrap HTML page |

// ============================================================================
// Submodules
// ============================================================================

/// Static asset resolution and SPA fallback.
pub mod assets;

/// Optional shared-secret Basic authentication.
pub mod auth;

/// Bootstrap HTML page.
pub mod bootstrap;

/// Response builders.
pub mod response;

// ============================================================================
// Re-exports
// ============================================================================

pub use assets::{AssetResolver, AssetRoots, Route, decode_path};
pub use auth::{AUTH_REALM, AccessGuard};
pub use bootstrap::BundlePresence;

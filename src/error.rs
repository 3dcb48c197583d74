//! Error types for the webview bridge.
//!
//! Most failures inside the bridge are handled where they happen: a malformed
//! frame is dropped, a failing handler is logged, a filesystem error becomes a
//! `500` response. Only the few failures a host has to decide about surface
//! through [`Error`].
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Lifecycle | [`Error::Bind`], [`Error::Shutdown`], [`Error::Timeout`] |
//! | External | [`Error::Io`], [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::net::SocketAddr;
use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

/// Error type returned by host-supplied message handlers.
///
/// Handler errors never reach the connection; the relay logs them and moves
/// on to the next frame.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned by the builder when a required asset root is missing.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Binding the listener failed.
    ///
    /// The server stays stopped; retrying is the caller's decision.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address the bind was attempted on.
        addr: SocketAddr,
        /// Underlying OS error (address in use, permission denied, ...).
        #[source]
        source: IoError,
    },

    /// The listener reported a failure while shutting down.
    #[error("Shutdown failed: {message}")]
    Shutdown {
        /// Description of the shutdown failure.
        message: String,
    },

    /// Operation timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a bind error.
    #[inline]
    pub fn bind(addr: SocketAddr, source: IoError) -> Self {
        Self::Bind { addr, source }
    }

    /// Creates a shutdown error.
    #[inline]
    pub fn shutdown(message: impl Into<String>) -> Self {
        Self::Shutdown {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a bind failure.
    #[inline]
    #[must_use]
    pub fn is_bind_error(&self) -> bool {
        matches!(self, Self::Bind { .. })
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_error_display() {
        let err = Error::config("build directory is required");
        assert_eq!(
            err.to_string(),
            "Configuration error: build directory is required"
        );
    }

    #[test]
    fn test_bind_error_display_and_predicate() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 3000);
        let err = Error::bind(addr, IoError::new(ErrorKind::AddrInUse, "in use"));

        assert!(err.is_bind_error());
        assert!(!err.is_timeout());
        assert_eq!(err.to_string(), "Failed to bind 0.0.0.0:3000: in use");
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::timeout("listener shutdown", 5000);
        let other_err = Error::shutdown("accept task panicked");

        assert!(timeout_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}

//! Server configuration.
//!
//! Changes made through [`BridgeServer::configure`](super::BridgeServer::configure)
//! apply on the next `start`; a running listener is never rebound.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Port used when none, or zero, is configured.
pub const DEFAULT_PORT: u16 = 3000;

// ============================================================================
// ServerConfig
// ============================================================================

/// Listener settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// TCP port, never zero.
    port: u16,
    /// Basic-auth secret. `None` disables auth.
    password: Option<String>,
    /// WebSocket ping interval. `None` disables pings.
    keepalive: Option<Duration>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("keepalive", &self.keepalive)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            password: None,
            keepalive: None,
        }
    }
}

impl ServerConfig {
    /// Creates a config. A zero port becomes [`DEFAULT_PORT`]; an empty
    /// password disables auth.
    #[must_use]
    pub fn new(port: u16, password: Option<String>) -> Self {
        Self {
            port: normalize_port(port),
            password: password.filter(|p| !p.is_empty()),
            keepalive: None,
        }
    }

    /// Sets the keep-alive ping interval.
    #[inline]
    #[must_use]
    pub fn with_keepalive(mut self, keepalive: Option<Duration>) -> Self {
        self.keepalive = keepalive.filter(|d| !d.is_zero());
        self
    }

    /// Returns the port.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the password, if auth is enabled.
    #[inline]
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Returns the keep-alive interval.
    #[inline]
    #[must_use]
    pub const fn keepalive(&self) -> Option<Duration> {
        self.keepalive
    }

    /// Returns the address to listen on: all interfaces, configured port.
    #[inline]
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.port)
    }
}

#[inline]
const fn normalize_port(port: u16) -> u16 {
    if port == 0 { DEFAULT_PORT } else { port }
}

// ============================================================================
// Tests
// ============================================================================

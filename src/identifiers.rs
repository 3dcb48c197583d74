//! Type-safe identifiers.
//!
//! Newtype wrappers so a connection id can't be confused with a port or a
//! count at compile time.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// ConnectionId
// ============================================================================

/// Source of process-unique connection ids.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one WebSocket client for the lifetime of the process.
///
/// Ids are never reused, so a stale id can't remove a newer connection from
/// the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

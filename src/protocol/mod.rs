//! WebSocket protocol message types.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `webview-message` | Browser → Host | UI message for the host's message handler |
//! | `toolbar-action` | Browser → Host | Toolbar button press |
//! | `extension-message` | Host → Browser | Host message fanned out to every client |
//!
//! Every frame is a JSON text frame. Payloads are never inspected.

// ============================================================================
// Submodules
// ============================================================================

/// Inbound and outbound envelope types.
pub mod envelope;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{Decoded, InboundEnvelope, OutboundEnvelope, OutboundKind};

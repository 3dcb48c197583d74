//! Builder pattern for bridge server configuration.
//!
//! # Example
//!
//! ```no_run
//! use webview_bridge::BridgeServer;
//!
//! # fn example() -> webview_bridge::Result<()> {
//! let server = BridgeServer::builder()
//!     .root("./webview")
//!     .port(3000)
//!     .password("secret")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::http::AssetRoots;

use super::config::{DEFAULT_PORT, ServerConfig};
use super::core::BridgeServer;

// ============================================================================
// BridgeServerBuilder
// ============================================================================

/// Builder for configuring a [`BridgeServer`].
///
/// Use [`BridgeServer::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct BridgeServerBuilder {
    /// Listening port; zero or unset means [`DEFAULT_PORT`].
    port: Option<u16>,
    /// Basic-auth secret.
    password: Option<String>,
    /// WebSocket ping interval.
    keepalive: Option<Duration>,
    /// UI build output.
    build_dir: Option<PathBuf>,
    /// Extension assets.
    ext_assets_dir: Option<PathBuf>,
    /// Audio files.
    audio_dir: Option<PathBuf>,
}

// ============================================================================
// BridgeServerBuilder Implementation
// ============================================================================

impl BridgeServerBuilder {
    /// Creates a builder with nothing set.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the listening port. Zero selects [`DEFAULT_PORT`].
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Requires HTTP Basic auth with this password. Empty disables auth.
    #[inline]
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sends a WebSocket ping to every client at this interval.
    #[inline]
    #[must_use]
    pub fn keepalive(mut self, interval: Duration) -> Self {
        self.keepalive = Some(interval);
        self
    }

    /// Sets all three asset roots from one directory: `build/`, `assets/`
    /// and `audio/` beneath it.
    ///
    /// Roots set individually, before or after, take precedence.
    #[must_use]
    pub fn root(mut self, root: impl AsRef<Path>) -> Self {
        let derived = AssetRoots::under(root);
        self.build_dir.get_or_insert(derived.build_dir);
        self.ext_assets_dir.get_or_insert(derived.ext_assets_dir);
        self.audio_dir.get_or_insert(derived.audio_dir);
        self
    }

    /// Sets the UI build output directory.
    #[inline]
    #[must_use]
    pub fn build_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.build_dir = Some(path.into());
        self
    }

    /// Sets the directory served under `/ext-assets/`.
    #[inline]
    #[must_use]
    pub fn ext_assets_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.ext_assets_dir = Some(path.into());
        self
    }

    /// Sets the directory served under `/audio/`.
    #[inline]
    #[must_use]
    pub fn audio_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.audio_dir = Some(path.into());
        self
    }

    /// Builds the server. Nothing is bound until [`BridgeServer::start`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any asset root is unset.
    pub fn build(self) -> Result<BridgeServer> {
        let roots = self.validate_roots()?;
        let config = ServerConfig::new(self.port.unwrap_or(DEFAULT_PORT), self.password)
            .with_keepalive(self.keepalive);

        Ok(BridgeServer::new(config, roots))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl BridgeServerBuilder {
    /// Checks that every asset root is set.
    fn validate_roots(&self) -> Result<AssetRoots> {
        let require = |dir: &Option<PathBuf>, name: &str, setter: &str| {
            dir.clone().ok_or_else(|| {
                Error::config(format!(
                    "{name} directory is required. Use .{setter}() or .root() to set it."
                ))
            })
        };

        Ok(AssetRoots {
            build_dir: require(&self.build_dir, "Build", "build_dir")?,
            ext_assets_dir: require(&self.ext_assets_dir, "Extension assets", "ext_assets_dir")?,
            audio_dir: require(&self.audio_dir, "Audio", "audio_dir")?,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = BridgeServerBuilder::new();
        assert!(builder.port.is_none());
        assert!(builder.build_dir.is_none());
    }

    #[test]
    fn test_root_derives_all_dirs() {
        let builder = BridgeServerBuilder::new().root("/srv/ui");
        assert_eq!(builder.build_dir, Some(PathBuf::from("/srv/ui/build")));
        assert_eq!(builder.ext_assets_dir, Some(PathBuf::from("/srv/ui/assets")));
        assert_eq!(builder.audio_dir, Some(PathBuf::from("/srv/ui/audio")));
    }

    #[test]
    fn test_explicit_dir_wins_over_root() {
        let before = BridgeServerBuilder::new().audio_dir("/sounds").root("/srv/ui");
        assert_eq!(before.audio_dir, Some(PathBuf::from("/sounds")));

        let after = BridgeServerBuilder::new().root("/srv/ui").audio_dir("/sounds");
        assert_eq!(after.audio_dir, Some(PathBuf::from("/sounds")));
    }

    #[test]
    fn test_build_fails_without_roots() {
        let err = BridgeServerBuilder::new().build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("Build"));
    }

    #[test]
    fn test_build_fails_with_partial_roots() {
        let err = BridgeServerBuilder::new()
            .build_dir("/a")
            .ext_assets_dir("/b")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Audio"));
    }

    #[tokio::test]
    async fn test_build_applies_config() {
        let server = BridgeServerBuilder::new()
            .root("/srv/ui")
            .port(0)
            .password("secret")
            .build()
            .expect("build");

        assert_eq!(server.port(), DEFAULT_PORT);
        assert!(!server.is_running());
    }
}

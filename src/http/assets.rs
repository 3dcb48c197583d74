//! Static asset resolution and SPA fallback.
//!
//! # Routing
//!
//! | Path | Source | Missing |
//! |------|--------|---------|
//! | `/ext-assets/<rest>` | extension assets root | 404 |
//! | `/audio/<rest>` | audio root | 404 |
//! | `/`, or no extension in the last segment | bootstrap page | - |
//! | anything else | build root | bootstrap page |
//!
//! A `<rest>` that would leave its root (`..`, an absolute path, a drive
//! prefix) is treated as missing.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};

use axum::response::Response;
use tokio::fs::File;
use tracing::{debug, error};

use super::bootstrap::{self, BundlePresence};
use super::response;

// ============================================================================
// Constants
// ============================================================================

/// URL prefix for the extension assets root.
pub const EXT_ASSETS_PREFIX: &str = "/ext-assets/";

/// URL prefix for the audio root.
pub const AUDIO_PREFIX: &str = "/audio/";

/// UI bundle script, relative to the build root.
pub const BUNDLE_SCRIPT: &str = "assets/index.js";

/// UI bundle stylesheet, relative to the build root.
pub const BUNDLE_STYLESHEET: &str = "assets/index.css";

/// Fallback `Content-Type` for unknown extensions.
const OCTET_STREAM: &str = "application/octet-stream";

// ============================================================================
// AssetRoots
// ============================================================================

/// The three filesystem roots assets are served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRoots {
    /// UI build output.
    pub build_dir: PathBuf,
    /// Assets shipped with the host extension.
    pub ext_assets_dir: PathBuf,
    /// Sound files.
    pub audio_dir: PathBuf,
}

impl AssetRoots {
    /// Derives all three roots from one directory: `build/`, `assets/` and
    /// `audio/` beneath it.
    #[must_use]
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            build_dir: root.join("build"),
            ext_assets_dir: root.join("assets"),
            audio_dir: root.join("audio"),
        }
    }
}

// ============================================================================
// Route
// ============================================================================

/// What to do when a routed file doesn't exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMissing {
    /// Serve the bootstrap page (client-side route).
    Bootstrap,
    /// Respond 404.
    NotFound,
}

/// Routing decision for one request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Serve the bootstrap page.
    Bootstrap,
    /// Serve a file if it exists.
    File {
        /// Absolute or root-relative location on disk.
        path: PathBuf,
        /// Fallback when it doesn't.
        on_missing: OnMissing,
    },
    /// Respond 404 without touching the filesystem.
    NotFound,
}

// ============================================================================
// AssetResolver
// ============================================================================

/// Maps request paths onto the asset roots.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    roots: AssetRoots,
}

impl AssetResolver {
    /// Creates a resolver over fixed roots.
    #[inline]
    #[must_use]
    pub fn new(roots: AssetRoots) -> Self {
        Self { roots }
    }

    /// Returns the roots.
    #[inline]
    #[must_use]
    pub fn roots(&self) -> &AssetRoots {
        &self.roots
    }

    /// Decides how to serve a decoded request path. Pure; no filesystem access.
    #[must_use]
    pub fn route(&self, path: &str) -> Route {
        if let Some(rest) = path.strip_prefix(EXT_ASSETS_PREFIX) {
            return rooted(&self.roots.ext_assets_dir, rest, OnMissing::NotFound);
        }
        if let Some(rest) = path.strip_prefix(AUDIO_PREFIX) {
            return rooted(&self.roots.audio_dir, rest, OnMissing::NotFound);
        }
        if path == "/" || !has_extension(path) {
            return Route::Bootstrap;
        }

        match safe_join(&self.roots.build_dir, path.trim_start_matches('/')) {
            Some(path) => Route::File {
                path,
                on_missing: OnMissing::Bootstrap,
            },
            None => Route::Bootstrap,
        }
    }

    /// Builds the response for a decoded request path.
    ///
    /// Filesystem errors other than not-found become a 500.
    pub async fn respond(&self, path: &str) -> Response {
        match self.route(path) {
            Route::Bootstrap => self.bootstrap_page().await,
            Route::NotFound => response::not_found(),
            Route::File { path: file, on_missing } => match open(&file).await {
                Ok(Some((handle, len))) => {
                    debug!(path = %file.display(), len, "Serving file");
                    response::file(handle, len, content_type_for(&file))
                }
                Ok(None) => match on_missing {
                    OnMissing::Bootstrap => {
                        debug!(%path, "No such build file, serving bootstrap page");
                        self.bootstrap_page().await
                    }
                    OnMissing::NotFound => {
                        debug!(%path, "Asset not found");
                        response::not_found()
                    }
                },
                Err(e) => {
                    error!(path = %file.display(), error = %e, "Failed to read asset");
                    response::internal_error()
                }
            },
        }
    }

    /// Checks which bundle files exist in the build root.
    pub async fn bundle_presence(&self) -> BundlePresence {
        BundlePresence {
            script: is_file(&self.roots.build_dir.join(BUNDLE_SCRIPT)).await,
            stylesheet: is_file(&self.roots.build_dir.join(BUNDLE_STYLESHEET)).await,
        }
    }

    async fn bootstrap_page(&self) -> Response {
        response::html(bootstrap::render(self.bundle_presence().await))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Percent-decodes a request path.
///
/// Returns `None` if the decoded bytes aren't valid UTF-8.
#[must_use]
pub fn decode_path(path: &str) -> Option<Cow<'_, str>> {
    urlencoding::decode(path).ok()
}

fn rooted(root: &Path, rest: &str, on_missing: OnMissing) -> Route {
    match safe_join(root, rest) {
        Some(path) => Route::File { path, on_missing },
        None => Route::NotFound,
    }
}

/// Joins `rest` onto `root`, refusing anything that could escape it.
#[must_use]
pub fn safe_join(root: &Path, rest: &str) -> Option<PathBuf> {
    let rest = Path::new(rest);
    let mut joined = root.to_path_buf();
    for component in rest.components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(joined)
}

/// Returns `true` if the last path segment has a file extension.
fn has_extension(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or(path);
    Path::new(last).extension().is_some()
}

/// Opens a regular file. Missing files and directories are `Ok(None)`.
async fn open(path: &Path) -> io::Result<Option<(File, u64)>> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if is_missing(&e) => return Ok(None),
        Err(e) => return Err(e),
    };

    let metadata = file.metadata().await?;
    if metadata.is_dir() {
        return Ok(None);
    }
    Ok(Some((file, metadata.len())))
}

fn is_missing(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Maps a file extension to a `Content-Type`.
#[must_use]
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json" | "map") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("wasm") => "application/wasm",
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("ogg") => "audio/ogg",
        _ => OCTET_STREAM,
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Webview bridge host binary.
//!
//! Serves a UI build directory to browsers, logs everything the UI sends,
//! and relays each line typed on stdin to every connected browser.

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use webview_bridge::{BridgeServer, DEFAULT_PORT, Result};

// ============================================================================
// Types
// ============================================================================

/// Webview bridge - serve an embedded UI to a browser over HTTP and WebSocket
#[derive(Parser, Debug)]
#[command(name = "webview-bridge")]
#[command(version, about, long_about = None)]
struct Args {
    /// Port to listen on (all interfaces)
    #[arg(short, long, env = "BRIDGE_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Require HTTP Basic auth with this password (any username)
    #[arg(long, env = "BRIDGE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Directory holding `build/`, `assets/` and `audio/`
    #[arg(short, long, env = "BRIDGE_ROOT", value_name = "DIR", default_value = ".")]
    root: PathBuf,

    /// UI build output, overrides `<root>/build`
    #[arg(long, env = "BRIDGE_BUILD_DIR", value_name = "DIR")]
    build_dir: Option<PathBuf>,

    /// Directory served under `/ext-assets/`, overrides `<root>/assets`
    #[arg(long, env = "BRIDGE_EXT_ASSETS_DIR", value_name = "DIR")]
    ext_assets_dir: Option<PathBuf>,

    /// Directory served under `/audio/`, overrides `<root>/audio`
    #[arg(long, env = "BRIDGE_AUDIO_DIR", value_name = "DIR")]
    audio_dir: Option<PathBuf>,

    /// Ping every client at this interval, in seconds
    #[arg(long, env = "BRIDGE_KEEPALIVE_SECS", value_name = "SECS")]
    keepalive_secs: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing. `RUST_LOG` overrides the default filter.
fn init_logging(debug: bool) {
    let default = if debug {
        "webview_bridge=debug"
    } else {
        "webview_bridge=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn build_server(args: Args) -> Result<BridgeServer> {
    let mut builder = BridgeServer::builder().port(args.port);

    if let Some(password) = args.password {
        builder = builder.password(password);
    }
    if let Some(secs) = args.keepalive_secs {
        builder = builder.keepalive(Duration::from_secs(secs));
    }
    if let Some(dir) = args.build_dir {
        builder = builder.build_dir(dir);
    }
    if let Some(dir) = args.ext_assets_dir {
        builder = builder.ext_assets_dir(dir);
    }
    if let Some(dir) = args.audio_dir {
        builder = builder.audio_dir(dir);
    }

    builder.root(args.root).build()
}

/// Parses a stdin line as JSON, or wraps it as a JSON string.
fn line_to_message(line: &str) -> Value {
    serde_json::from_str(line).unwrap_or_else(|_| Value::String(line.to_string()))
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let server = build_server(args)?;

    server.set_message_handler(|payload| async move {
        info!(%payload, "Webview message");
        Ok(())
    });
    server.set_toolbar_action_handler(|action| async move {
        info!(%action, "Toolbar action");
        Ok(())
    });

    server.start().await?;
    info!("Type a line to broadcast it; Ctrl+C to stop");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Ctrl+C received, shutting down");
                break;
            }

            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => {
                        match server.broadcast_to_clients(&line_to_message(line.trim())) {
                            Ok(delivered) => info!(delivered, "Broadcast sent"),
                            Err(e) => warn!(error = %e, "Broadcast failed"),
                        }
                    }
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        warn!(error = %e, "Stopped reading stdin");
                        stdin_open = false;
                    }
                }
            }
        }
    }

    server.stop().await
}

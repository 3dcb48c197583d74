//! Request routing on top of axum.
//!
//! There are no fixed routes: every request lands in one fallback handler
//! behind one middleware. The order of checks is fixed:
//!
//! 1. `OPTIONS` → 204, before anything else
//! 2. Access guard → 401 on failure, WebSocket upgrades included
//! 3. WebSocket upgrade → hand the socket to the transport layer
//! 4. `GET` / `HEAD` → static assets or the bootstrap page
//!
//! Steps 1 and 2 live in [`gate`], which also adds the CORS headers to
//! whatever comes back.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{ALLOW, AUTHORIZATION, SEC_WEBSOCKET_VERSION, UPGRADE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::{Next, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use tracing::{debug, trace};

use crate::http::{AccessGuard, AssetResolver, decode_path, response};
use crate::transport::{ConnectionRegistry, MessageRelay, connection};

// ============================================================================
// Constants
// ============================================================================

/// The only WebSocket protocol version spoken.
const WS_VERSION: &str = "13";

// ============================================================================
// RequestContext
// ============================================================================

/// Everything a request handler needs, fixed for one listener run.
#[derive(Debug)]
pub(crate) struct RequestContext {
    pub guard: AccessGuard,
    pub resolver: AssetResolver,
    pub registry: Arc<ConnectionRegistry>,
    pub relay: Arc<MessageRelay>,
    pub keepalive: Option<Duration>,
}

/// Builds the router for one listener run.
pub(crate) fn router(ctx: Arc<RequestContext>) -> Router {
    Router::new()
        .fallback(serve)
        .layer(from_fn_with_state(Arc::clone(&ctx), gate))
        .with_state(ctx)
}

// ============================================================================
// Middleware
// ============================================================================

/// Preflight short-circuit, access guard and CORS headers.
async fn gate(State(ctx): State<Arc<RequestContext>>, request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        trace!(uri = %request.uri(), "Answering preflight");
        return response::with_cors(response::no_content());
    }

    let permitted = ctx.guard.permits(
        request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
    );
    if !permitted {
        debug!(method = %request.method(), uri = %request.uri(), "Unauthorized request");
        return response::with_cors(AccessGuard::challenge());
    }

    let method = request.method().clone();
    let uri = request.uri().clone();
    let response = next.run(request).await;
    debug!(%method, %uri, status = response.status().as_u16(), "Request served");

    response::with_cors(response)
}

// ============================================================================
// Fallback Handler
// ============================================================================

/// Serves every request that got past [`gate`].
async fn serve(
    State(ctx): State<Arc<RequestContext>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if wants_websocket(&headers) {
        return match upgrade {
            Ok(ws) => accept(ws, addr, &ctx),
            Err(rejection) => refuse(rejection),
        };
    }

    if method != Method::GET && method != Method::HEAD {
        let mut response = response::text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("GET, HEAD, OPTIONS"));
        return response;
    }

    match decode_path(uri.path()) {
        Some(path) => ctx.resolver.respond(&path).await,
        None => response::not_found(),
    }
}

/// Returns `true` if the `Upgrade` header lists `websocket`.
fn wants_websocket(headers: &HeaderMap) -> bool {
    headers
        .get_all(UPGRADE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("websocket"))
}

/// Completes the upgrade and registers the connection.
fn accept(ws: WebSocketUpgrade, addr: SocketAddr, ctx: &RequestContext) -> Response {
    let registry = Arc::clone(&ctx.registry);
    let relay = Arc::clone(&ctx.relay);
    let keepalive = ctx.keepalive;

    ws.on_failed_upgrade(move |e| debug!(%addr, error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| async move {
            connection::spawn(socket, Some(addr), registry, relay, keepalive);
        })
}

/// Maps a refused upgrade onto its response.
///
/// A wrong protocol version gets `426` naming the supported one; anything
/// else keeps axum's status (`405` for non-`GET`, `400` for bad headers).
fn refuse(rejection: WebSocketUpgradeRejection) -> Response {
    debug!(%rejection, "Refusing WebSocket upgrade");
    match rejection {
        WebSocketUpgradeRejection::InvalidWebSocketVersionHeader(_) => {
            let mut response =
                response::text(StatusCode::UPGRADE_REQUIRED, "Unsupported WebSocket version");
            response
                .headers_mut()
                .insert(SEC_WEBSOCKET_VERSION, HeaderValue::from_static(WS_VERSION));
            response
        }
        other => other.into_response(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use tower::ServiceExt;

    use crate::http::AssetRoots;

    fn app(password: Option<&str>) -> Router {
        let ctx = Arc::new(RequestContext {
            guard: AccessGuard::new(password.map(str::to_string)),
            resolver: AssetResolver::new(AssetRoots::under("/nonexistent-root")),
            registry: Arc::new(ConnectionRegistry::new()),
            relay: Arc::new(MessageRelay::new()),
            keepalive: None,
        });
        router(ctx).layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))))
    }

    fn request(method: Method, uri: &str, headers: &[(&str, &str)]) -> Request {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).expect("request")
    }

    fn upgrade_headers(version: &'static str) -> [(&'static str, &'static str); 4] {
        [
            ("Connection", "Upgrade"),
            ("Upgrade", "websocket"),
            ("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ=="),
            ("Sec-WebSocket-Version", version),
        ]
    }

    async fn send(app: Router, request: Request) -> Response {
        app.oneshot(request).await.expect("infallible")
    }

    #[tokio::test]
    async fn test_options_skips_auth() {
        let response = send(
            app(Some("secret")),
            request(Method::OPTIONS, "/anything", &[]),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers().get("access-control-allow-origin"),
            Some(&HeaderValue::from_static("*"))
        );
    }

    #[tokio::test]
    async fn test_guard_runs_before_routing() {
        let plain = send(app(Some("secret")), request(Method::GET, "/", &[])).await;
        assert_eq!(plain.status(), StatusCode::UNAUTHORIZED);
        assert!(plain.headers().contains_key("www-authenticate"));

        let upgrade = send(
            app(Some("secret")),
            request(Method::GET, "/", &upgrade_headers("13")),
        )
        .await;
        assert_eq!(upgrade.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unsupported_version_is_426() {
        let response = send(app(None), request(Method::GET, "/", &upgrade_headers("7"))).await;

        assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
        assert_eq!(
            response.headers().get("sec-websocket-version"),
            Some(&HeaderValue::from_static("13"))
        );
    }

    #[tokio::test]
    async fn test_upgrade_requires_get() {
        let response = send(
            app(None),
            request(Method::POST, "/", &upgrade_headers("13")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let response = send(app(None), request(Method::POST, "/", &[])).await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            response.headers().get("allow"),
            Some(&HeaderValue::from_static("GET, HEAD, OPTIONS"))
        );
    }

    #[tokio::test]
    async fn test_spa_route_serves_bootstrap() {
        let response = send(app(None), request(Method::GET, "/some/client/route", &[])).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-methods"),
            Some(&HeaderValue::from_static("GET, OPTIONS"))
        );
    }

    #[test]
    fn test_wants_websocket_tokens() {
        let mut headers = HeaderMap::new();
        assert!(!wants_websocket(&headers));

        headers.insert(UPGRADE, HeaderValue::from_static("h2c, WebSocket"));
        assert!(wants_websocket(&headers));

        headers.insert(UPGRADE, HeaderValue::from_static("h2c"));
        assert!(!wants_websocket(&headers));
    }
}

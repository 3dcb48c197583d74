//! Optional shared-secret HTTP Basic authentication.
//!
//! The username is ignored. Only the password half of the credentials is
//! checked, so any user name works with the right secret.

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use tracing::debug;

use super::response;

// ============================================================================
// Constants
// ============================================================================

/// Realm sent in the `WWW-Authenticate` challenge.
pub const AUTH_REALM: &str = "Webview Bridge";

// ============================================================================
// AccessGuard
// ============================================================================

/// Gate applied to every request, WebSocket upgrades included.
#[derive(Clone, Default)]
pub struct AccessGuard {
    password: Option<String>,
}

impl std::fmt::Debug for AccessGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGuard")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl AccessGuard {
    /// Creates a guard. `None` or an empty password disables it.
    #[must_use]
    pub fn new(password: Option<String>) -> Self {
        Self {
            password: password.filter(|p| !p.is_empty()),
        }
    }

    /// Returns `true` if a password is required.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.password.is_some()
    }

    /// Checks an `Authorization` header value.
    #[must_use]
    pub fn permits(&self, authorization: Option<&str>) -> bool {
        let Some(expected) = self.password.as_deref() else {
            return true;
        };

        let Some(header) = authorization else {
            debug!("Rejecting request without credentials");
            return false;
        };

        match basic_password(header) {
            Some(given) if given == expected.as_bytes() => true,
            Some(_) => {
                debug!("Rejecting request with wrong password");
                false
            }
            None => {
                debug!("Rejecting request with unreadable credentials");
                false
            }
        }
    }

    /// Builds the 401 challenge.
    #[must_use]
    pub fn challenge() -> Response {
        let mut response = response::text(StatusCode::UNAUTHORIZED, "Authentication required");
        if let Ok(value) = HeaderValue::from_str(&format!("Basic realm=\"{AUTH_REALM}\"")) {
            response.headers_mut().insert(WWW_AUTHENTICATE, value);
        }
        response
    }
}

/// Extracts the password bytes from a `Basic` credential.
///
/// Everything after the first `:` is the password; with no colon the whole
/// decoded payload is.
fn basic_password(header: &str) -> Option<Vec<u8>> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = Base64Standard.decode(encoded.trim()).ok()?;
    let password = match decoded.iter().position(|&b| b == b':') {
        Some(colon) => decoded[colon + 1..].to_vec(),
        None => decoded,
    };
    Some(password)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(credentials: &str) -> String {
        format!("Basic {}", Base64Standard.encode(credentials))
    }

    #[test]
    fn test_no_password_permits_everything() {
        let guard = AccessGuard::new(None);
        assert!(!guard.is_enabled());
        assert!(guard.permits(None));
        assert!(guard.permits(Some("garbage")));
    }

    #[test]
    fn test_empty_password_disables_guard() {
        let guard = AccessGuard::new(Some(String::new()));
        assert!(!guard.is_enabled());
        assert!(guard.permits(None));
    }

    #[test]
    fn test_any_username_with_right_password() {
        let guard = AccessGuard::new(Some("secret".into()));
        assert!(guard.permits(Some(&basic("anyuser:secret"))));
        assert!(guard.permits(Some(&basic(":secret"))));
        assert!(guard.permits(Some(&basic("someone-else:secret"))));
    }

    #[test]
    fn test_rejections() {
        let guard = AccessGuard::new(Some("secret".into()));
        assert!(!guard.permits(None));
        assert!(!guard.permits(Some(&basic("anyuser:wrong"))));
        assert!(!guard.permits(Some("Basic !!!not-base64!!!")));
        assert!(!guard.permits(Some("Bearer c2VjcmV0")));
        assert!(!guard.permits(Some("Basic")));
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        let guard = AccessGuard::new(Some("secret".into()));
        let header = format!("bAsIc {}", Base64Standard.encode("u:secret"));
        assert!(guard.permits(Some(&header)));
    }

    #[test]
    fn test_no_colon_uses_whole_payload() {
        let guard = AccessGuard::new(Some("secret".into()));
        assert!(guard.permits(Some(&basic("secret"))));
    }

    #[test]
    fn test_password_may_contain_colons() {
        let guard = AccessGuard::new(Some("a:b".into()));
        assert!(guard.permits(Some(&basic("user:a:b"))));
        assert!(!guard.permits(Some(&basic("user:a"))));
    }

    #[test]
    fn test_challenge_carries_realm() {
        let response = AccessGuard::challenge();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("www-authenticate"),
            Some(&HeaderValue::from_static("Basic realm=\"Webview Bridge\""))
        );
    }

    #[test]
    fn test_debug_hides_password() {
        let guard = AccessGuard::new(Some("hunter2".into()));
        assert!(!format!("{guard:?}").contains("hunter2"));
    }

    mod properties {
        use super::*;

        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(256))]

            #[test]
            fn any_username_with_right_password_passes(
                user in "[^:]{0,16}",
                password in ".{1,24}",
            ) {
                let guard = AccessGuard::new(Some(password.clone()));
                let header = basic(&format!("{user}:{password}"));
                prop_assert!(guard.permits(Some(&header)));
            }

            #[test]
            fn wrong_password_is_rejected(
                user in "[^:]{0,16}",
                password in ".{1,24}",
                attempt in ".{0,24}",
            ) {
                prop_assume!(attempt != password);
                let guard = AccessGuard::new(Some(password));
                let header = basic(&format!("{user}:{attempt}"));
                prop_assert!(!guard.permits(Some(&header)));
            }
        }
    }
}

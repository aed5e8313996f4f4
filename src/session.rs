//! Browser session identity.
//!
//! Identity lives entirely in an opaque cookie value; the server keeps no
//! mapping. Resolution is a pure function so the transport layer stays out
//! of the decision: reuse an existing cookie value, or mint a fresh opaque
//! id and mark it for cookie-setting.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;
use uuid::Uuid;

/// Cookie carrying the per-browser session id.
pub const SESSION_COOKIE_NAME: &str = "chatkit_session_id";

const SESSION_COOKIE_MAX_AGE_DAYS: i64 = 30;

/// Outcome of session-identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSession {
    /// Effective session id for this request.
    pub id: String,
    /// Whether the id was minted here and must be set as a cookie.
    pub newly_generated: bool,
}

/// Reuse an existing cookie value, or mint a fresh opaque id.
///
/// An empty cookie value counts as absent. An existing value is never
/// replaced.
#[must_use]
pub fn resolve_session(existing: Option<&str>) -> ResolvedSession {
    match existing.filter(|v| !v.is_empty()) {
        Some(id) => ResolvedSession {
            id: id.to_string(),
            newly_generated: false,
        },
        None => ResolvedSession {
            id: Uuid::new_v4().to_string(),
            newly_generated: true,
        },
    }
}

/// Build the session cookie for a newly generated id.
///
/// HTTP-only, `SameSite=Lax`, 30-day max age, path `/`, `Secure` only in
/// production.
#[must_use]
pub fn session_cookie(session_id: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, session_id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::days(SESSION_COOKIE_MAX_AGE_DAYS))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_id_reused() {
        let resolved = resolve_session(Some("sess-123"));
        assert_eq!(resolved.id, "sess-123");
        assert!(!resolved.newly_generated);
    }

    #[test]
    fn test_missing_id_generates_uuid() {
        let resolved = resolve_session(None);
        assert!(resolved.newly_generated);
        assert!(Uuid::parse_str(&resolved.id).is_ok());
    }

    #[test]
    fn test_empty_id_counts_as_absent() {
        let resolved = resolve_session(Some(""));
        assert!(resolved.newly_generated);
        assert!(!resolved.id.is_empty());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = resolve_session(None);
        let b = resolve_session(None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = session_cookie("sess-123", false);
        assert_eq!(cookie.name(), SESSION_COOKIE_NAME);
        assert_eq!(cookie.value(), "sess-123");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.max_age(), Some(Duration::days(30)));
    }

    #[test]
    fn test_cookie_secure_in_production() {
        let cookie = session_cookie("sess-123", true);
        assert_eq!(cookie.secure(), Some(true));
    }
}

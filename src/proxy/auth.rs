//! Authorization-header presence gate.
//!
//! The only authentication performed: a request must carry an
//! `Authorization` header with any value. No token parsing or
//! verification happens here.

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Whether the request carries an `Authorization` header. Lookup is
/// case-insensitive.
#[must_use]
pub fn has_authorization(headers: &HeaderMap) -> bool {
    headers.contains_key(header::AUTHORIZATION)
}

/// The rejection sent when enforcement is on and the header is missing.
#[must_use]
pub fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "No authorization header set" })),
    )
        .into_response()
}

/// Resolve the effective enforcement switch from the configured value
/// and the legacy `CHECK_HEADER` variable: `"no"` disables the check,
/// any other set value forces it on, unset defers to the config.
#[must_use]
pub fn resolve_enforce(configured: bool, check_header: Option<&str>) -> bool {
    match check_header {
        Some("no") => false,
        Some(_) => true,
        None => configured,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_authorization_case_insensitively() {
        let mut headers = HeaderMap::new();
        assert!(!has_authorization(&headers));

        headers.insert("Authorization", "Bearer abc".parse().unwrap());
        assert!(has_authorization(&headers));
    }

    #[test]
    fn rejection_is_401() {
        let response = unauthorized_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn check_header_no_disables_enforcement() {
        assert!(!resolve_enforce(true, Some("no")));
        assert!(!resolve_enforce(false, Some("no")));
    }

    #[test]
    fn check_header_other_values_force_enforcement() {
        assert!(resolve_enforce(false, Some("yes")));
        assert!(resolve_enforce(false, Some("")));
        assert!(resolve_enforce(true, Some("NO")));
    }

    #[test]
    fn unset_check_header_defers_to_config() {
        assert!(resolve_enforce(true, None));
        assert!(!resolve_enforce(false, None));
    }
}

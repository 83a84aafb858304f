//! # Authentication Module
//!
//! Optional bearer key in front of the node service.
//!
//! The key is read from `PORTFLOW_API_KEY` only, never from the config file.
//! When set, node lifecycle, linking, resolution and processing routes all
//! answer 401 without it; `/health` stays open:
//!
//! ```text
//! Authorization: Bearer <your-api-key>
//! ```
//!
//! A rejected request never reaches the session lock.

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

// =============================================================================
// API KEY AUTHENTICATION
// =============================================================================

/// `Some(key)` if `PORTFLOW_API_KEY` is set and non-empty.
pub fn get_api_key_from_env() -> Option<String> {
    std::env::var("PORTFLOW_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

/// Compare keys in constant time over the longer of the two lengths.
fn keys_match(provided: &[u8], expected: &[u8]) -> bool {
    let len = provided.len().max(expected.len());
    let mut padded_provided = vec![0u8; len];
    let mut padded_expected = vec![0u8; len];
    padded_provided[..provided.len()].copy_from_slice(provided);
    padded_expected[..expected.len()].copy_from_slice(expected);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided.len() == expected.len()
}

/// Reject requests without the configured bearer key.
pub async fn api_key_auth_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let Some(expected) = get_api_key_from_env() else {
        return Ok(next.run(request).await);
    };

    // Load balancer health checks stay unauthenticated.
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(header_value) = auth_header else {
        tracing::warn!(
            event = "auth_failure",
            reason = "missing_authorization_header",
            "Missing Authorization header"
        );
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized"));
    };

    let provided = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
    if keys_match(provided.as_bytes(), expected.as_bytes()) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(
            event = "auth_failure",
            reason = "invalid_api_key",
            "Authentication failed: invalid API key"
        );
        Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_keys_match() {
        assert!(keys_match(b"secret", b"secret"));
    }

    #[test]
    fn test_prefix_does_not_match() {
        assert!(!keys_match(b"secret", b"secret-longer"));
        assert!(!keys_match(b"secret-longer", b"secret"));
        assert!(!keys_match(b"", b"secret"));
    }

    #[test]
    fn test_same_length_mismatch() {
        assert!(!keys_match(b"secreT", b"secret"));
    }
}

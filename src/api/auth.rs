use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::error::ApiError;
use crate::AppState;

/// Actor used when a request does not name one
pub const DEFAULT_ACTOR: &str = "admin";

/// Extract the token from request headers
fn extract_token(headers: &HeaderMap) -> Option<&str> {
    // Try Authorization header first
    if let Some(auth_header) = headers.get("Authorization").and_then(|h| h.to_str().ok()) {
        return Some(auth_header.strip_prefix("Bearer ").unwrap_or(auth_header));
    }

    // Fall back to X-API-Key header
    headers.get("X-API-Key").and_then(|h| h.to_str().ok())
}

/// Compare a provided token against the configured admin token in constant time
pub fn token_matches(expected: &str, provided: &str) -> bool {
    let expected = expected.as_bytes();
    let provided = provided.as_bytes();
    expected.len() == provided.len() && expected.ct_eq(provided).into()
}

/// Auth middleware that validates the admin token
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing API token"))?;

    if !token_matches(&state.config.auth.admin_token, token) {
        tracing::warn!(path = %request.uri().path(), "Rejected request with invalid token");
        return Err(ApiError::unauthorized("Invalid API token"));
    }

    Ok(next.run(request).await)
}

/// The staff member or admin on whose behalf a request is made, taken from
/// the `X-Actor-Id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl Actor {
    pub fn id(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = parts
            .headers
            .get("X-Actor-Id")
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_ACTOR);
        Ok(Actor(actor.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_token_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert("X-API-Key", HeaderValue::from_static("key-1"));
        assert_eq!(extract_token(&headers), Some("key-1"));

        headers.insert("Authorization", HeaderValue::from_static("Bearer tok-2"));
        assert_eq!(extract_token(&headers), Some("tok-2"));
    }

    #[test]
    fn test_token_matches() {
        assert!(token_matches("secret", "secret"));
        assert!(!token_matches("secret", "secreT"));
        assert!(!token_matches("secret", "secret-longer"));
        assert!(!token_matches("secret", ""));
    }

    #[tokio::test]
    async fn test_actor_header() {
        let request = Request::builder()
            .header("X-Actor-Id", "manager-3")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let actor = Actor::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(actor.id(), "manager-3");

        let request = Request::builder().body(()).unwrap();
        let (mut parts, _) = request.into_parts();
        let actor = Actor::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(actor.id(), DEFAULT_ACTOR);
    }
}

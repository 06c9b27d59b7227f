//! Bearer-token authentication middleware.

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::auth::{Authenticator, Identity};
use crate::web::error::ApiError;

/// Shared token verifier placed in request extensions.
pub type SharedAuthenticator = Arc<dyn Authenticator>;

/// Extract the session token from the Authorization header, or from the
/// `token` query parameter (browsers cannot set headers on WebSocket upgrades).
fn token_from_parts(parts: &Parts) -> Option<String> {
    if let Some(auth_header) = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        return auth_header
            .strip_prefix("Bearer ")
            .map(|t| t.trim().to_string());
    }

    parts.uri.query().unwrap_or("").split('&').find_map(|pair| {
        let mut kv = pair.splitn(2, '=');
        let key = kv.next()?;
        let value = kv.next()?;
        if key == "token" {
            urlencoding::decode(value).ok().map(|s| s.into_owned())
        } else {
            None
        }
    })
}

/// Extractor for authenticated users.
///
/// Use this extractor to require authentication for a handler.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl AuthUser {
    /// Authenticated user ID.
    pub fn user_id(&self) -> i64 {
        self.0.user_id
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let token = token_from_parts(parts)
                .ok_or_else(|| ApiError::unauthorized("Missing authorization"))?;

            // Set by the authenticate middleware
            let authenticator = parts
                .extensions
                .get::<SharedAuthenticator>()
                .ok_or_else(|| ApiError::internal("Authenticator not configured"))?;

            authenticator
                .authenticate(&token)
                .map(AuthUser)
                .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))
        })
    }
}

/// Middleware function to inject the authenticator into request extensions.
pub async fn authenticate(
    authenticator: SharedAuthenticator,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    request.extensions_mut().insert(authenticator);
    next.run(request).await
}

//! Session token verification.
//!
//! Token issuance and account management live with an external identity
//! provider. This module only turns an opaque bearer token into the caller's
//! identity, or rejects it.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// User ID.
    pub user_id: i64,
    /// Username at token issue time.
    pub username: String,
}

/// Verifies session tokens.
pub trait Authenticator: Send + Sync {
    /// Return the identity behind `token`, or `None` if the token is missing,
    /// malformed, expired or signed with another key.
    fn authenticate(&self, token: &str) -> Option<Identity>;
}

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: i64,
    /// Username.
    pub username: String,
    /// Issued at timestamp.
    pub iat: u64,
    /// Expiration timestamp.
    pub exp: u64,
}

/// HS256 JWT verifier.
#[derive(Clone)]
pub struct JwtAuthenticator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    /// Create a verifier from the shared secret.
    pub fn new(secret: &str) -> Self {
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        Self {
            decoding_key,
            validation,
        }
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, token: &str) -> Option<Identity> {
        if token.is_empty() {
            return None;
        }

        match decode::<JwtClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Some(Identity {
                user_id: data.claims.sub,
                username: data.claims.username,
            }),
            Err(e) => {
                tracing::debug!("JWT validation failed: {}", e);
                None
            }
        }
    }
}

impl std::fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticator").finish_non_exhaustive()
    }
}

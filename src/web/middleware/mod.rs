//! Middleware for the HTTP surface.

pub mod auth;
pub mod cors;

pub use auth::{authenticate, AuthUser, SharedAuthenticator};
pub use cors::create_cors_layer;

//! Web API module for roomcast.
//!
//! This module provides a REST API for rooms, history and read receipts, and
//! a WebSocket interface for live per-room delivery.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;
pub mod ws;

pub use error::ApiError;
pub use router::create_router;
pub use server::WebServer;

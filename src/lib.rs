//! roomcast - chat rooms with durable per-room ordering.
//!
//! Messages are appended to a per-room log with gapless positions and fanned
//! out live to connected participants. A client joining a room receives the
//! newest history page followed by every later message, with no gap and no
//! duplicate between the two.

pub mod auth;
pub mod chat;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod logging;
pub mod web;

pub use auth::{Authenticator, Identity, JwtAuthenticator, JwtClaims};
pub use chat::{
    BroadcastHub, ChatService, CloseReason, ConnectionSession, Message, Room, RoomOpened,
    RoomSummary, SessionEvent, Subscription,
};
pub use config::Config;
pub use db::{Database, NewUser, User, UserRepository};
pub use error::{Result, RoomcastError};
pub use web::WebServer;

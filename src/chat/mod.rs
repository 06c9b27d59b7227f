//! Chat module for roomcast.
//!
//! This module provides the message delivery engine:
//! - Rooms with fixed participant sets
//! - A per-room append-only message log with gapless positions
//! - Read tracking
//! - Per-room live fan-out
//! - Connection sessions joining history with the live stream

mod hub;
mod log;
mod read;
mod registry;
mod service;
mod session;
mod types;

pub use hub::{BroadcastHub, CloseReason, RoomGuard, Subscription};
pub use log::{validate_content, MessageLog};
pub use read::ReadTracker;
pub use registry::RoomRegistry;
pub use service::ChatService;
pub use session::{ConnectionSession, RoomOpened, SessionEvent};
pub use types::{Message, Room, RoomSummary};

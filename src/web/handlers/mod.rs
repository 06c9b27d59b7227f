//! API handlers.

pub mod messages;
pub mod rooms;
pub mod users;

pub use messages::*;
pub use rooms::*;
pub use users::*;

use crate::chat::ChatService;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Chat service.
    pub chat: ChatService,
}

impl AppState {
    /// Create a new application state.
    pub fn new(chat: ChatService) -> Self {
        Self { chat }
    }
}

//! Error types for roomcast.

use thiserror::Error;

/// Common error type for roomcast.
#[derive(Error, Debug)]
pub enum RoomcastError {
    /// Missing or invalid session token.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Authenticated, but not a participant of the room.
    #[error("permission denied: {0}")]
    Authorization(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found (or hidden from the caller).
    #[error("{0} not found")]
    NotFound(String),

    /// Persistence unavailable or failed.
    ///
    /// Storage failures are surfaced to the caller and never retried here.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for RoomcastError {
    fn from(e: sqlx::Error) -> Self {
        RoomcastError::Storage(e.to_string())
    }
}

impl RoomcastError {
    /// Whether the failure is a transient storage problem the caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, RoomcastError::Storage(_))
    }
}

/// Result type alias for roomcast operations.
pub type Result<T> = std::result::Result<T, RoomcastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_error_display() {
        let err = RoomcastError::Authentication("invalid token".to_string());
        assert_eq!(err.to_string(), "authentication error: invalid token");
    }

    #[test]
    fn test_authorization_error_display() {
        let err = RoomcastError::Authorization("not a participant".to_string());
        assert_eq!(err.to_string(), "permission denied: not a participant");
    }

    #[test]
    fn test_validation_error_display() {
        let err = RoomcastError::Validation("room name is empty".to_string());
        assert_eq!(err.to_string(), "validation error: room name is empty");
    }

    #[test]
    fn test_not_found_error_display() {
        let err = RoomcastError::NotFound("room".to_string());
        assert_eq!(err.to_string(), "room not found");
    }

    #[test]
    fn test_sqlx_error_is_transient() {
        let err: RoomcastError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, RoomcastError::Storage(_)));
        assert!(err.is_transient());
        assert!(!RoomcastError::NotFound("room".into()).is_transient());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RoomcastError = io_err.into();
        assert!(matches!(err, RoomcastError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }
}

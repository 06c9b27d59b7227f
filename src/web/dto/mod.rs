//! Data Transfer Objects for the HTTP and WebSocket APIs.

pub mod request;
pub mod response;
pub mod validation;

pub use request::*;
pub use response::*;
pub use validation::ValidatedJson;

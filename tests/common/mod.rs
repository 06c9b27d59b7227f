//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum_test::TestServer;
use jsonwebtoken::{encode, EncodingKey, Header};

use roomcast::config::ChatConfig;
use roomcast::web::handlers::AppState;
use roomcast::web::middleware::SharedAuthenticator;
use roomcast::web::router::{create_health_router, create_router};
use roomcast::{ChatService, Database, JwtAuthenticator, JwtClaims, NewUser, UserRepository};

/// Secret shared by the test token issuer and the server.
pub const TEST_SECRET: &str = "test-secret-key-for-testing-only";

/// Create a chat service over an in-memory database.
pub async fn create_chat_service() -> ChatService {
    create_chat_service_with(ChatConfig::default()).await
}

/// Create a chat service with custom tuning.
pub async fn create_chat_service_with(config: ChatConfig) -> ChatService {
    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");
    ChatService::new(Arc::new(db), config)
}

/// Create a test HTTP server sharing the given chat service.
pub fn create_test_server(chat: ChatService) -> TestServer {
    let authenticator: SharedAuthenticator = Arc::new(JwtAuthenticator::new(TEST_SECRET));
    let router = create_router(Arc::new(AppState::new(chat)), authenticator, &[])
        .merge(create_health_router());
    TestServer::new(router).expect("Failed to create test server")
}

/// Insert a user and return its ID.
pub async fn create_user(chat: &ChatService, username: &str) -> i64 {
    UserRepository::new(chat.db().pool())
        .create(&NewUser::new(username, format!("{username}@example.com")))
        .await
        .expect("Failed to create user")
        .id
}

/// Mint a session token for a user.
pub fn token_for(user_id: i64, username: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = JwtClaims {
        sub: user_id,
        username: username.to_string(),
        iat: now as u64,
        exp: (now + 3600) as u64,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("Failed to encode token")
}

/// Authorization header value for a user.
pub fn bearer(user_id: i64, username: &str) -> String {
    format!("Bearer {}", token_for(user_id, username))
}

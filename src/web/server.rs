//! Web server for roomcast.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::auth::JwtAuthenticator;
use crate::chat::ChatService;
use crate::config::{ServerConfig, WebConfig};
use crate::{Result, RoomcastError};

use super::handlers::AppState;
use super::middleware::SharedAuthenticator;
use super::router::{create_health_router, create_router};

/// Web server for the API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// Token verification.
    authenticator: SharedAuthenticator,
    /// Web configuration.
    web_config: WebConfig,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(
        server: &ServerConfig,
        web: &WebConfig,
        chat: ChatService,
        authenticator: SharedAuthenticator,
    ) -> Result<Self> {
        let addr = format!("{}:{}", server.host, server.port)
            .parse()
            .map_err(|e| RoomcastError::Config(format!("invalid server address: {e}")))?;

        Ok(Self {
            addr,
            app_state: Arc::new(AppState::new(chat)),
            authenticator,
            web_config: web.clone(),
        })
    }

    /// Create a web server verifying tokens with the given HS256 secret.
    pub fn with_jwt_secret(
        server: &ServerConfig,
        web: &WebConfig,
        chat: ChatService,
        jwt_secret: &str,
    ) -> Result<Self> {
        Self::new(server, web, chat, Arc::new(JwtAuthenticator::new(jwt_secret)))
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn router(self) -> axum::Router {
        create_router(
            self.app_state,
            self.authenticator,
            &self.web_config.cors_origins,
        )
        .merge(create_health_router())
    }

    /// Run the web server until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> std::result::Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.addr;
        let router = self.router();

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Web server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
    }

    /// Run the server and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::result::Result<SocketAddr, std::io::Error> {
        let addr = self.addr;
        let router = self.router();

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChatConfig;
    use crate::db::Database;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn create_test_server() -> WebServer {
        let db = Database::open_in_memory().await.unwrap();
        let chat = ChatService::new(Arc::new(db), ChatConfig::default());
        let server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        WebServer::with_jwt_secret(&server, &WebConfig::default(), chat, "test-secret").unwrap()
    }

    #[tokio::test]
    async fn test_web_server_new() {
        let server = create_test_server().await;
        assert_eq!(server.addr().ip().to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let db = Database::open_in_memory().await.unwrap();
        let chat = ChatService::new(Arc::new(db), ChatConfig::default());
        let server = ServerConfig {
            host: "not an address".to_string(),
            port: 0,
        };
        let result = WebServer::with_jwt_secret(&server, &WebConfig::default(), chat, "s");
        assert!(matches!(result, Err(RoomcastError::Config(_))));
    }

    #[tokio::test]
    async fn test_web_server_run() {
        let addr = create_test_server().await.run_with_addr().await.unwrap();

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("OK"));
    }
}

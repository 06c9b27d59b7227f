use std::sync::Arc;

use tracing::{error, info};

use roomcast::{ChatService, Config, Database, WebServer};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ROOMCAST_CONFIG").ok())
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let config = match Config::load_with_env(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Err(e) = roomcast::logging::init(&config.logging) {
        eprintln!("Failed to open log file {}: {e}", config.logging.file);
        roomcast::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    info!("roomcast starting");
    info!(
        "Server configured on {}:{}",
        config.server.host, config.server.port
    );

    let db = match Database::open(&config.database.path).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to open database {}: {}", config.database.path, e);
            std::process::exit(1);
        }
    };

    let chat = ChatService::new(db.clone(), config.chat.clone());
    let server = match WebServer::with_jwt_secret(
        &config.server,
        &config.web,
        chat.clone(),
        &config.auth.jwt_secret,
    ) {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let shutdown_chat = chat.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutting down");
        shutdown_chat.shutdown().await;
    };

    if let Err(e) = server.run(shutdown).await {
        error!("Web server error: {}", e);
    }

    db.close().await;
    info!("roomcast stopped");
}

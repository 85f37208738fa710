use std::sync::Arc;

use tracing::{error, info};

use filevault::cache::Caches;
use filevault::web::{AppState, WebServer};
use filevault::{AssetService, Config, Database, HandshakeBroker, ProgressBus};

#[tokio::main]
async fn main() {
    // Load configuration
    let mut config = match Config::load("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    config.apply_env_overrides();

    // Initialize logging
    if let Err(e) = filevault::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        filevault::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!("filevault - asset storage service");
    info!("Files root: {}", config.storage.files_root);

    let db = match Database::open(&config.database.path).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database {}: {}", config.database.path, e);
            std::process::exit(1);
        }
    };

    let caches = Caches::from_config(&config.cache);
    let bus = Arc::new(ProgressBus::new());
    let assets = AssetService::from_config(db, &config, bus, caches.paths);
    let broker = HandshakeBroker::new(caches.handshakes, config.cache.handshake_ttl());

    let server = match WebServer::new(&config.server, AppState::new(assets, broker)) {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!("Web server error: {}", e);
        std::process::exit(1);
    }
}

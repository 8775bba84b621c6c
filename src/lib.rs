pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod password;
pub mod registry;

use api::create_api_router;
use auth::renewed_access_cookie;
use axum::{Router, middleware};
use db::Database;
use jwt::JwtConfig;
use registry::RegistryStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses a connection pool internally)
    pub db: Database,
    /// Signing secret for access tokens
    pub access_secret: Vec<u8>,
    /// Signing secret for refresh tokens; must differ from the access secret
    pub refresh_secret: Vec<u8>,
    /// Access token lifetime
    pub access_ttl: Duration,
    /// Refresh token lifetime; also the registry entry TTL
    pub refresh_ttl: Duration,
    /// Whether to set the Secure flag on cookies (off only for local HTTP)
    pub secure_cookies: bool,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(
        &config.access_secret,
        &config.refresh_secret,
        config.access_ttl,
        config.refresh_ttl,
    ));

    // The sqlite-backed registry. Tests that want a pure in-process map
    // construct their router through `create_api_router` directly.
    let registry: Arc<dyn RegistryStore> = Arc::new(config.db.tokens());

    let api_router = create_api_router(config.db.clone(), jwt, registry, config.secure_cookies)
        .layer(middleware::from_fn(renewed_access_cookie));

    Router::new().nest("/api", api_router)
}

/// Run cleanup tasks and spawn the background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    axum::serve(listener, app).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> (tokio::task::JoinHandle<()>, SocketAddr) {
    init_cleanup(&config.db).await;

    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
    let local_addr = listener.local_addr().expect("Failed to get local address");

    let handle = tokio::spawn(async move {
        run_server(config, listener).await.ok();
    });

    (handle, local_addr)
}

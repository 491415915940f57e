use std::sync::Arc;

use axum::Router;
use log::*;
use service::config::Config;
use tokio::net::TcpListener;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

mod controller;
mod error;
pub mod registry;
mod router;
pub mod session;

pub use error::{Error, Result};
pub use registry::Registry;

// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(config: Config, registry: Registry) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
        }
    }
}

/// The full application: routes behind the session layer holding login state.
pub fn app(app_state: AppState) -> Router {
    // The provider sends the browser back with a cross-site top-level navigation,
    // which a SameSite=Strict cookie would not survive.
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(app_state.config.session_secure_cookie)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::seconds(
            app_state.config.session_expiry_seconds as i64,
        )));

    router::define_routes(app_state).layer(session_layer)
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let interface = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let host = format!("{}:{}", interface, app_state.config.port);

    info!("Server starting... listening for connections on http://{}", host);

    let listener = TcpListener::bind(&host).await?;
    axum::serve(listener, app(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down..."),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await
        }
    }
}

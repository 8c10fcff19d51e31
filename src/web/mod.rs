//! Web server module.

mod handlers;

pub use handlers::*;

use crate::advisor::Advisor;
use crate::config::ServerConfig;
use crate::orchestrator::Orchestrator;
use crate::state::StateStore;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub state: Arc<StateStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub advisor: Arc<Advisor>,
}

/// Web server for NetGuard.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(
        config: ServerConfig,
        state: Arc<StateStore>,
        orchestrator: Arc<Orchestrator>,
        advisor: Arc<Advisor>,
    ) -> Self {
        Self {
            state: AppState {
                config,
                state,
                orchestrator,
                advisor,
            },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/api/health", get(handlers::handle_health))
            .route("/api/dashboard", get(handlers::handle_dashboard))
            .route("/api/refresh", post(handlers::handle_refresh))
            // Devices
            .route(
                "/api/devices",
                get(handlers::handle_get_devices).post(handlers::handle_create_device),
            )
            .route("/api/devices/groups", get(handlers::handle_get_device_groups))
            .route("/api/devices/batch-delete", post(handlers::handle_batch_delete_devices))
            .route("/api/devices/import", post(handlers::handle_import_devices))
            .route(
                "/api/devices/{id}",
                get(handlers::handle_get_device)
                    .put(handlers::handle_update_device)
                    .delete(handlers::handle_delete_device),
            )
            // Backups
            .route(
                "/api/backups",
                get(handlers::handle_get_backups).post(handlers::handle_create_backup),
            )
            .route(
                "/api/backups/{id}",
                get(handlers::handle_get_backup).delete(handlers::handle_delete_backup),
            )
            .route("/api/backups/{id}/download", get(handlers::handle_download_backup))
            // Login templates
            .route(
                "/api/templates",
                get(handlers::handle_get_templates).post(handlers::handle_create_template),
            )
            .route(
                "/api/templates/{id}",
                put(handlers::handle_update_template).delete(handlers::handle_delete_template),
            )
            // Batch backup
            .route("/api/presets", get(handlers::handle_get_presets))
            .route("/api/batch-backup", post(handlers::handle_batch_backup))
            // AI assistance
            .route("/api/audit", post(handlers::handle_audit))
            .route("/api/generate", post(handlers::handle_generate))
            .fallback(handlers::handle_not_found)
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(8 * 1024 * 1024)) // 8MB, backups can be large
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

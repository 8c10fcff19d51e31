//! NetGuard - Switch Configuration Backup Service
//!
//! Keeps a switch inventory and its configuration backups in sync with a
//! REST backend (or a local SQLite store), runs batch backup jobs and asks a
//! generative-AI service to audit configurations.

mod advisor;
mod config;
mod db;
mod gateway;
mod inventory;
mod models;
mod orchestrator;
mod state;
mod web;

#[cfg(test)]
mod testing;

use advisor::Advisor;
use config::ServerConfig;
use db::{DeviceCreate, Store, StoreError};
use gateway::{Gateway, HttpGateway, LocalGateway};
use orchestrator::Orchestrator;
use state::StateStore;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Add the sample devices to an empty local store.
fn seed_sample_devices(store: &Store) -> Result<(), StoreError> {
    if !store.get_devices()?.is_empty() {
        return Ok(());
    }

    tracing::info!("Adding sample devices");
    let samples = [
        ("Core-Switch-01", "192.168.1.1", models::Vendor::Cisco, "Data Center A"),
        ("Access-Floor-1", "192.168.20.5", models::Vendor::Huawei, "Building 2"),
    ];
    for (name, ip, vendor, location) in samples {
        store.add_device(&DeviceCreate {
            name: name.to_string(),
            ip: ip.to_string(),
            vendor: vendor.label().to_string(),
            location: location.to_string(),
        })?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("netguard=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!(
        "Starting NetGuard on port {} in {} mode...",
        cfg.http_port,
        if cfg.is_local_mode() { "local" } else { "remote" }
    );

    // Pick the backend
    let gateway: Arc<dyn Gateway> = match &cfg.api_url {
        Some(url) => {
            tracing::info!("Using REST backend at {}", url);
            Arc::new(HttpGateway::new(url)?)
        }
        None => {
            tracing::info!("No backend configured, using local store {}", cfg.db_path);
            let store = Store::new(&cfg.db_path)?;
            if let Err(e) = seed_sample_devices(&store) {
                tracing::warn!("Failed to seed sample devices: {}", e);
            }
            Arc::new(LocalGateway::new(store))
        }
    };

    if cfg.ai.api_key.is_none() {
        tracing::warn!("No AI API key configured; audits and script generation are disabled");
    }

    // Initial load; the service still starts if the backend is down
    let state = Arc::new(StateStore::new(gateway.clone()));
    match state.load_all().await {
        Ok(()) => tracing::info!(
            "Loaded {} devices and {} backups",
            state.devices().await.len(),
            state.backups().await.len()
        ),
        Err(e) => tracing::error!("Initial load failed: {}", e),
    }
    if let Err(e) = state.load_templates().await {
        tracing::error!("Loading login templates failed: {}", e);
    }

    let orchestrator = Arc::new(Orchestrator::new(gateway, state.clone()));
    let advisor = Arc::new(Advisor::new(cfg.ai.clone()));

    // Start web server
    let server = Server::new(cfg, state, orchestrator, advisor);
    server.start().await?;

    Ok(())
}

use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use configs::AppConfig;
use service::FileRecordStore;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::errors::StartupError;
use crate::routes;
use crate::state::AppState;

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Open the record store and assemble the router.
pub async fn build_app(cfg: &AppConfig) -> Result<Router, StartupError> {
    common::env::ensure_env(&cfg.http.static_dir, &cfg.storage.path).await?;

    let store = FileRecordStore::open(&cfg.storage.path, cfg.storage.corrupt_alert_threshold).await?;
    let state = AppState::new(store as Arc<dyn service::RecordStore>);

    Ok(routes::build_router(state, build_cors(), &cfg.http))
}

/// Public entry: build the app and run the HTTP server until it fails
pub async fn run(cfg: AppConfig) -> Result<(), StartupError> {
    let addr: SocketAddr = cfg
        .bind_addr()
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("bind address {}: {e}", cfg.bind_addr())))?;

    let app = build_app(&cfg).await?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(service = "server", event = "listening", %addr, "listening at port {}", addr.port());
    axum::serve(listener, app).await?;
    Ok(())
}

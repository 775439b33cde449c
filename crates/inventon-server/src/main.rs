use std::net::SocketAddr;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use inventon_api::auth::AppStateInner;
use inventon_core::{AuthorizationGate, Config};
use inventon_db::StorageConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inventon=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    if config.admin_role_id.is_none() {
        warn!("ADMIN_ROLE_ID not set; only administrators and owners are privileged");
    }

    // The remote client blocks, so build the store off the async runtime
    let storage = config.storage.clone();
    let store = tokio::task::spawn_blocking(move || inventon_db::open_store(&storage)).await??;
    match &config.storage {
        StorageConfig::Sqlite { path } => info!("Using SQLite store at {}", path),
        StorageConfig::Remote { url, .. } => info!("Using remote store at {}", url),
    }

    let state = AppStateInner::new(
        store,
        AuthorizationGate::new(config.admin_role_id),
        config.jwt_secret.clone(),
    );

    let app = inventon_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_addr().parse()?;
    info!("InventOn helpdesk listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}

use anyhow::Result;
use axum::Router;
use std::{io::ErrorKind, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use uploader::{
    config::{AppConfig, BackendKind},
    routes,
    services::{chunk_sink::SinkFactory, disk_sink::DiskStore, memory_sink::MemoryStore},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!("Starting uploader with config: {:?}", cfg);

    // --- Initialize storage backend ---
    let store: Arc<dyn SinkFactory> = match cfg.backend {
        BackendKind::Disk => {
            let store = DiskStore::new(&cfg.storage_dir).await?;
            tracing::info!("Storing uploads under {}", store.root().display());
            Arc::new(store)
        }
        BackendKind::Memory => {
            tracing::warn!("Using in-memory storage; uploads are lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    // --- Build router ---
    let state = AppState::new(store, cfg.session_options());
    let app: Router = routes::routes::routes().with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    // Peer addresses feed storage key generation.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

mod routes;
mod singleton;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use teamhub_core::HubConfig;
use teamhub_core::logging::{LogFormat, init_logging};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::state::AppState;

fn main() -> Result<()> {
    init_logging(LogFormat::from_env())?;

    let config = HubConfig::load()?;
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen_addr '{}'", config.listen_addr))?;

    // Ensure only one instance serves the data file
    let _lock = match config.data_path() {
        Some(data_path) => {
            let lock = singleton::acquire_lock(&data_path)?;
            info!(lock = %lock.path().display(), "acquired data file lock");
            Some(lock)
        }
        None => None,
    };

    // Built outside the runtime: the chat client blocks.
    let state = AppState::new(config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(state.clone(), addr))?;
    drop(runtime);
    drop(state);

    Ok(())
}

async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::app()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "teamhub-server listening");
    println!("teamhub-server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("teamhub-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

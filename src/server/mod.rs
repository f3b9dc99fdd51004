pub mod handlers;
pub mod types;

use crate::{
    Result,
    config::{Config, ServerConfig},
    llm::CandleGenerator,
};
use axum::{Router, extract::DefaultBodyLimit, routing::post};
use handlers::AppState;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(handlers::chat))
        // Messages have no length limit.
        .layer(DefaultBodyLimit::disable())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<()> {
    // The model must be ready before the listener accepts anything.
    let generator = CandleGenerator::load(&config.model).await?;

    let app_state = AppState::new(Arc::new(generator), config.generation.clone());

    serve(&config.server, router(app_state)).await
}

pub async fn serve(config: &ServerConfig, app: Router) -> Result<()> {
    let addr = SocketAddr::new(config.host.parse()?, config.port);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

use crate::api::{self, AppState};
use crate::cli::commands::ServeArgs;
use crate::config::GuardConfig;
use crate::context::AppContext;
use crate::errors::GuardError;
use tracing::info;

pub async fn handle_serve(args: ServeArgs, mut config: GuardConfig) -> Result<(), GuardError> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState::new(AppContext::from_config(config)?);
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GuardError::Internal(format!("Server error: {}", e)))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

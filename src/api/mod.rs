pub mod errors;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<AppContext>,
}

impl AppState {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }
}

pub fn build_router(state: AppState) -> Router {
    let static_dir = state.ctx.config.paths.static_dir.clone();
    Router::new()
        .route("/api/health", get(routes::health::health_check))
        .route("/api/health-indicators", get(routes::health::health_indicators))
        .route("/api/system-status", get(routes::health::system_status))
        .route("/api/scripts", get(routes::execute::list_scripts))
        .route("/api/execute", post(routes::execute::execute_script))
        .route("/api/get-logs", get(routes::logs::get_logs))
        .route("/api/logs/download/:filename", get(routes::logs::download_log))
        .route("/api/logs/delete", post(routes::logs::delete_logs))
        .route("/api/analyze_llm", post(routes::llm::analyze_llm))
        .route("/api/recent-llm-results", get(routes::llm::recent_results))
        .merge(routes::pages::page_routes())
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback(routes::pages::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::api::AppState;
use crate::errors::GuardError;

/// Dashboard pages: route path and template file stem.
pub const PAGES: &[(&str, &str)] = &[
    ("/", "index"),
    ("/system-status", "system-status"),
    ("/security-tasks", "security-tasks"),
    ("/log-analysis", "log-analysis"),
    ("/llm-analysis", "llm-analysis"),
    ("/guide", "guide"),
];

pub fn page_routes() -> Router<AppState> {
    PAGES.iter().fold(Router::new(), |router, &(path, page)| {
        router.route(path, get(move |state: State<AppState>| render(state, page)))
    })
}

async fn render(State(state): State<AppState>, page: &'static str) -> Result<Html<String>, GuardError> {
    let path = state.ctx.config.paths.templates_dir.join(format!("{}.html", page));
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Ok(Html(html)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(GuardError::NotFound(format!("Page not available: {}", page)))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"status": "error", "message": "Not found"})),
    )
}

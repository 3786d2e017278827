use axum::extract::rejection::JsonRejection;
use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::info;

use crate::api::errors::json_body;
use crate::api::models::{AnalyzeRequest, AnalyzeResponse};
use crate::api::AppState;
use crate::errors::GuardError;

pub async fn analyze_llm(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, GuardError> {
    let req = json_body(payload)?;
    info!(logs = req.logs.len(), "analyze_llm request");
    let outcome = state.ctx.query.ask(&req.question, &req.logs).await?;
    Ok(Json(AnalyzeResponse {
        status: "success",
        response: outcome.answer,
        metadata: outcome.metadata,
    }))
}

pub async fn recent_results(State(state): State<AppState>) -> Json<Value> {
    let results = state.ctx.query.history().entries().await;
    Json(json!({"status": "success", "results": results}))
}

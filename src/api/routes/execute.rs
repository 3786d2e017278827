use axum::extract::rejection::JsonRejection;
use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::info;

use crate::api::errors::json_body;
use crate::api::models::{ExecuteRequest, ExecuteResponse, ScriptInfo};
use crate::api::AppState;
use crate::errors::GuardError;

pub async fn list_scripts(State(state): State<AppState>) -> Json<Value> {
    let scans = &state.ctx.scans;
    let scripts: Vec<ScriptInfo> = state
        .ctx
        .registry
        .definitions()
        .map(|def| ScriptInfo {
            key: def.key,
            scan_type: def.scan_type,
            name: def.display_name,
            timeout_secs: scans.timeout(def.budget).as_secs(),
            budget_secs: scans.budget(def.budget).as_secs(),
        })
        .collect();
    Json(json!({"status": "success", "scripts": scripts}))
}

/// Runs one registered scan to completion and persists its report. A scan
/// whose sub-checks failed still answers `success` with `error_count` set.
pub async fn execute_script(
    State(state): State<AppState>,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Result<Json<ExecuteResponse>, GuardError> {
    let req = json_body(payload)?;
    let key = req.script.trim();
    if key.is_empty() {
        return Err(GuardError::InvalidRequest("No script specified".into()));
    }
    info!(script = key, "Execute requested");

    let ctx = &state.ctx;
    let execution = ctx.registry.execute(key, &ctx.scans, &ctx.writer).await?;
    Ok(Json(ExecuteResponse {
        status: "success",
        output: format!(
            "{} finished: {} record(s), {} error(s); report saved as {}",
            execution.key, execution.summary.total, execution.error_count, execution.report.name
        ),
        script: execution.key.to_string(),
        timestamp: chrono::Local::now().to_rfc3339(),
        report: execution.report,
        summary: execution.summary,
        error_count: execution.error_count,
    }))
}

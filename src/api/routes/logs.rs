use axum::extract::rejection::JsonRejection;
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::api::errors::json_body;
use crate::api::models::DeleteLogsRequest;
use crate::api::AppState;
use crate::errors::GuardError;

pub async fn get_logs(State(state): State<AppState>) -> Result<Json<Value>, GuardError> {
    let logs = state.ctx.catalog.list().await?;
    Ok(Json(json!({"status": "success", "logs": logs})))
}

pub async fn download_log(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, GuardError> {
    let bytes = state.ctx.catalog.download(&filename).await?;
    let content_type = if filename.ends_with(".json") {
        "application/json"
    } else {
        "text/plain; charset=utf-8"
    };
    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
        ],
        bytes,
    ))
}

pub async fn delete_logs(
    State(state): State<AppState>,
    payload: Result<Json<DeleteLogsRequest>, JsonRejection>,
) -> Result<Json<Value>, GuardError> {
    let req = json_body(payload)?;
    let outcome = state.ctx.catalog.delete(&req.logs).await?;
    Ok(Json(json!({
        "status": "success",
        "deleted_logs": outcome.deleted,
        "not_found": outcome.not_found,
    })))
}

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::api::AppState;
use crate::errors::GuardError;
use crate::health::{collect_indicators, collect_system_status};
use crate::scans::TimeoutClass;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "commit": option_env!("GUARDSTICK_COMMIT").unwrap_or("unknown"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub async fn health_indicators(State(state): State<AppState>) -> Json<Value> {
    let scans = &state.ctx.scans;
    let executor = scans.executor();
    let indicators = collect_indicators(executor.as_ref(), scans.timeout(TimeoutClass::Quick)).await;
    Json(json!({
        "status": "success",
        "health_indicators": indicators,
    }))
}

pub async fn system_status() -> Result<Json<Value>, GuardError> {
    let status = collect_system_status().await?;
    Ok(Json(json!({
        "status": "success",
        "system_info": status,
    })))
}

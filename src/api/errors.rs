use axum::extract::rejection::JsonRejection;
use axum::{response::IntoResponse, Json};
use serde_json::json;
use tracing::{error, warn};
use crate::errors::GuardError;

impl IntoResponse for GuardError {
    fn into_response(self) -> axum::response::Response {
        let class = self.classify();
        if class.status.is_server_error() {
            error!(error_type = class.error_type, error = %self, "Request failed");
        } else {
            warn!(error_type = class.error_type, error = %self, "Request rejected");
        }
        let body = json!({
            "status": "error",
            "message": self.public_message(),
        });
        (class.status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for GuardError {
    fn from(rejection: JsonRejection) -> Self {
        GuardError::InvalidRequest(format!("Invalid request payload: {}", rejection.body_text()))
    }
}

/// Unwrap a JSON body, answering malformed payloads with the usual error shape.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, GuardError> {
    Ok(payload?.0)
}

//! HTTP 错误响应

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use clinic_core::ClinicError;
use serde_json::json;
use tracing::error;

/// 未预期错误统一返回的消息，细节只写入日志
pub const SERVER_ERROR_MESSAGE: &str = "Terjadi kesalahan server";

/// 包装 `ClinicError` 以实现 axum 的 `IntoResponse`
#[derive(Debug)]
pub struct ApiError(pub ClinicError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<ClinicError> for ApiError {
    fn from(err: ClinicError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match &self.0 {
            ClinicError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ClinicError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ClinicError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ClinicError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ClinicError::Permission(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ClinicError::InvalidStateTransition { event, .. } if event == "cancel" => (
                StatusCode::CONFLICT,
                "Janji temu tidak dapat dibatalkan".to_string(),
            ),
            ClinicError::InvalidStateTransition { .. } => (
                StatusCode::CONFLICT,
                "Perubahan status antrian tidak valid".to_string(),
            ),
            other => {
                error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    SERVER_ERROR_MESSAGE.to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_keep_message() {
        let (status, message) =
            ApiError(ClinicError::NotFound("Antrian tidak ditemukan".into())).status_and_message();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(message, "Antrian tidak ditemukan");

        let (status, _) = ApiError(ClinicError::Conflict("x".into())).status_and_message();
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = ApiError(ClinicError::Permission("x".into())).status_and_message();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_invalid_transition_is_conflict() {
        let err = ApiError(ClinicError::InvalidStateTransition {
            from: "completed".into(),
            event: "call".into(),
        });
        let (status, message) = err.status_and_message();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(message, "Perubahan status antrian tidak valid");
    }

    #[test]
    fn test_internal_errors_are_hidden() {
        let err = ApiError(ClinicError::Database("relation \"users\" does not exist".into()));
        let (status, message) = err.status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, SERVER_ERROR_MESSAGE);
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::request::RequestStatus;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("request {0} already exists")]
    DuplicateId(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request {0} not found or already accepted")]
    AlreadyAccepted(String),

    #[error("request {0} already delivered")]
    AlreadyDelivered(String),

    #[error("invalid otp")]
    InvalidOtp,

    #[error("transition from {from} to {to} is not allowed")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::DuplicateId(_) => {
                (StatusCode::CONFLICT, "Request ID already exists".to_string())
            }
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "Request not found".to_string()),
            AppError::AlreadyAccepted(_) => (
                StatusCode::CONFLICT,
                "Request not found or already accepted".to_string(),
            ),
            AppError::AlreadyDelivered(_) => {
                (StatusCode::CONFLICT, "Already delivered".to_string())
            }
            AppError::InvalidOtp => {
                let body = Json(json!({
                    "ok": false,
                    "success": false,
                    "error": "Invalid OTP"
                }));
                return (StatusCode::FORBIDDEN, body).into_response();
            }
            AppError::InvalidTransition { .. } => (StatusCode::CONFLICT, self.to_string()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

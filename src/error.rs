use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{gateway::GatewayError, repository::RepoError};

pub const DUPLICATE_REGISTRATION_MESSAGE: &str = "You have already registered for this camp";

/// AppError
///
/// Every failure a handler can report. Authorization variants are produced by the
/// extractors before a handler body runs, so they can never follow a write.
///
/// "Not found" is intentionally absent: lookups that match nothing return `None`
/// and are rendered as `null`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing credential, or a credential that failed verification. The message tells
    /// the two apart.
    #[error("unauthenticated: {0}")]
    Unauthenticated(&'static str),

    /// Valid credential, but the caller is not allowed (missing user record and
    /// non-admin role are the same outcome).
    #[error("forbidden")]
    Forbidden,

    #[error("duplicate registration")]
    DuplicateRegistration,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store failure: {0}")]
    Store(#[from] RepoError),

    #[error("token encoding failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("payment gateway failure: {0}")]
    PaymentGateway(#[from] GatewayError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthenticated(message) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "message": message }))).into_response()
            }
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({ "message": "forbidden access" })),
            )
                .into_response(),
            AppError::DuplicateRegistration => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": DUPLICATE_REGISTRATION_MESSAGE })),
            )
                .into_response(),
            AppError::InvalidInput(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": message })),
            )
                .into_response(),
            AppError::Store(e) => {
                tracing::error!(error = %e, "document store failure");
                internal_error()
            }
            AppError::Token(e) => {
                tracing::error!(error = %e, "token signing failure");
                internal_error()
            }
            AppError::PaymentGateway(e) => {
                tracing::error!(error = %e, "payment gateway failure");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({ "message": "payment provider unavailable" })),
                )
                    .into_response()
            }
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "internal server error" })),
    )
        .into_response()
}

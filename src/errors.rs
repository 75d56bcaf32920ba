use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Every failure the server can produce.
///
/// The `Display` text is what callers see after `Error: ` in a failed tool
/// result, so variants carry human-readable messages rather than codes.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("Only SELECT queries are allowed for safety")]
    ReadOnlyViolation,
    #[error("Only a single SELECT statement is allowed")]
    StackedStatements,
    #[error("No user found with ID: {0}")]
    UserNotFound(i64),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Unknown resource: {0}")]
    UnknownResource(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("unauthorized: {message}")]
    Unauthorized {
        code: &'static str,
        message: &'static str,
    },
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unauthorized(code: &'static str, message: &'static str) -> Self {
        Self::Unauthorized { code, message }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Unauthorized { code, message } => {
                (StatusCode::UNAUTHORIZED, code, message.to_string())
            }
            Self::Validation(message) => (StatusCode::BAD_REQUEST, "invalid_params", message),
            Self::ReadOnlyViolation => (
                StatusCode::FORBIDDEN,
                "read_only_violation",
                Self::ReadOnlyViolation.to_string(),
            ),
            Self::StackedStatements => (
                StatusCode::FORBIDDEN,
                "read_only_violation",
                Self::StackedStatements.to_string(),
            ),
            Self::UserNotFound(id) => (
                StatusCode::NOT_FOUND,
                "user_not_found",
                Self::UserNotFound(id).to_string(),
            ),
            Self::UnknownTool(name) => (
                StatusCode::NOT_FOUND,
                "tool_not_found",
                format!("Unknown tool: {name}"),
            ),
            Self::UnknownResource(uri) => (
                StatusCode::NOT_FOUND,
                "resource_not_found",
                format!("Unknown resource: {uri}"),
            ),
            Self::Database(err) => {
                tracing::error!(error = %err, "request failed with database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "internal server error".to_string(),
                )
            }
            Self::Internal(message) => {
                tracing::error!(error = %message, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                code: code.to_string(),
                message,
                details: json!({}),
            }),
        )
            .into_response()
    }
}

//! API error type and its JSON rendering.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::middleware::current_request_id;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Machine-readable error codes, grouped by category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (3xxx)
    #[serde(rename = "VAL_3001")]
    InvalidInput,
    #[serde(rename = "VAL_3003")]
    InvalidFormat,
    #[serde(rename = "VAL_3004")]
    IdMismatch,

    // Resources (4xxx)
    #[serde(rename = "RES_4001")]
    NotFound,
    #[serde(rename = "RES_4002")]
    AlreadyExists,

    // Database (7xxx)
    #[serde(rename = "DB_7001")]
    DatabaseUnavailable,
    #[serde(rename = "DB_7002")]
    QueryFailed,
}

impl ErrorCode {
    pub fn code(self) -> u16 {
        match self {
            ErrorCode::InvalidInput => 3001,
            ErrorCode::InvalidFormat => 3003,
            ErrorCode::IdMismatch => 3004,
            ErrorCode::NotFound => 4001,
            ErrorCode::AlreadyExists => 4002,
            ErrorCode::DatabaseUnavailable => 7001,
            ErrorCode::QueryFailed => 7002,
        }
    }

    pub fn http_status(self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput | ErrorCode::InvalidFormat | ErrorCode::IdMismatch => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::AlreadyExists => StatusCode::CONFLICT,
            ErrorCode::DatabaseUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::QueryFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Structured error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
    pub request_id: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub code_number: u16,
    pub message: String,
    pub details: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was refused before reaching the data layer.
    #[error("{message}")]
    Rejected {
        code: ErrorCode,
        message: String,
        details: Option<String>,
    },

    #[error("Todo item {0} not found")]
    TodoNotFound(i64),

    #[error("Todo item {0} already exists")]
    TodoExists(i64),

    #[error("Body id {body} does not match path id {path}")]
    IdMismatch { path: i64, body: i64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    pub fn rejected(code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        ApiError::Rejected {
            code,
            message: message.into(),
            details,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            ApiError::Rejected { code, .. } => *code,
            ApiError::TodoNotFound(_) => ErrorCode::NotFound,
            ApiError::TodoExists(_) => ErrorCode::AlreadyExists,
            ApiError::IdMismatch { .. } => ErrorCode::IdMismatch,
            ApiError::Database(
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_),
            ) => ErrorCode::DatabaseUnavailable,
            ApiError::Database(_) => ErrorCode::QueryFailed,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.error_code().http_status()
    }

    /// Message safe to show to clients. Driver errors stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ApiError::Database(_) if self.error_code() == ErrorCode::DatabaseUnavailable => {
                "Database is unavailable".to_string()
            }
            ApiError::Database(_) => "Database query failed".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = current_request_id().unwrap_or_else(|| Uuid::new_v4().to_string());
        let code = self.error_code();
        let status = code.http_status();

        if status.is_server_error() {
            error!(request_id = %request_id, error = %self, "Server error occurred");
        } else {
            warn!(request_id = %request_id, error = %self, "Client error occurred");
        }

        let message = self.public_message();
        let details = match self {
            ApiError::Rejected { details, .. } => details,
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code,
                code_number: code.code(),
                message,
                details,
            },
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        let (code, message) = match &err {
            JsonRejection::JsonSyntaxError(_) => {
                (ErrorCode::InvalidFormat, "Request body is not valid JSON")
            }
            JsonRejection::MissingJsonContentType(_) => {
                (ErrorCode::InvalidFormat, "Expected an application/json request body")
            }
            JsonRejection::JsonDataError(_) => {
                (ErrorCode::InvalidInput, "Request body does not describe a to-do item")
            }
            _ => (ErrorCode::InvalidInput, "Unreadable request body"),
        };
        ApiError::rejected(code, message, Some(err.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(err: PathRejection) -> Self {
        ApiError::rejected(
            ErrorCode::InvalidInput,
            "Invalid path parameter",
            Some(err.body_text()),
        )
    }
}

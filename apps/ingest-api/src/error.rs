//! Error types for the Ingest API.
//!
//! ## Mapping
//! ```text
//! ┌──────────────────────────────┬──────────────────────┬────────┐
//! │ Source                       │ code                 │ status │
//! ├──────────────────────────────┼──────────────────────┼────────┤
//! │ DbError::NotFound            │ NOT_FOUND            │ 404    │
//! │ ValidationError, CoreError,  │ VALIDATION_ERROR     │ 422    │
//! │ FK violation, bad JSON/query │                      │        │
//! │ UniqueViolation, conflict    │ CONFLICT             │ 409    │
//! │ other DbError                │ DATABASE_ERROR       │ 500    │
//! │ anything else                │ INTERNAL             │ 500    │
//! └──────────────────────────────┴──────────────────────┴────────┘
//! ```
//!
//! 500s are logged with their detail and answered with a generic message.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::envelope::Meta;
use opsledger_core::{CoreError, ValidationError};
use opsledger_db::DbError;

/// Ingest API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client.
    fn public_message(&self) -> String {
        match self {
            ApiError::NotFound(msg) | ApiError::Validation(msg) | ApiError::Conflict(msg) => {
                msg.clone()
            }
            ApiError::Database(_) => "database error".to_string(),
            ApiError::Internal(_) => "internal error".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
    meta: Meta,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "Request failed");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message: self.public_message(),
            },
            meta: Meta::current(Vec::new()),
        };
        (status, Json(body)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::NotFound { entity, id } => ApiError::NotFound(format!("{entity} {id} not found")),
            DbError::UniqueViolation { field, value } => {
                ApiError::Conflict(format!("{field} '{value}' already exists"))
            }
            DbError::DedupConflict { .. } => ApiError::Conflict(error.to_string()),
            DbError::ForeignKeyViolation { message } => ApiError::Validation(message),
            DbError::Core(core) => core.into(),
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        ApiError::Validation(error.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        ApiError::Validation(error.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

/// Result alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

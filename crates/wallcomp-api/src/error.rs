//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use wallcomp_media::MediaError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Source fetch failed: {0}")]
    FetchFailed(String),

    #[error("Composition failed: {message}")]
    Engine {
        message: String,
        diagnostic: Option<String>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::FetchFailed(_) => StatusCode::BAD_GATEWAY,
            ApiError::Engine { .. } | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Validation(_) => "validation_error",
            ApiError::FetchFailed(_) => "fetch_failed",
            ApiError::Engine { .. } => "engine_failed",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Validation(e) => ApiError::Validation(e.to_string()),
            MediaError::FetchFailed { .. } => ApiError::FetchFailed(err.to_string()),
            e if e.is_engine_failure() => ApiError::Engine {
                message: e.to_string(),
                diagnostic: e.diagnostic().map(str::to_string),
            },
            e => {
                error!(error = %e, "Composition failed with internal error");
                ApiError::Internal(e.to_string())
            }
        }
    }
}

/// Detail shown instead of internal error messages in production.
pub const INTERNAL_ERROR_DETAIL: &str = "An internal error occurred";

/// Response extension marking a body that carries internal error details.
#[derive(Debug, Clone, Copy)]
pub struct InternalErrorDetail;

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        let detail = match &self {
            ApiError::Engine {
                message,
                diagnostic: Some(diagnostic),
            } if !diagnostic.is_empty() => format!("{}: {}", message, diagnostic),
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            detail,
            code: Some(code.to_string()),
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self, ApiError::Internal(_)) {
            response.extensions_mut().insert(InternalErrorDetail);
        }
        response
    }
}

/// Body sent in place of a marked internal error.
pub fn redacted_internal_error() -> Response {
    let body = ErrorResponse {
        detail: INTERNAL_ERROR_DETAIL.to_string(),
        code: Some(ApiError::Internal(String::new()).code().to_string()),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

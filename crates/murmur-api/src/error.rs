use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

use murmur_types::api::ErrorBody;

/// Every handler failure funnels through this type. Store and library
/// errors are translated at the handler boundary; nothing is retried.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed request fields (400)
    #[error("{0}")]
    Validation(String),

    /// Duplicate unique value, e.g. a taken username (400)
    #[error("{0}")]
    Conflict(String),

    /// Bad credentials, missing or expired token (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to touch this resource (403)
    #[error("{0}")]
    Forbidden(String),

    /// Missing user / conversation / message / post (404)
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Underlying persistence failure (500). Detail stays in the log.
    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Store(anyhow::anyhow!("spawn_blocking join error: {}", err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected request body: {}", rejection.body_text());
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        debug!("Rejected path: {}", rejection.body_text());
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Store(e) => {
                error!("Store error: {:#}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (self.status(), Json(ErrorBody { message })).into_response()
    }
}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

/// Closed set of failure categories.
///
/// Every [`CastmatchError`] reports exactly one kind; callers branch on the
/// kind rather than on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed caller input
    BadRequest,
    /// The upstream rejected our credential
    Unauthorized,
    /// The upstream has no such entity
    NotFound,
    /// The upstream asked us to slow down
    RateLimited,
    /// Upstream 5xx, unexpected status, network or decode failure
    Upstream,
    /// Anything that is our own fault
    Internal,
}

#[derive(Error, Debug)]
pub enum CastmatchError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited by upstream, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    /// A failure annotated with the pipeline stage it happened in
    #[error("{stage}: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<CastmatchError>,
    },
}

impl CastmatchError {
    /// Discriminant of this error; `Stage` reports the kind of what it wraps.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CastmatchError::BadRequest(_) => ErrorKind::BadRequest,
            CastmatchError::Unauthorized(_) => ErrorKind::Unauthorized,
            CastmatchError::NotFound(_) => ErrorKind::NotFound,
            CastmatchError::RateLimited { .. } => ErrorKind::RateLimited,
            CastmatchError::Upstream(_) | CastmatchError::Http(_) => ErrorKind::Upstream,
            CastmatchError::Internal(_) => ErrorKind::Internal,
            CastmatchError::Stage { source, .. } => source.kind(),
        }
    }

    /// Wrap this error with the name of the stage that produced it.
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        CastmatchError::Stage {
            stage: stage.into(),
            source: Box::new(self),
        }
    }
}

impl ErrorKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn description(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "The request was malformed or contains invalid parameters.",
            ErrorKind::Unauthorized => "The metadata provider rejected the configured credential.",
            ErrorKind::NotFound => "The requested resource could not be found.",
            ErrorKind::RateLimited => "Too many requests. Please try again later.",
            ErrorKind::Upstream => "The metadata provider failed to answer the request.",
            ErrorKind::Internal => "An unexpected error occurred on the server.",
        }
    }
}

impl IntoResponse for CastmatchError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = kind.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            error!("Request failed ({}): {}", status, message);
        }

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
            "description": kind.description(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, CastmatchError>;

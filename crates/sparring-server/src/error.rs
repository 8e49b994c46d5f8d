use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use sparring_core::SparringError;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Wraps core errors so handlers can use `?`.
#[derive(Debug)]
pub struct ApiError(pub SparringError);

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<SparringError> for ApiError {
    fn from(e: SparringError) -> Self {
        ApiError(e)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retryable: Option<bool>,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            SparringError::AgentNotFound(_) => StatusCode::NOT_FOUND,
            SparringError::DuplicateAgent(_) | SparringError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            SparringError::UnknownProfile(_) | SparringError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            SparringError::EnvironmentUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            SparringError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self.0);
        }

        let retryable = match &self.0 {
            SparringError::EnvironmentUnavailable { retryable, .. } => Some(*retryable),
            _ => None,
        };
        HttpResponse::build(status).json(ErrorBody {
            error: self.0.to_string(),
            kind: self.0.kind(),
            retryable,
        })
    }
}

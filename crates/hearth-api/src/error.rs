use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use hearth_types::api::ErrorResponse;
use hearth_workflow::WorkflowError;

/// Error returned by every handler: an HTTP status plus a `{code, message}`
/// body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation", message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", "missing or invalid credentials")
    }

    pub fn conflict(code: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// Logs `err` and hides it from the client.
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        error!("{}: {:#}", context, err);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", "internal server error")
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        let status = match &err {
            WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
            WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::InvalidState(_)
            | WorkflowError::NoProofs
            | WorkflowError::UsernameTaken => StatusCode::CONFLICT,
            WorkflowError::Store(e) => return Self::internal("store error", e),
        };
        Self::new(status, err.code(), err.to_string())
    }
}

/// Undecodable bodies are validation errors, except for the two cases with
/// a more specific status.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        match rejection.status() {
            StatusCode::UNSUPPORTED_MEDIA_TYPE => {
                Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_media_type", message)
            }
            StatusCode::PAYLOAD_TOO_LARGE => {
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, "too_large", message)
            }
            _ => Self::bad_request(message),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::internal("spawn_blocking join error", err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_errors_map_to_statuses() {
        let cases = [
            (WorkflowError::validation("rating is required"), StatusCode::BAD_REQUEST, "validation"),
            (WorkflowError::forbidden("nope"), StatusCode::FORBIDDEN, "forbidden"),
            (WorkflowError::NotFound("booking".into()), StatusCode::NOT_FOUND, "not_found"),
            (WorkflowError::invalid_state("pending"), StatusCode::CONFLICT, "invalid_state"),
            (WorkflowError::NoProofs, StatusCode::CONFLICT, "no_proofs"),
            (WorkflowError::UsernameTaken, StatusCode::CONFLICT, "username_taken"),
        ];
        for (err, status, code) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status, status);
            assert_eq!(api.body.code, code);
        }
    }

    #[test]
    fn validation_message_passes_through() {
        let api = ApiError::from(WorkflowError::validation("rating is required"));
        assert_eq!(api.body.message, "rating is required");
    }

    #[test]
    fn store_errors_are_hidden() {
        let api = ApiError::from(WorkflowError::Store(anyhow::anyhow!("no such table: reviews")));
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.body.code, "internal");
        assert!(!api.body.message.contains("reviews"));
    }
}

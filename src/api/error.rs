/// Error type returned by the HTTP handlers
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::api::dto::ErrorResponse;
use crate::app_state::FileStoreError;
use crate::service::SessionError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: true,
            message: self.to_string(),
            code: Some(status.as_u16()),
        };
        (status, Json(body)).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(id) => ApiError::NotFound(format!("Session not found: {id}")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<FileStoreError> for ApiError {
    fn from(e: FileStoreError) -> Self {
        match e {
            FileStoreError::NotFound(_) => ApiError::NotFound(e.to_string()),
            FileStoreError::AlreadyExists(_) => ApiError::BadRequest(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::SessionId;

    #[test]
    fn test_status_mapping() {
        let err = ApiError::from(SessionError::NotFound(SessionId::nil()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = ApiError::from(FileStoreError::AlreadyExists("a.py".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let spawn = SessionError::Pty(crate::pty::PtyError::Spawn {
            shell: "/nope".into(),
            reason: "not found".into(),
        });
        assert_eq!(ApiError::from(spawn).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_body_shape() {
        let response = ApiError::NotFound("missing".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

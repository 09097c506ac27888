// src/error.rs
use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

/// Why an operation on a poll was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    #[error("authentication required")]
    AuthenticationRequired,

    #[error("you are not the poll creator")]
    NotPollCreator,

    #[error("administrator role required")]
    AdminRequired,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("you have already voted on this poll")]
    AlreadyVoted,

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Forbidden(#[from] Denial),

    #[error("{0}")]
    Validation(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::AlreadyVoted | AppError::Conflict(_) => "conflict",
            AppError::Forbidden(_) => "forbidden",
            AppError::Validation(_) => "validation",
            AppError::InvalidCredentials | AppError::Unauthorized(_) => "unauthorized",
            AppError::Storage(_) | AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyVoted | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Storage details stay in the logs.
        let message = match &self {
            AppError::Storage(e) => {
                error!("Storage failure: {e}");
                "internal server error".to_string()
            }
            AppError::Internal(e) => {
                error!("Internal failure: {e}");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(json!({ "error": self.kind(), "message": message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_reasons_share_status_but_not_text() {
        let anonymous = AppError::from(Denial::AuthenticationRequired);
        let stranger = AppError::from(Denial::NotPollCreator);

        assert_eq!(anonymous.status(), StatusCode::FORBIDDEN);
        assert_eq!(stranger.status(), StatusCode::FORBIDDEN);
        assert_ne!(anonymous.to_string(), stranger.to_string());
        assert_eq!(stranger.to_string(), "you are not the poll creator");
    }

    #[test]
    fn taxonomy_maps_to_statuses() {
        assert_eq!(AppError::NotFound("poll").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::NotFound("option").to_string(), "option not found");
        assert_eq!(AppError::AlreadyVoted.status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Validation("title is required".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::InvalidCredentials.kind(), "unauthorized");
    }
}

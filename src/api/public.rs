//! Public API types

use axum::response::{IntoResponse, Response};
use http::StatusCode;

use crate::study::StudyError;

// Errors

pub struct ApiError(anyhow::Error);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<StudyError>() {
            Some(StudyError::MissingIdentifier | StudyError::InvalidIdentifier(_)) => {
                StatusCode::BAD_REQUEST
            }
            Some(
                StudyError::PromptNotFound(_)
                | StudyError::NoUploadedPrompts
                | StudyError::SessionNotFound(_),
            ) => StatusCode::NOT_FOUND,
            Some(StudyError::MissingCredential(_)) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert `ApiError` into an Axum compatible response.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self.0);
        } else {
            tracing::warn!("{}", self.0);
        }

        // Participant facing errors are shown as is
        let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
            format!("Something went wrong: {}", self.0)
        } else {
            self.0.to_string()
        };
        (status, body).into_response()
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>` to turn them into `Result<_, ApiError>`
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

// Re-export public types from each route

pub mod session {
    pub use crate::api::routes::session::public::*;
}

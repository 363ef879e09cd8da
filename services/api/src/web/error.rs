//! services/api/src/web/error.rs
//!
//! The one place where account errors become HTTP responses.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::accounts::AccountError;

/// Body of every failed request.
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl AccountError {
    pub fn status(&self) -> StatusCode {
        match self {
            AccountError::Validation(_) => StatusCode::BAD_REQUEST,
            AccountError::Conflict(_) => StatusCode::CONFLICT,
            AccountError::NotFound(_) => StatusCode::NOT_FOUND,
            AccountError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AccountError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Unreadable bodies are a client error, whatever the extractor's reason.
pub fn invalid_json(rejection: JsonRejection) -> AccountError {
    debug!(reason = %rejection.body_text(), "rejected request body");
    AccountError::Validation("invalid json body")
}

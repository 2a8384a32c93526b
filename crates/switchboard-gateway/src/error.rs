// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON error responses for the review API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use switchboard_core::SwitchboardError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A [`SwitchboardError`] on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub SwitchboardError);

impl From<SwitchboardError> for ApiError {
    fn from(err: SwitchboardError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self(SwitchboardError::InvalidInput(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SwitchboardError::InvalidInput(_) | SwitchboardError::InvalidTransition { .. } => {
                StatusCode::BAD_REQUEST
            }
            SwitchboardError::NotFound { .. } | SwitchboardError::TenantNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "review API request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_statuses() {
        assert_eq!(ApiError::invalid("bad").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError(SwitchboardError::NotFound {
                entity: "conversation",
                id: "U1".into()
            })
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(SwitchboardError::TenantNotFound("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(SwitchboardError::channel("down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_response_serializes() {
        let json = serde_json::to_string(&ErrorResponse {
            error: "something went wrong".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"error":"something went wrong"}"#);
    }
}

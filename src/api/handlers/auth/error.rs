//! Error responses for auth endpoints.
//!
//! Bodies carry only generic text. The reason a request failed is logged, not
//! returned.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::types::ErrorResponse;

pub const INVALID_CREDENTIALS: &str = "Invalid username or password";
pub const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";
pub const NOT_AUTHENTICATED: &str = "Not authenticated";
pub const SERVICE_UNAVAILABLE: &str = "Authentication service unavailable";
pub const INTERNAL_ERROR: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("Authentication service unavailable")]
    Unavailable,
    #[error("Internal server error")]
    Internal,
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn renders_generic_json_message() -> Result<()> {
        let response = AuthError::Unauthorized(INVALID_CREDENTIALS).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(value["message"], INVALID_CREDENTIALS);
        Ok(())
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            AuthError::Validation("x".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::Unavailable.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(AuthError::Unavailable.to_string(), SERVICE_UNAVAILABLE);
        assert_eq!(AuthError::Internal.to_string(), INTERNAL_ERROR);
    }
}

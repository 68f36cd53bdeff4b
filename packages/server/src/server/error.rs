//! Mapping from gateway outcomes to HTTP responses.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domains::gateway::GatewayError;

/// Body of every response: `{ "success": ..., "message": ..., "data": ... }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data: Some(data),
        })
    }
}

impl ApiResponse<()> {
    pub fn message_only(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data: None,
        })
    }
}

/// Error half of every handler's `Result`.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(GatewayError::validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(GatewayError::validation(rejection.body_text()))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized | GatewayError::InvalidOrExpired => StatusCode::UNAUTHORIZED,
            GatewayError::Rejected | GatewayError::DeviceNotTrusted => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::AlreadyRegistered | GatewayError::DeviceConflict | GatewayError::Conflict => {
                StatusCode::CONFLICT
            }
            GatewayError::InsufficientFunds | GatewayError::PinNotSet => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            GatewayError::TransferFailed => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// What the caller sees. OTP failures all read the same.
    pub fn message(&self) -> String {
        match &self.0 {
            GatewayError::InvalidOrExpired => "Invalid or expired code".to_string(),
            GatewayError::Store(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let GatewayError::Store(e) = &self.0 {
            tracing::error!(error = %e, "request failed on store error");
        }

        let body = ApiResponse::<()> {
            success: false,
            message: self.message(),
            data: None,
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_are_opaque() {
        let err = ApiError(GatewayError::Store(anyhow::anyhow!("connection refused on 10.0.0.5")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "Internal server error");
    }

    #[test]
    fn test_otp_failure_message_is_generic() {
        let err = ApiError(GatewayError::InvalidOrExpired);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.message(), "Invalid or expired code");
    }

    #[test]
    fn test_money_errors_are_specific() {
        assert_eq!(
            ApiError(GatewayError::InsufficientFunds).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError(GatewayError::NotFound("Recipient not found")).message(),
            "Recipient not found"
        );
        assert_eq!(ApiError(GatewayError::DeviceNotTrusted).status(), StatusCode::FORBIDDEN);
    }
}

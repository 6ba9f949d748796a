//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orchestrator::CreateOrderError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Order creation failed.
    CreateOrder(CreateOrderError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::CreateOrder(err) => create_order_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn create_order_error_to_response(err: CreateOrderError) -> (StatusCode, String) {
    match &err {
        CreateOrderError::UserNotFound(_) | CreateOrderError::ProductNotFound { .. } => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        CreateOrderError::InvalidLineItem(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CreateOrderError::InsufficientStock { .. }
        | CreateOrderError::DuplicateRequest { .. }
        | CreateOrderError::StaleOrderState(_) => (StatusCode::CONFLICT, err.to_string()),
        CreateOrderError::DependencyUnavailable { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<CreateOrderError> for ApiError {
    fn from(err: CreateOrderError) -> Self {
        ApiError::CreateOrder(err)
    }
}

impl From<store::StoreError> for ApiError {
    fn from(err: store::StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

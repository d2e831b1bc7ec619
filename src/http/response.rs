//! Response envelope and error-to-status mapping.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::login::DenialReason;

/// Header carrying the number of seconds a throttled client should wait.
pub const RETRY_AFTER_HEADER: &str = "X-Rate-Limit-Retry-After-Seconds";

/// JSON envelope shared by every API endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data,
        }
    }
}

impl ApiResponse<()> {
    /// A successful response with no payload.
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LockDetails {
    remaining_seconds: u64,
    remaining_minutes: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttemptDetails {
    remaining_attempts: u32,
}

/// Failures an API handler can return.
#[derive(Debug)]
pub enum ApiError {
    /// The identity is locked (423).
    Locked { remaining_secs: u64 },
    /// Wrong credentials (401).
    InvalidCredentials { remaining_attempts: Option<u32> },
    /// Missing or wrong admin token (401).
    Unauthorized,
    /// The counter store could not answer (503).
    Unavailable,
    /// Anything else (500). The detail is logged, never returned.
    Internal(String),
}

impl From<DenialReason> for ApiError {
    fn from(reason: DenialReason) -> Self {
        match reason {
            DenialReason::Locked { remaining_secs } => ApiError::Locked { remaining_secs },
            DenialReason::InvalidCredentials { remaining_attempts } => {
                ApiError::InvalidCredentials { remaining_attempts }
            }
            DenialReason::Unavailable => ApiError::Unavailable,
        }
    }
}

impl From<crate::error::GatehouseError> for ApiError {
    fn from(e: crate::error::GatehouseError) -> Self {
        match e {
            crate::error::GatehouseError::StoreUnavailable(inner) => {
                tracing::error!(error = %inner, "Counter store unavailable");
                ApiError::Unavailable
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Message shown for a lock, e.g. "... try again in 14 minutes and 5 seconds."
pub fn lock_message(remaining_secs: u64) -> String {
    format!(
        "Account is locked due to too many failed login attempts. \
         Please try again in {} minutes and {} seconds.",
        remaining_secs / 60,
        remaining_secs % 60
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Locked { remaining_secs } => {
                let body = ApiResponse::failure(
                    lock_message(remaining_secs),
                    Some(LockDetails {
                        remaining_seconds: remaining_secs,
                        remaining_minutes: remaining_secs / 60,
                    }),
                );
                let mut response = (StatusCode::LOCKED, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(RETRY_AFTER_HEADER, HeaderValue::from(remaining_secs));
                response
            }
            ApiError::InvalidCredentials { remaining_attempts } => {
                let message = match remaining_attempts {
                    Some(n) => format!("Invalid credentials. Remaining attempts: {}", n),
                    None => "Invalid credentials".to_string(),
                };
                let body = ApiResponse::failure(
                    message,
                    remaining_attempts.map(|remaining_attempts| AttemptDetails { remaining_attempts }),
                );
                (StatusCode::UNAUTHORIZED, Json(body)).into_response()
            }
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::<()>::failure("Admin token required", None)),
            )
                .into_response(),
            ApiError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::<()>::failure(
                    "Service temporarily unavailable. Please try again later.",
                    None,
                )),
            )
                .into_response(),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::<()>::failure(
                        "An unexpected error occurred. Please try again.",
                        None,
                    )),
                )
                    .into_response()
            }
        }
    }
}

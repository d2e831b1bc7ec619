use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Instrument};

use super::response::{ApiError, ApiResponse};
use super::state::AppState;
use crate::login::{LoginDecision, LoginStats};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub username_or_email: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("login", %request_id);
    throttled_login(state, body).instrument(span).await
}

async fn throttled_login(
    state: AppState,
    body: LoginRequest,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let decision = state
        .login
        .attempt(&body.username_or_email, &body.password)
        .await?;

    match decision {
        LoginDecision::Success => {
            info!("Login successful");
            Ok(Json(ApiResponse::success(
                "Login successful",
                LoginResponse {
                    username_or_email: body.username_or_email,
                },
            )))
        }
        LoginDecision::Denied(reason) => {
            warn!(reason = ?reason, "Login denied");
            Err(reason.into())
        }
    }
}

pub async fn unlock(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(identity): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    require_admin(&state, &headers)?;
    state.login.gate().unlock(&identity).await?;
    info!(identity = %identity, "Account manually unlocked by admin");
    Ok(Json(ApiResponse::done(format!(
        "Account '{}' unlocked successfully",
        identity
    ))))
}

pub async fn login_attempts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(identity): Path<String>,
) -> Result<Json<ApiResponse<LoginStats>>, ApiError> {
    require_admin(&state, &headers)?;
    let stats = state.login.gate().stats(&identity).await?;
    tracing::debug!(identity = %identity, "Admin retrieved login statistics");
    Ok(Json(ApiResponse::success(
        "Login attempt statistics retrieved",
        stats,
    )))
}

pub async fn health() -> Json<ApiResponse<()>> {
    Json(ApiResponse::done("ok"))
}

/// Admin routes require `Authorization: Bearer <admin_token>` when a token
/// is configured.
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.server.admin_token.as_deref() else {
        return Ok(());
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if presented == Some(expected) {
        Ok(())
    } else {
        warn!("Rejected admin request with missing or wrong token");
        Err(ApiError::Unauthorized)
    }
}

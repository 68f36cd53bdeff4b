//! Profile and onboarding.
//!
//! GET  /api/me
//! PUT  /api/me
//! POST /api/onboarding/pin

use axum::{extract::rejection::JsonRejection, Extension, Json};
use serde::Deserialize;

use crate::domains::gateway::ProfileUpdate;
use crate::domains::identity::Identity;
use crate::kernel::ServerDeps;
use crate::server::error::{ApiError, ApiResponse};
use crate::server::middleware::AuthUser;

#[derive(Debug, Deserialize)]
pub struct SetPinRequest {
    pub transaction_pin: String,
    /// Required when replacing an existing PIN
    #[serde(default)]
    pub current_pin: Option<String>,
}

pub async fn me_handler(
    Extension(deps): Extension<ServerDeps>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Identity>>, ApiError> {
    let identity = deps.gateway.profile(user.identity_id).await?;
    Ok(ApiResponse::ok("Profile retrieved", identity))
}

pub async fn update_profile_handler(
    Extension(deps): Extension<ServerDeps>,
    user: AuthUser,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<ApiResponse<Identity>>, ApiError> {
    let Json(update) = payload?;
    let identity = deps.gateway.update_profile(user.identity_id, update).await?;
    Ok(ApiResponse::ok("Profile updated successfully", identity))
}

pub async fn set_pin_handler(
    Extension(deps): Extension<ServerDeps>,
    user: AuthUser,
    payload: Result<Json<SetPinRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Identity>>, ApiError> {
    let Json(input) = payload?;
    let identity = deps
        .gateway
        .set_transaction_pin(
            user.identity_id,
            &input.transaction_pin,
            input.current_pin.as_deref(),
        )
        .await?;
    Ok(ApiResponse::ok("Transaction PIN set", identity))
}

//! Registration, login and OTP verification.
//!
//! POST /api/auth/register
//! POST /api/auth/login
//! POST /api/auth/verify-otp
//! POST /api/auth/resend-otp

use axum::{extract::rejection::JsonRejection, http::StatusCode, Extension, Json};
use serde::Deserialize;

use crate::domains::gateway::{GatewayError, OtpChallenge, RegisterInput, VerifiedLogin};
use crate::kernel::ServerDeps;
use crate::server::error::{ApiError, ApiResponse};
use crate::server::middleware::ClientDevice;

/// Same body whether or not the number is registered.
pub const RESEND_OTP_MESSAGE: &str =
    "If this number is registered, a new verification code has been sent";

#[derive(Debug, Deserialize)]
pub struct PhoneRequest {
    pub phone_number: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub phone_number: String,
    pub code: String,
}

pub async fn register_handler(
    Extension(deps): Extension<ServerDeps>,
    payload: Result<Json<RegisterInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<OtpChallenge>>), ApiError> {
    let Json(input) = payload?;
    let challenge = deps.gateway.register(input).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Registration successful, verification code sent", challenge),
    ))
}

pub async fn login_handler(
    Extension(deps): Extension<ServerDeps>,
    payload: Result<Json<PhoneRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<OtpChallenge>>, ApiError> {
    let Json(input) = payload?;
    let challenge = deps.gateway.login(&input.phone_number).await?;
    Ok(ApiResponse::ok("Verification code sent", challenge))
}

pub async fn verify_otp_handler(
    Extension(deps): Extension<ServerDeps>,
    ClientDevice(device): ClientDevice,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<VerifiedLogin>>, ApiError> {
    let Json(input) = payload?;
    let login = deps
        .gateway
        .verify_otp(&input.phone_number, &input.code, device)
        .await?;
    Ok(ApiResponse::ok("Login successful", login))
}

/// Unknown numbers get the same 200 as known ones.
pub async fn resend_otp_handler(
    Extension(deps): Extension<ServerDeps>,
    payload: Result<Json<PhoneRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let Json(input) = payload?;
    match deps.gateway.resend_otp(&input.phone_number).await {
        Ok(_) | Err(GatewayError::NotFound(_)) => Ok(ApiResponse::message_only(RESEND_OTP_MESSAGE)),
        Err(e) => Err(e.into()),
    }
}

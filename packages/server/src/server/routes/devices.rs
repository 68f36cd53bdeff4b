//! Device trust for the signed-in identity.
//!
//! GET    /api/devices
//! POST   /api/devices/change
//! DELETE /api/devices/:device_identifier

use axum::{
    extract::{rejection::JsonRejection, Path},
    Extension, Json,
};
use serde::Deserialize;

use crate::domains::devices::{ChangeProof, Device};
use crate::kernel::ServerDeps;
use crate::server::error::{ApiError, ApiResponse};
use crate::server::middleware::{AuthUser, ClientDevice};

#[derive(Debug, Deserialize)]
pub struct DeviceChangeRequest {
    /// Phone number or identity id of the account
    #[serde(alias = "phone_number")]
    pub account: String,
    pub transaction_pin: String,
}

pub async fn list_devices_handler(
    Extension(deps): Extension<ServerDeps>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<Device>>>, ApiError> {
    let devices = deps.gateway.list_devices(user.identity_id).await?;
    Ok(ApiResponse::ok("Devices retrieved", devices))
}

pub async fn change_device_handler(
    Extension(deps): Extension<ServerDeps>,
    user: AuthUser,
    ClientDevice(device): ClientDevice,
    payload: Result<Json<DeviceChangeRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Device>>, ApiError> {
    let Json(input) = payload?;
    let proof = ChangeProof {
        account: input.account,
        transaction_pin: input.transaction_pin,
    };
    let device = deps
        .gateway
        .request_device_change(user.identity_id, device, proof)
        .await?;
    Ok(ApiResponse::ok("Device trusted", device))
}

pub async fn remove_device_handler(
    Extension(deps): Extension<ServerDeps>,
    user: AuthUser,
    Path(device_identifier): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    deps.gateway
        .remove_device(user.identity_id, &device_identifier)
        .await?;
    Ok(ApiResponse::message_only("Device removed"))
}

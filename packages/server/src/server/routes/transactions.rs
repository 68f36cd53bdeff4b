//! Money movement for the signed-in identity.
//!
//! POST /api/transactions/transfer
//! POST /api/transactions/deposit
//! POST /api/transactions/withdraw
//! GET  /api/transactions/history?limit=&after=

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query,
    },
    Extension, Json,
};

use crate::common::{Page, PageRequest};
use crate::domains::gateway::{DepositInput, Receipt, TransferInput, WithdrawInput};
use crate::domains::ledger::LedgerEntry;
use crate::kernel::ServerDeps;
use crate::server::error::{ApiError, ApiResponse};
use crate::server::middleware::{AuthUser, ClientDevice};

pub async fn transfer_handler(
    Extension(deps): Extension<ServerDeps>,
    user: AuthUser,
    ClientDevice(device): ClientDevice,
    payload: Result<Json<TransferInput>, JsonRejection>,
) -> Result<Json<ApiResponse<Receipt>>, ApiError> {
    let Json(input) = payload?;
    let receipt = deps
        .gateway
        .transfer(user.identity_id, &device.identifier, input)
        .await?;
    Ok(ApiResponse::ok("Money sent", receipt))
}

pub async fn deposit_handler(
    Extension(deps): Extension<ServerDeps>,
    user: AuthUser,
    payload: Result<Json<DepositInput>, JsonRejection>,
) -> Result<Json<ApiResponse<Receipt>>, ApiError> {
    let Json(input) = payload?;
    let receipt = deps.gateway.deposit(user.identity_id, input).await?;
    Ok(ApiResponse::ok("Money received", receipt))
}

pub async fn withdraw_handler(
    Extension(deps): Extension<ServerDeps>,
    user: AuthUser,
    ClientDevice(device): ClientDevice,
    payload: Result<Json<WithdrawInput>, JsonRejection>,
) -> Result<Json<ApiResponse<Receipt>>, ApiError> {
    let Json(input) = payload?;
    let receipt = deps
        .gateway
        .withdraw(user.identity_id, &device.identifier, input)
        .await?;
    Ok(ApiResponse::ok("Withdrawal complete", receipt))
}

pub async fn history_handler(
    Extension(deps): Extension<ServerDeps>,
    user: AuthUser,
    query: Result<Query<PageRequest>, QueryRejection>,
) -> Result<Json<ApiResponse<Page<LedgerEntry>>>, ApiError> {
    let Query(page) = query?;
    let history = deps.gateway.history(user.identity_id, &page).await?;
    Ok(ApiResponse::ok("Transaction history retrieved", history))
}

//! Contract HTTP handlers.
//!
//! - POST /api/v1/contracts - Seller opens a contract
//! - GET /api/v1/contracts/:id - Get contract details
//! - POST /api/v1/contracts/:id/confirm - Party confirms
//! - POST /api/v1/contracts/:id/external - Seller forfeits (off-platform sale)
//! - POST /api/v1/contracts/:id/escalate - Admin escalates to refund engine

use crate::{
    AppState,
    error::AppError,
    middleware::auth::AuthContext,
    models::contract::{Contract, CreateContractRequest, EscalateContractRequest},
    services::contracts,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Seller opens a contract against their published listing.
///
/// # Request Body
///
/// ```json
/// {
///   "listing_id": "550e8400-...",
///   "buyer_id": "660e8400-..."
/// }
/// ```
pub async fn create_contract(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateContractRequest>,
) -> Result<impl IntoResponse, AppError> {
    let contract = contracts::create_by_seller(
        &state.pool,
        auth.account_id,
        request.listing_id,
        request.buyer_id,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(contract)))
}

/// Get contract details.
///
/// Only the buyer, the seller, and admins may view a contract.
pub async fn get_contract(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<Contract>, AppError> {
    let contract = contracts::get_contract(&state.pool, contract_id).await?;

    if contract.buyer_id != auth.account_id
        && contract.seller_id != auth.account_id
        && !auth.is_admin
    {
        return Err(AppError::ContractNotFound);
    }

    Ok(Json(contract))
}

/// One party confirms the contract.
///
/// When the second party confirms, the payout executes and the listing is
/// marked SOLD in the same commit. Confirming twice as the same party fails
/// with `already_confirmed` and writes nothing.
pub async fn confirm(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<Contract>, AppError> {
    let contract = contracts::confirm(
        &state.pool,
        auth.account_id,
        contract_id,
        state.config.platform_account_id,
    )
    .await?;

    Ok(Json(contract))
}

/// Seller declares an off-platform sale, forfeiting the deposit.
pub async fn mark_external(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<Contract>, AppError> {
    let contract = contracts::mark_external(
        &state.pool,
        auth.account_id,
        contract_id,
        state.config.platform_account_id,
    )
    .await?;

    Ok(Json(contract))
}

/// Escalate an unresolvable contract to the refund engine (admin only).
pub async fn escalate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(contract_id): Path<Uuid>,
    Json(request): Json<EscalateContractRequest>,
) -> Result<Json<Contract>, AppError> {
    auth.require_admin()?;

    let contract = contracts::escalate(&state.pool, contract_id, request.reason).await?;

    Ok(Json(contract))
}

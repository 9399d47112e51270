//! Order HTTP handlers.
//!
//! - POST /api/v1/orders - Buy-now (escrow + order in one commit)
//! - GET /api/v1/orders/:id - Get order details
//! - POST /api/v1/orders/:id/decision - Seller accepts or rejects
//! - POST /api/v1/orders/:id/complete - Buyer confirms, seller paid
//! - POST /api/v1/orders/:id/cancel - Buyer cancels
//! - POST /api/v1/orders/:id/dispute - Admin fraud flag

use crate::{
    AppState,
    error::AppError,
    middleware::auth::AuthContext,
    models::order::{
        BuyNowRequest, CancelOrderRequest, DisputeRequest, Order, SellerDecisionRequest,
    },
    services::orders,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Buy a listing now.
///
/// # Request Body
///
/// ```json
/// {
///   "listing_id": "550e8400-...",
///   "note": "Can pick up this weekend"
/// }
/// ```
///
/// # Response (201)
///
/// The created order in AWAITING_SELLER, with the fee-tier deposit already
/// escrowed from the buyer's wallet.
pub async fn buy_now(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<BuyNowRequest>,
) -> Result<impl IntoResponse, AppError> {
    let order = orders::buy_now(
        &state.pool,
        auth.account_id,
        request.listing_id,
        request.note,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// Get order details.
///
/// Only the buyer, the seller, and admins may view an order.
pub async fn get_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = orders::get_order(&state.pool, order_id).await?;

    if order.buyer_id != auth.account_id && order.seller_id != auth.account_id && !auth.is_admin {
        // Same response as a missing order, so strangers cannot probe ids
        return Err(AppError::OrderNotFound);
    }

    Ok(Json(order))
}

/// Seller accepts or rejects a pending order.
///
/// # Request Body
///
/// ```json
/// {
///   "action": "ACCEPT"
/// }
/// ```
pub async fn seller_decision(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<SellerDecisionRequest>,
) -> Result<Json<Order>, AppError> {
    let order = orders::seller_confirm(
        &state.pool,
        auth.account_id,
        order_id,
        request.action,
        request.reason,
    )
    .await?;

    Ok(Json(order))
}

/// Buyer confirms the sale went through.
pub async fn complete_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = orders::complete_order(
        &state.pool,
        auth.account_id,
        order_id,
        state.config.platform_account_id,
    )
    .await?;

    Ok(Json(order))
}

/// Buyer cancels an order.
pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<CancelOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let order =
        orders::cancel_order(&state.pool, auth.account_id, order_id, request.note).await?;

    Ok(Json(order))
}

/// Flag an accepted order as fraud-suspected (admin only).
pub async fn flag_dispute(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<DisputeRequest>,
) -> Result<Json<Order>, AppError> {
    auth.require_admin()?;

    let order = orders::flag_dispute(&state.pool, order_id, request.reason).await?;

    Ok(Json(order))
}

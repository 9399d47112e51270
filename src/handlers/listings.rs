//! Listing HTTP handlers (the escrow core's slice).
//!
//! - GET /api/v1/listings/:id - Price, status and deposit of a listing
//! - POST /api/v1/listings/:id/deposit - Seller pays the publication deposit
//!
//! The rest of the listing lifecycle belongs to the listing module; the
//! deposit charge is the one listing operation here that moves money.

use crate::{
    AppState, error::AppError, middleware::auth::AuthContext, models::listing::Listing,
    services::listings,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

/// Get the core's view of a listing: price, status, deposit, expiry.
pub async fn get_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<Listing>, AppError> {
    let listing = listings::get_listing(&state.pool, listing_id).await?;

    Ok(Json(listing))
}

/// Charge the fee-tier deposit and publish the listing.
///
/// The deposit is computed from the listing price via the active fee tiers
/// and debited from the seller's wallet; the listing flips DRAFT ->
/// PUBLISHED in the same commit. Retrying replays the idempotency key.
pub async fn charge_deposit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<Listing>, AppError> {
    let listing = listings::charge_deposit(
        &state.pool,
        auth.account_id,
        listing_id,
        state.config.listing_ttl_days,
    )
    .await?;

    Ok(Json(listing))
}

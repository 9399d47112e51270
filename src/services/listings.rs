//! Listing collaborator surface.
//!
//! The listing module owns posts; this service is the slice the escrow core
//! needs: read price/status, lock a listing row inside a money-moving
//! transaction, flip its status, and charge the publication deposit (the
//! one listing-side money movement, which the fee tiers exist for).

use crate::{
    db::{DbPool, DbTx},
    error::AppError,
    models::{
        listing::{Listing, ListingStatus},
        wallet::{RelatedType, TxType},
    },
    services::{fees, wallet},
};
use chrono::{Duration, Utc};
use uuid::Uuid;

/// Fetch a listing by id.
pub async fn get_listing(pool: &DbPool, listing_id: Uuid) -> Result<Listing, AppError> {
    sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = $1")
        .bind(listing_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::ListingNotFound)
}

/// Lock a listing row for the remainder of the caller's transaction.
///
/// Every payout path locks the listing before paying against it, so two
/// flows (order completion, contract confirmation) can never both pay for
/// the same listing.
pub async fn lock_listing(tx: &mut DbTx<'_>, listing_id: Uuid) -> Result<Listing, AppError> {
    sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = $1 FOR UPDATE")
        .bind(listing_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::ListingNotFound)
}

/// Flip a listing's status within the caller's transaction.
pub async fn mark_status_in_tx(
    tx: &mut DbTx<'_>,
    listing_id: Uuid,
    status: ListingStatus,
) -> Result<(), AppError> {
    let updated = sqlx::query("UPDATE listings SET status = $1 WHERE id = $2")
        .bind(status)
        .bind(listing_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(AppError::ListingNotFound);
    }

    Ok(())
}

/// Charge the seller's publication deposit and publish the listing.
///
/// # Process
///
/// 1. Lock the listing; only the seller may pay, only from DRAFT
/// 2. Look up the fee tier for the price and compute the deposit
/// 3. Debit the seller's wallet (DEPOSIT_CHARGE, idempotent per listing)
/// 4. Stamp deposit/published/expiry and flip DRAFT -> PUBLISHED
///
/// All in one transaction: a crash cannot leave the deposit debited with
/// the listing still in DRAFT, or vice versa.
///
/// # Errors
///
/// - `Forbidden`: caller is not the listing's seller
/// - `InvalidTransition`: listing is not in DRAFT
/// - `FeeTierNotFound`: no active tier covers the price
/// - `InsufficientBalance`: propagated from the ledger
pub async fn charge_deposit(
    pool: &DbPool,
    actor_id: Uuid,
    listing_id: Uuid,
    ttl_days: i64,
) -> Result<Listing, AppError> {
    let tiers = fees::active_tiers(pool).await?;

    let mut tx = pool.begin().await?;

    let listing = lock_listing(&mut tx, listing_id).await?;

    if listing.seller_id != actor_id {
        return Err(AppError::Forbidden);
    }
    if listing.status != ListingStatus::Draft {
        return Err(AppError::InvalidTransition(format!(
            "listing is {:?}, deposit can only be charged on a draft",
            listing.status
        )));
    }

    let tier = fees::tier_for(&tiers, listing.price_vnd)
        .ok_or(AppError::FeeTierNotFound(listing.price_vnd))?;
    let deposit_vnd = fees::escrow_amount(listing.price_vnd, tier);
    if deposit_vnd <= 0 {
        return Err(AppError::InvalidRequest(
            "Listing price is too low for a deposit".to_string(),
        ));
    }

    wallet::debit_in_tx(
        &mut tx,
        listing.seller_id,
        deposit_vnd,
        TxType::DepositCharge,
        Some(RelatedType::Listing),
        Some(listing_id.to_string()),
        Some(format!("Publication deposit for \"{}\"", listing.title)),
        Some(format!("listing:{listing_id}:deposit")),
    )
    .await?;

    let now = Utc::now();
    let listing = sqlx::query_as::<_, Listing>(
        r#"
        UPDATE listings
        SET status = 'PUBLISHED',
            deposit_vnd = $1,
            published_at = $2,
            expires_at = $3
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(deposit_vnd)
    .bind(now)
    .bind(now + Duration::days(ttl_days))
    .bind(listing_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        listing = %listing_id,
        deposit = deposit_vnd,
        "listing published with deposit escrowed"
    );

    Ok(listing)
}

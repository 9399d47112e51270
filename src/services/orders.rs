//! Order state machine - buy-now escrow orchestration.
//!
//! Every transition runs in one database transaction under a `FOR UPDATE`
//! lock on the order row, with the ledger writes it triggers in the same
//! commit. Concurrent seller/buyer actions on the same order serialize on
//! that lock, so a cancel racing a complete can never double-credit or skip
//! a state.

use crate::{
    db::{DbPool, DbTx},
    error::AppError,
    models::{
        listing::ListingStatus,
        order::{Order, OrderStatus, SellerAction},
        refund::RefundScenario,
        wallet::{RelatedType, TxType},
    },
    services::{fees, listings, notifier, refunds, wallet},
};
use chrono::Utc;
use uuid::Uuid;

/// Generate a human-readable order code, e.g. `ORD-9F2C41AB`.
fn generate_order_code() -> String {
    let bytes: [u8; 4] = rand::random();
    format!("ORD-{}", hex::encode_upper(bytes))
}

/// Fetch an order by id.
pub async fn get_order(pool: &DbPool, order_id: Uuid) -> Result<Order, AppError> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::OrderNotFound)
}

/// Lock an order row for the remainder of the caller's transaction.
async fn lock_order(tx: &mut DbTx<'_>, order_id: Uuid) -> Result<Order, AppError> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::OrderNotFound)
}

/// Buy-now: escrow the deposit and open an order.
///
/// # Process
///
/// 1. Lock the listing; it must be PUBLISHED with no active order
/// 2. Compute the escrow amount from the listing price via the fee tier
/// 3. Debit the buyer (ESCROW_HOLD, idempotent per order)
/// 4. Insert the order as AWAITING_SELLER
///
/// All in one commit: a crash cannot leave money debited with no order
/// record, or an order with no escrow.
///
/// # Errors
///
/// - `ListingUnavailable`: not published, own listing, or already reserved
/// - `FeeTierNotFound`: no active tier covers the listing price
/// - `InsufficientBalance`: propagated from the ledger
pub async fn buy_now(
    pool: &DbPool,
    buyer_id: Uuid,
    listing_id: Uuid,
    note: Option<String>,
) -> Result<Order, AppError> {
    let tiers = fees::active_tiers(pool).await?;

    let mut tx = pool.begin().await?;

    let listing = listings::lock_listing(&mut tx, listing_id).await?;

    if !listing.status.is_purchasable() {
        return Err(AppError::ListingUnavailable(format!(
            "listing is {:?}",
            listing.status
        )));
    }
    if listing.seller_id == buyer_id {
        return Err(AppError::InvalidRequest(
            "Cannot buy your own listing".to_string(),
        ));
    }

    // One active order per listing; the partial unique index backs this up
    // against races the check itself cannot see
    let reserved: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM orders
            WHERE listing_id = $1
            AND status IN ('PENDING', 'AWAITING_SELLER', 'ACCEPTED', 'DISPUTE')
        )
        "#,
    )
    .bind(listing_id)
    .fetch_one(&mut *tx)
    .await?;
    if reserved {
        return Err(AppError::ListingUnavailable(
            "listing already has an active order".to_string(),
        ));
    }
    let open_contract: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM contracts WHERE listing_id = $1 AND status = 'AWAITING_CONFIRMATION')",
    )
    .bind(listing_id)
    .fetch_one(&mut *tx)
    .await?;
    if open_contract {
        return Err(AppError::ListingUnavailable(
            "listing has an open contract".to_string(),
        ));
    }

    let tier = fees::tier_for(&tiers, listing.price_vnd)
        .ok_or(AppError::FeeTierNotFound(listing.price_vnd))?;
    let amount_vnd = fees::escrow_amount(listing.price_vnd, tier);
    if amount_vnd <= 0 {
        return Err(AppError::InvalidRequest(
            "Listing price is too low to order".to_string(),
        ));
    }

    // The order id is generated up front so the escrow debit can carry a
    // deterministic idempotency key
    let order_id = Uuid::new_v4();

    wallet::debit_in_tx(
        &mut tx,
        buyer_id,
        amount_vnd,
        TxType::EscrowHold,
        Some(RelatedType::Order),
        Some(order_id.to_string()),
        Some(format!("Escrow hold for \"{}\"", listing.title)),
        Some(format!("order:{order_id}:escrow")),
    )
    .await?;

    let order = sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders (id, code, listing_id, buyer_id, seller_id, amount_vnd, status, note)
        VALUES ($1, $2, $3, $4, $5, $6, 'AWAITING_SELLER', $7)
        RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(generate_order_code())
    .bind(listing_id)
    .bind(buyer_id)
    .bind(listing.seller_id)
    .bind(amount_vnd)
    .bind(note)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(order = %order.id, code = %order.code, amount = amount_vnd, "order created, escrow held");

    notifier::spawn_emit(
        pool.clone(),
        vec![order.seller_id],
        "order.created",
        serde_json::to_value(&order).unwrap_or_default(),
    );

    Ok(order)
}

/// Seller accepts or rejects a pending order.
///
/// ACCEPT keeps the escrow held and moves to ACCEPTED. REJECT releases the
/// full escrow back to the buyer (ESCROW_RELEASE) and moves to REJECTED -
/// retrying a reject replays the idempotency key and credits exactly once.
///
/// # Errors
///
/// - `Forbidden`: caller is not the listing's seller
/// - `InvalidTransition`: order is not awaiting the seller
pub async fn seller_confirm(
    pool: &DbPool,
    actor_id: Uuid,
    order_id: Uuid,
    action: SellerAction,
    reason: Option<String>,
) -> Result<Order, AppError> {
    let mut tx = pool.begin().await?;

    let order = lock_order(&mut tx, order_id).await?;

    if order.seller_id != actor_id {
        return Err(AppError::Forbidden);
    }
    if !order.status.awaiting_seller() {
        return Err(AppError::InvalidTransition(format!(
            "order is {:?}, seller can only decide a pending order",
            order.status
        )));
    }

    let (order, event) = match action {
        SellerAction::Accept => {
            let order = sqlx::query_as::<_, Order>(
                r#"
                UPDATE orders
                SET status = 'ACCEPTED', accepted_at = NOW(), note = COALESCE($1, note)
                WHERE id = $2
                RETURNING *
                "#,
            )
            .bind(reason)
            .bind(order_id)
            .fetch_one(&mut *tx)
            .await?;
            (order, "order.accepted")
        }
        SellerAction::Reject => {
            wallet::credit_in_tx(
                &mut tx,
                order.buyer_id,
                order.amount_vnd,
                TxType::EscrowRelease,
                Some(RelatedType::Order),
                Some(order_id.to_string()),
                Some(format!("Escrow released, order {} rejected", order.code)),
                Some(format!("order:{order_id}:release")),
            )
            .await?;

            let order = sqlx::query_as::<_, Order>(
                r#"
                UPDATE orders
                SET status = 'REJECTED', closed_at = NOW(), note = COALESCE($1, note)
                WHERE id = $2
                RETURNING *
                "#,
            )
            .bind(reason)
            .bind(order_id)
            .fetch_one(&mut *tx)
            .await?;
            (order, "order.rejected")
        }
    };

    tx.commit().await?;

    tracing::info!(order = %order.id, status = ?order.status, "seller decision applied");

    notifier::spawn_emit(
        pool.clone(),
        vec![order.buyer_id],
        event,
        serde_json::to_value(&order).unwrap_or_default(),
    );

    Ok(order)
}

/// Buyer confirms the sale went through: pay the seller, close the order.
///
/// The payout is the escrow minus the tier's posting fee; the fee is posted
/// to the platform account as a FEE ledger entry so every VND of escrow is
/// accounted for. The listing row is locked and must not already be SOLD
/// (the integrity rule against a contract paying for the same listing),
/// then flipped to SOLD in the same commit.
///
/// # Errors
///
/// - `Forbidden`: caller is not the order's buyer
/// - `InvalidTransition`: order is not ACCEPTED, or listing already SOLD
pub async fn complete_order(
    pool: &DbPool,
    actor_id: Uuid,
    order_id: Uuid,
    platform_account_id: Uuid,
) -> Result<Order, AppError> {
    let tiers = fees::active_tiers(pool).await?;

    let mut tx = pool.begin().await?;

    let order = lock_order(&mut tx, order_id).await?;

    if order.buyer_id != actor_id {
        return Err(AppError::Forbidden);
    }
    if order.status != OrderStatus::Accepted {
        return Err(AppError::InvalidTransition(format!(
            "order is {:?}, only an accepted order can be completed",
            order.status
        )));
    }

    let listing = listings::lock_listing(&mut tx, order.listing_id).await?;
    if listing.status == ListingStatus::Sold {
        return Err(AppError::InvalidTransition(
            "listing was already sold through another flow".to_string(),
        ));
    }

    let tier = fees::tier_for(&tiers, listing.price_vnd)
        .ok_or(AppError::FeeTierNotFound(listing.price_vnd))?;
    // The posting fee can never exceed the escrowed amount
    let fee_vnd = tier.posting_fee_vnd.min(order.amount_vnd);
    let payout_vnd = order.amount_vnd - fee_vnd;

    if payout_vnd > 0 {
        wallet::credit_in_tx(
            &mut tx,
            order.seller_id,
            payout_vnd,
            TxType::Payout,
            Some(RelatedType::Order),
            Some(order_id.to_string()),
            Some(format!("Payout for order {}", order.code)),
            Some(format!("order:{order_id}:payout")),
        )
        .await?;
    }
    if fee_vnd > 0 {
        wallet::credit_in_tx(
            &mut tx,
            platform_account_id,
            fee_vnd,
            TxType::Fee,
            Some(RelatedType::Order),
            Some(order_id.to_string()),
            Some(format!("Posting fee for order {}", order.code)),
            Some(format!("order:{order_id}:fee")),
        )
        .await?;
    }

    listings::mark_status_in_tx(&mut tx, order.listing_id, ListingStatus::Sold).await?;

    let order = sqlx::query_as::<_, Order>(
        r#"
        UPDATE orders
        SET status = 'COMPLETED', completed_at = NOW(), closed_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(order_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(order = %order.id, payout = payout_vnd, fee = fee_vnd, "order completed, listing sold");

    notifier::spawn_emit(
        pool.clone(),
        vec![order.seller_id],
        "order.completed",
        serde_json::to_value(&order).unwrap_or_default(),
    );

    Ok(order)
}

/// Buyer cancels an order.
///
/// Before the seller accepted, the full escrow is released and the order is
/// CANCELLED outright. After acceptance, a partial-rate policy may apply,
/// so the cancellation routes through the refund engine: the order is
/// CANCELLED and a refund case is opened for the escrow; the money moves
/// only when the case is decided.
///
/// # Errors
///
/// - `Forbidden`: caller is not the order's buyer
/// - `InvalidTransition`: order already terminal or in dispute
/// - `PolicyNotConfigured`: post-acceptance cancel without an active policy
pub async fn cancel_order(
    pool: &DbPool,
    actor_id: Uuid,
    order_id: Uuid,
    note: Option<String>,
) -> Result<Order, AppError> {
    let mut tx = pool.begin().await?;

    let order = lock_order(&mut tx, order_id).await?;

    if order.buyer_id != actor_id {
        return Err(AppError::Forbidden);
    }

    let order = if order.status.awaiting_seller() {
        // Not yet accepted: full refund, no policy involved
        wallet::credit_in_tx(
            &mut tx,
            order.buyer_id,
            order.amount_vnd,
            TxType::EscrowRelease,
            Some(RelatedType::Order),
            Some(order_id.to_string()),
            Some(format!("Escrow released, order {} cancelled", order.code)),
            Some(format!("order:{order_id}:release")),
        )
        .await?;

        sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = 'CANCELLED', closed_at = NOW(), note = COALESCE($1, note)
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(note)
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await?
    } else if order.status == OrderStatus::Accepted {
        // Accepted: the refund engine decides how much comes back
        let policy = refunds::active_policy_in_tx(&mut tx).await?;
        let scenario =
            refunds::classify_cancellation(order.created_at, Utc::now(), policy.hold_days);

        refunds::create_case_in_tx(
            &mut tx,
            order.listing_id,
            Some(order.id),
            order.buyer_id,
            scenario,
            policy.rate_for(scenario),
            order.amount_vnd,
            note.clone().or(Some("Buyer cancelled after acceptance".to_string())),
        )
        .await?;

        sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = 'CANCELLED', closed_at = NOW(), note = COALESCE($1, note)
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(note)
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await?
    } else {
        return Err(AppError::InvalidTransition(format!(
            "order is {:?} and can no longer be cancelled",
            order.status
        )));
    };

    tx.commit().await?;

    tracing::info!(order = %order.id, "order cancelled");

    notifier::spawn_emit(
        pool.clone(),
        vec![order.seller_id],
        "order.cancelled",
        serde_json::to_value(&order).unwrap_or_default(),
    );

    Ok(order)
}

/// Admin flags an accepted order as fraud-suspected.
///
/// The order moves to DISPUTE (still holding escrow) and a FRAUD_SUSPECTED
/// refund case is opened for the buyer. Fraud cases are never auto-approved;
/// when an admin approves the case, the dispute closes to CANCELLED.
pub async fn flag_dispute(
    pool: &DbPool,
    order_id: Uuid,
    reason: String,
) -> Result<Order, AppError> {
    let mut tx = pool.begin().await?;

    let order = lock_order(&mut tx, order_id).await?;

    if order.status != OrderStatus::Accepted {
        return Err(AppError::InvalidTransition(format!(
            "order is {:?}, only an accepted order can be disputed",
            order.status
        )));
    }

    let policy = refunds::active_policy_in_tx(&mut tx).await?;

    refunds::create_case_in_tx(
        &mut tx,
        order.listing_id,
        Some(order.id),
        order.buyer_id,
        RefundScenario::FraudSuspected,
        policy.rate_for(RefundScenario::FraudSuspected),
        order.amount_vnd,
        Some(reason.clone()),
    )
    .await?;

    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = 'DISPUTE', note = $1 WHERE id = $2 RETURNING *",
    )
    .bind(reason)
    .bind(order_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::warn!(order = %order.id, "order flagged as fraud-suspected");

    notifier::spawn_emit(
        pool.clone(),
        vec![order.buyer_id, order.seller_id],
        "order.disputed",
        serde_json::to_value(&order).unwrap_or_default(),
    );

    Ok(order)
}

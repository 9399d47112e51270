//! Contract confirmation flow - dual-party sign-off for in-person sales.
//!
//! A seller opens a contract against their published listing naming the
//! buyer; the deal finalizes only when both parties independently confirm.
//! The second confirmation is the single commit point: it sets
//! `confirmed_at`, pays the deposit out (minus commission) and marks the
//! listing SOLD, all in one database transaction.

use crate::{
    db::{DbPool, DbTx},
    error::AppError,
    models::{
        contract::{Contract, ContractStatus},
        listing::ListingStatus,
        wallet::{RelatedType, TxType},
    },
    services::{fees, listings, notifier, refunds, wallet},
};
use chrono::Utc;
use uuid::Uuid;

/// Fetch a contract by id.
pub async fn get_contract(pool: &DbPool, contract_id: Uuid) -> Result<Contract, AppError> {
    sqlx::query_as::<_, Contract>("SELECT * FROM contracts WHERE id = $1")
        .bind(contract_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::ContractNotFound)
}

/// Lock a contract row for the remainder of the caller's transaction.
async fn lock_contract(tx: &mut DbTx<'_>, contract_id: Uuid) -> Result<Contract, AppError> {
    sqlx::query_as::<_, Contract>("SELECT * FROM contracts WHERE id = $1 FOR UPDATE")
        .bind(contract_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::ContractNotFound)
}

/// Seller opens a contract against their published listing.
///
/// The listing is frozen into `listing_snapshot` so later edits cannot
/// change what the parties agreed on; the commission rate is snapshotted
/// from the listing's fee tier. Creation is mutually exclusive with the
/// buy-now path: a listing with an active order cannot get a contract, and
/// vice versa.
///
/// # Errors
///
/// - `Forbidden`: caller is not the listing's seller
/// - `ListingUnavailable`: not published, active order, or open contract
/// - `AccountNotFound`: the named buyer does not exist
pub async fn create_by_seller(
    pool: &DbPool,
    actor_id: Uuid,
    listing_id: Uuid,
    buyer_id: Uuid,
) -> Result<Contract, AppError> {
    let tiers = fees::active_tiers(pool).await?;

    let mut tx = pool.begin().await?;

    let listing = listings::lock_listing(&mut tx, listing_id).await?;

    if listing.seller_id != actor_id {
        return Err(AppError::Forbidden);
    }
    if !listing.status.is_purchasable() {
        return Err(AppError::ListingUnavailable(format!(
            "listing is {:?}",
            listing.status
        )));
    }
    if listing.deposit_vnd <= 0 {
        return Err(AppError::InvalidRequest(
            "Listing has no deposit in escrow".to_string(),
        ));
    }
    if buyer_id == listing.seller_id {
        return Err(AppError::InvalidRequest(
            "Buyer and seller cannot be the same account".to_string(),
        ));
    }

    let buyer_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM accounts WHERE id = $1 AND is_active = true)",
    )
    .bind(buyer_id)
    .fetch_one(&mut *tx)
    .await?;
    if !buyer_exists {
        return Err(AppError::AccountNotFound);
    }

    // Mutual exclusion with the order path
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
            "listing has an active order".to_string(),
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
            "listing already has an open contract".to_string(),
        ));
    }

    let tier = fees::tier_for(&tiers, listing.price_vnd)
        .ok_or(AppError::FeeTierNotFound(listing.price_vnd))?;

    let snapshot = serde_json::to_value(&listing)
        .map_err(|e| AppError::InvalidRequest(format!("Failed to snapshot listing: {e}")))?;

    let contract = sqlx::query_as::<_, Contract>(
        r#"
        INSERT INTO contracts (
            listing_id, buyer_id, seller_id, status,
            is_external_transaction, listing_snapshot, fee_rate_percent
        )
        VALUES ($1, $2, $3, 'AWAITING_CONFIRMATION', true, $4, $5)
        RETURNING *
        "#,
    )
    .bind(listing_id)
    .bind(buyer_id)
    .bind(listing.seller_id)
    .bind(snapshot)
    .bind(tier.deposit_rate_percent)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(contract = %contract.id, listing = %listing_id, "contract opened");

    notifier::spawn_emit(
        pool.clone(),
        vec![buyer_id],
        "contract.created",
        serde_json::to_value(&contract).unwrap_or_default(),
    );

    Ok(contract)
}

/// One party confirms the contract.
///
/// Each party confirms exactly once; a second confirmation by the same
/// party fails with `AlreadyConfirmed` and writes nothing. When the second
/// party's confirmation lands, in the same transaction: `confirmed_at` is
/// set (exactly once), status flips to SUCCESS, the seller is credited the
/// deposit minus commission, the commission is posted to the platform
/// account, and the listing is marked SOLD under the listing-row lock.
///
/// # Errors
///
/// - `Forbidden`: actor is neither buyer nor seller on the contract
/// - `AlreadyConfirmed`: the same actor confirmed before
/// - `InvalidTransition`: contract is no longer awaiting confirmation, or
///   the listing was already sold through another flow
pub async fn confirm(
    pool: &DbPool,
    actor_id: Uuid,
    contract_id: Uuid,
    platform_account_id: Uuid,
) -> Result<Contract, AppError> {
    let mut tx = pool.begin().await?;

    let contract = lock_contract(&mut tx, contract_id).await?;

    if contract.status != ContractStatus::AwaitingConfirmation {
        return Err(AppError::InvalidTransition(format!(
            "contract is {:?}",
            contract.status
        )));
    }

    let now = Utc::now();
    let (buyer_confirmed_at, seller_confirmed_at) = if actor_id == contract.buyer_id {
        if contract.buyer_confirmed_at.is_some() {
            return Err(AppError::AlreadyConfirmed);
        }
        (Some(now), contract.seller_confirmed_at)
    } else if actor_id == contract.seller_id {
        if contract.seller_confirmed_at.is_some() {
            return Err(AppError::AlreadyConfirmed);
        }
        (contract.buyer_confirmed_at, Some(now))
    } else {
        return Err(AppError::Forbidden);
    };

    let both_confirmed = buyer_confirmed_at.is_some() && seller_confirmed_at.is_some();

    let contract = if both_confirmed {
        // The commit point: payout and listing flip ride the same transaction
        let listing = listings::lock_listing(&mut tx, contract.listing_id).await?;
        if listing.status == ListingStatus::Sold {
            return Err(AppError::InvalidTransition(
                "listing was already sold through another flow".to_string(),
            ));
        }

        let deposit_vnd = listing.deposit_vnd;
        let commission_vnd = deposit_vnd * contract.fee_rate_percent as i64 / 100;
        let payout_vnd = deposit_vnd - commission_vnd;

        if payout_vnd > 0 {
            wallet::credit_in_tx(
                &mut tx,
                contract.seller_id,
                payout_vnd,
                TxType::Payout,
                Some(RelatedType::Contract),
                Some(contract_id.to_string()),
                Some("Deposit returned on confirmed sale".to_string()),
                Some(format!("contract:{contract_id}:payout")),
            )
            .await?;
        }
        if commission_vnd > 0 {
            wallet::credit_in_tx(
                &mut tx,
                platform_account_id,
                commission_vnd,
                TxType::Fee,
                Some(RelatedType::Contract),
                Some(contract_id.to_string()),
                Some("Commission on confirmed sale".to_string()),
                Some(format!("contract:{contract_id}:commission")),
            )
            .await?;
        }

        listings::mark_status_in_tx(&mut tx, contract.listing_id, ListingStatus::Sold).await?;

        sqlx::query_as::<_, Contract>(
            r#"
            UPDATE contracts
            SET buyer_confirmed_at = $1,
                seller_confirmed_at = $2,
                confirmed_at = $3,
                status = 'SUCCESS'
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(buyer_confirmed_at)
        .bind(seller_confirmed_at)
        .bind(now)
        .bind(contract_id)
        .fetch_one(&mut *tx)
        .await?
    } else {
        sqlx::query_as::<_, Contract>(
            r#"
            UPDATE contracts
            SET buyer_confirmed_at = $1,
                seller_confirmed_at = $2
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(buyer_confirmed_at)
        .bind(seller_confirmed_at)
        .bind(contract_id)
        .fetch_one(&mut *tx)
        .await?
    };

    tx.commit().await?;

    tracing::info!(
        contract = %contract.id,
        status = ?contract.status,
        "contract confirmation recorded"
    );

    if both_confirmed {
        notifier::spawn_emit(
            pool.clone(),
            vec![contract.buyer_id, contract.seller_id],
            "contract.confirmed",
            serde_json::to_value(&contract).unwrap_or_default(),
        );
    }

    Ok(contract)
}

/// Seller declares the sale happened off-platform without buyer
/// confirmation, forfeiting the deposit.
///
/// The whole deposit is posted to the platform account and the listing is
/// delisted. Not available once the buyer has confirmed - at that point the
/// dual-confirmation path should finish instead.
pub async fn mark_external(
    pool: &DbPool,
    actor_id: Uuid,
    contract_id: Uuid,
    platform_account_id: Uuid,
) -> Result<Contract, AppError> {
    let mut tx = pool.begin().await?;

    let contract = lock_contract(&mut tx, contract_id).await?;

    if contract.seller_id != actor_id {
        return Err(AppError::Forbidden);
    }
    if contract.status != ContractStatus::AwaitingConfirmation {
        return Err(AppError::InvalidTransition(format!(
            "contract is {:?}",
            contract.status
        )));
    }
    if contract.buyer_confirmed_at.is_some() {
        return Err(AppError::InvalidTransition(
            "buyer already confirmed; complete the confirmation instead".to_string(),
        ));
    }

    let listing = listings::lock_listing(&mut tx, contract.listing_id).await?;

    if listing.deposit_vnd > 0 {
        wallet::credit_in_tx(
            &mut tx,
            platform_account_id,
            listing.deposit_vnd,
            TxType::Fee,
            Some(RelatedType::Contract),
            Some(contract_id.to_string()),
            Some("Deposit forfeited on external sale".to_string()),
            Some(format!("contract:{contract_id}:forfeit")),
        )
        .await?;
    }

    listings::mark_status_in_tx(&mut tx, contract.listing_id, ListingStatus::Delisted).await?;

    let contract = sqlx::query_as::<_, Contract>(
        "UPDATE contracts SET status = 'FORFEITED_EXTERNAL' WHERE id = $1 RETURNING *",
    )
    .bind(contract_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(contract = %contract.id, "deposit forfeited, sale marked external");

    notifier::spawn_emit(
        pool.clone(),
        vec![contract.buyer_id],
        "contract.forfeited",
        serde_json::to_value(&contract).unwrap_or_default(),
    );

    Ok(contract)
}

/// Admin escalates an unresolvable contract to the refund engine.
///
/// The contract moves to PENDING_REFUND and a deposit-refund case is opened
/// for the seller, classified by the listing's publish/expiry timing. The
/// case then goes through the normal admin decision.
pub async fn escalate(
    pool: &DbPool,
    contract_id: Uuid,
    reason: String,
) -> Result<Contract, AppError> {
    let mut tx = pool.begin().await?;

    let contract = lock_contract(&mut tx, contract_id).await?;

    if contract.status != ContractStatus::AwaitingConfirmation {
        return Err(AppError::InvalidTransition(format!(
            "contract is {:?}",
            contract.status
        )));
    }

    let policy = refunds::active_policy_in_tx(&mut tx).await?;
    let listing = listings::lock_listing(&mut tx, contract.listing_id).await?;

    if listing.deposit_vnd <= 0 {
        return Err(AppError::InvalidRequest(
            "Listing has no deposit to refund".to_string(),
        ));
    }

    let scenario = refunds::classify_scenario(
        listing.published_at.unwrap_or(listing.created_at),
        listing.expires_at,
        Utc::now(),
        false,
        policy.hold_days,
    );

    refunds::create_case_in_tx(
        &mut tx,
        contract.listing_id,
        None,
        contract.seller_id,
        scenario,
        policy.rate_for(scenario),
        listing.deposit_vnd,
        Some(reason),
    )
    .await?;

    let contract = sqlx::query_as::<_, Contract>(
        "UPDATE contracts SET status = 'PENDING_REFUND' WHERE id = $1 RETURNING *",
    )
    .bind(contract_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(contract = %contract.id, "contract escalated to refund engine");

    Ok(contract)
}

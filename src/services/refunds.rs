//! Refund decision engine.
//!
//! Scenario classification and rate arithmetic are pure functions; case
//! creation and decision are database operations. A case is decided exactly
//! once: the decide operation locks the case row, refuses anything but
//! PENDING, and executes the refund credit with the case id as idempotency
//! key, so even a replayed approval can only move money once.

use crate::{
    db::{DbPool, DbTx},
    error::AppError,
    models::{
        order::OrderStatus,
        refund::{RefundCase, RefundCaseStatus, RefundDecision, RefundPolicy, RefundScenario},
        wallet::{RelatedType, TxType},
    },
    services::{notifier, wallet},
};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Classify a cancellation by its timing relative to the escrow instant.
///
/// CANCEL_EARLY before `hold_days` have elapsed, CANCEL_LATE after. Pure.
pub fn classify_cancellation(
    escrowed_at: DateTime<Utc>,
    now: DateTime<Utc>,
    hold_days: i32,
) -> RefundScenario {
    if now < escrowed_at + Duration::days(hold_days as i64) {
        RefundScenario::CancelEarly
    } else {
        RefundScenario::CancelLate
    }
}

/// Full scenario classification for a listing/order pair. Pure.
///
/// Fraud wins over everything (it is set externally, not derived from
/// timing); a passed hard expiry classifies as EXPIRED; otherwise the
/// cancellation timing decides early vs late.
pub fn classify_scenario(
    escrowed_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    fraud_flagged: bool,
    hold_days: i32,
) -> RefundScenario {
    if fraud_flagged {
        return RefundScenario::FraudSuspected;
    }
    if let Some(expiry) = expires_at {
        if now >= expiry {
            return RefundScenario::Expired;
        }
    }
    classify_cancellation(escrowed_at, now, hold_days)
}

/// `amount_refund = amount_original * rate / 100`, rounded down to the
/// smallest currency unit. The remainder is retained as platform fee and is
/// never credited to the seller in the refund path.
pub fn compute_refund_amount(
    amount_original_vnd: i64,
    scenario: RefundScenario,
    policy: &RefundPolicy,
) -> i64 {
    apply_rate(amount_original_vnd, policy.rate_for(scenario))
}

fn apply_rate(amount_vnd: i64, rate_percent: i32) -> i64 {
    amount_vnd * rate_percent as i64 / 100
}

/// Load the single active refund policy.
pub async fn active_policy(pool: &DbPool) -> Result<RefundPolicy, AppError> {
    sqlx::query_as::<_, RefundPolicy>("SELECT * FROM refund_policies WHERE is_active = true")
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::PolicyNotConfigured)
}

/// Load the active policy within the caller's transaction.
pub async fn active_policy_in_tx(tx: &mut DbTx<'_>) -> Result<RefundPolicy, AppError> {
    sqlx::query_as::<_, RefundPolicy>("SELECT * FROM refund_policies WHERE is_active = true")
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::PolicyNotConfigured)
}

/// Fetch a refund case by id.
pub async fn get_case(pool: &DbPool, case_id: Uuid) -> Result<RefundCase, AppError> {
    sqlx::query_as::<_, RefundCase>("SELECT * FROM refund_cases WHERE id = $1")
        .bind(case_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::RefundCaseNotFound)
}

/// Persist a PENDING refund case. Moves no money.
#[allow(clippy::too_many_arguments)]
pub async fn create_case_in_tx(
    tx: &mut DbTx<'_>,
    listing_id: Uuid,
    order_id: Option<Uuid>,
    account_id: Uuid,
    scenario: RefundScenario,
    rate_percent: i32,
    amount_original_vnd: i64,
    reason: Option<String>,
) -> Result<RefundCase, AppError> {
    let case = sqlx::query_as::<_, RefundCase>(
        r#"
        INSERT INTO refund_cases (
            listing_id,
            order_id,
            account_id,
            scenario,
            policy_rate_percent,
            amount_original_vnd,
            amount_refund_vnd,
            status,
            reason
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'PENDING', $8)
        RETURNING *
        "#,
    )
    .bind(listing_id)
    .bind(order_id)
    .bind(account_id)
    .bind(scenario)
    .bind(rate_percent)
    .bind(amount_original_vnd)
    .bind(apply_rate(amount_original_vnd, rate_percent))
    .bind(reason)
    .fetch_one(&mut **tx)
    .await?;

    tracing::info!(
        case = %case.id,
        listing = %listing_id,
        ?scenario,
        amount = amount_original_vnd,
        refund = case.amount_refund_vnd,
        "refund case created"
    );

    Ok(case)
}

/// Persist a PENDING refund case in its own transaction (manual admin path).
pub async fn create_case(
    pool: &DbPool,
    listing_id: Uuid,
    order_id: Option<Uuid>,
    account_id: Uuid,
    scenario: RefundScenario,
    amount_original_vnd: i64,
    reason: Option<String>,
) -> Result<RefundCase, AppError> {
    if amount_original_vnd <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }

    let policy = active_policy(pool).await?;

    let mut tx = pool.begin().await?;
    let case = create_case_in_tx(
        &mut tx,
        listing_id,
        order_id,
        account_id,
        scenario,
        policy.rate_for(scenario),
        amount_original_vnd,
        reason,
    )
    .await?;
    tx.commit().await?;

    Ok(case)
}

/// Decide a pending refund case. Decisions are final.
///
/// # Approve
///
/// Credits the case's account (REFUND, idempotency key `refund:{case_id}`),
/// posts the retained remainder to the platform account as a FEE entry,
/// stores the wallet transaction link and stamps REFUNDED - one commit.
/// `override_percent` replaces the stored policy rate before computing.
/// If the account's wallet is missing the case is committed as FAILED
/// instead.
///
/// # Reject
///
/// Stamps REJECTED; no ledger effect.
///
/// # Errors
///
/// - `AlreadyDecided`: case is not PENDING
/// - `InvalidRequest`: override percent outside 0..=100
pub async fn decide(
    pool: &DbPool,
    case_id: Uuid,
    decision: RefundDecision,
    admin_note: Option<String>,
    override_percent: Option<i32>,
    platform_account_id: Uuid,
) -> Result<RefundCase, AppError> {
    if let Some(pct) = override_percent {
        if !(0..=100).contains(&pct) {
            return Err(AppError::InvalidRequest(
                "Override percent must be between 0 and 100".to_string(),
            ));
        }
    }

    let mut tx = pool.begin().await?;

    let case = sqlx::query_as::<_, RefundCase>(
        "SELECT * FROM refund_cases WHERE id = $1 FOR UPDATE",
    )
    .bind(case_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::RefundCaseNotFound)?;

    if case.status != RefundCaseStatus::Pending {
        return Err(AppError::AlreadyDecided);
    }

    let case = match decision {
        RefundDecision::Reject => {
            sqlx::query_as::<_, RefundCase>(
                r#"
                UPDATE refund_cases
                SET status = 'REJECTED', admin_note = $1
                WHERE id = $2
                RETURNING *
                "#,
            )
            .bind(admin_note)
            .bind(case_id)
            .fetch_one(&mut *tx)
            .await?
        }
        RefundDecision::Approve => {
            let rate_percent = override_percent.unwrap_or(case.policy_rate_percent);
            let amount_refund_vnd = apply_rate(case.amount_original_vnd, rate_percent);
            let remainder_vnd = case.amount_original_vnd - amount_refund_vnd;

            let credit = if amount_refund_vnd > 0 {
                match wallet::credit_in_tx(
                    &mut tx,
                    case.account_id,
                    amount_refund_vnd,
                    TxType::Refund,
                    Some(RelatedType::RefundCase),
                    Some(case_id.to_string()),
                    Some(format!("Refund ({:?})", case.scenario)),
                    Some(format!("refund:{case_id}")),
                )
                .await
                {
                    Ok(entry) => Some(entry),
                    Err(AppError::AccountNotFound) => {
                        // No wallet to credit: record the failure and keep
                        // the case terminal
                        let failed = sqlx::query_as::<_, RefundCase>(
                            r#"
                            UPDATE refund_cases
                            SET status = 'FAILED', admin_note = $1
                            WHERE id = $2
                            RETURNING *
                            "#,
                        )
                        .bind(admin_note)
                        .bind(case_id)
                        .fetch_one(&mut *tx)
                        .await?;
                        tx.commit().await?;
                        tracing::error!(case = %case_id, "refund credit failed, no wallet");
                        return Ok(failed);
                    }
                    Err(e) => return Err(e),
                }
            } else {
                None
            };

            if remainder_vnd > 0 {
                wallet::credit_in_tx(
                    &mut tx,
                    platform_account_id,
                    remainder_vnd,
                    TxType::Fee,
                    Some(RelatedType::RefundCase),
                    Some(case_id.to_string()),
                    Some(format!("Retained remainder ({:?})", case.scenario)),
                    Some(format!("refund:{case_id}:fee")),
                )
                .await?;
            }

            // A refunded fraud dispute closes the order it came from
            if let Some(order_id) = case.order_id {
                sqlx::query(
                    "UPDATE orders SET status = 'CANCELLED', closed_at = NOW() WHERE id = $1 AND status = $2",
                )
                .bind(order_id)
                .bind(OrderStatus::Dispute)
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query_as::<_, RefundCase>(
                r#"
                UPDATE refund_cases
                SET status = 'REFUNDED',
                    policy_rate_percent = $1,
                    amount_refund_vnd = $2,
                    wallet_transaction_id = $3,
                    admin_note = $4,
                    refunded_at = NOW()
                WHERE id = $5
                RETURNING *
                "#,
            )
            .bind(rate_percent)
            .bind(amount_refund_vnd)
            .bind(credit.map(|c| c.id))
            .bind(admin_note)
            .bind(case_id)
            .fetch_one(&mut *tx)
            .await?
        }
    };

    tx.commit().await?;

    tracing::info!(case = %case.id, status = ?case.status, "refund case decided");

    let event = match case.status {
        RefundCaseStatus::Refunded => "refund.approved",
        _ => "refund.rejected",
    };
    notifier::spawn_emit(
        pool.clone(),
        vec![case.account_id],
        event,
        serde_json::to_value(&case).unwrap_or_default(),
    );

    Ok(case)
}

/// One sweep of the automatic refund path.
///
/// Finds PUBLISHED listings whose expiry passed more than
/// `auto_refund_after_days` ago with no active or completed order and no
/// open contract, marks them EXPIRED, opens an EXPIRED deposit-refund case
/// for the seller and auto-approves it. Safe to re-run: case creation is
/// guarded per (listing, scenario) and the refund credit is idempotent.
pub async fn run_scan(
    pool: &DbPool,
    platform_account_id: Uuid,
) -> Result<(Vec<Uuid>, usize), AppError> {
    let policy = active_policy(pool).await?;

    let candidates: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT l.id FROM listings l
        WHERE l.status = 'PUBLISHED'
          AND l.deposit_vnd > 0
          AND l.expires_at IS NOT NULL
          AND l.expires_at + make_interval(days => $1) < NOW()
          AND NOT EXISTS (
              SELECT 1 FROM orders o
              WHERE o.listing_id = l.id
              AND o.status IN ('PENDING', 'AWAITING_SELLER', 'ACCEPTED', 'DISPUTE', 'COMPLETED')
          )
          AND NOT EXISTS (
              SELECT 1 FROM contracts c
              WHERE c.listing_id = l.id AND c.status = 'AWAITING_CONFIRMATION'
          )
        "#,
    )
    .bind(policy.auto_refund_after_days)
    .fetch_all(pool)
    .await?;

    let mut created = Vec::new();
    let mut refunded = 0;

    for listing_id in candidates {
        let case_id = match open_expired_case(pool, listing_id, &policy).await {
            Ok(Some(id)) => id,
            Ok(None) => continue, // raced by another sweep, nothing to do
            Err(e) => {
                tracing::error!(listing = %listing_id, "scan failed to open case: {e}");
                continue;
            }
        };
        created.push(case_id);

        // The scenario here is always EXPIRED, never FRAUD_SUSPECTED, so
        // auto-approval without human review is allowed
        match decide(
            pool,
            case_id,
            RefundDecision::Approve,
            Some("Auto-refund: listing expired".to_string()),
            None,
            platform_account_id,
        )
        .await
        {
            Ok(case) if case.status == RefundCaseStatus::Refunded => refunded += 1,
            Ok(_) => {}
            Err(e) => tracing::error!(case = %case_id, "auto-refund failed: {e}"),
        }
    }

    tracing::info!(created = created.len(), refunded, "refund scan complete");

    Ok((created, refunded))
}

/// Mark one expired listing and open its deposit-refund case.
///
/// Returns None when another sweep already handled the listing.
async fn open_expired_case(
    pool: &DbPool,
    listing_id: Uuid,
    policy: &RefundPolicy,
) -> Result<Option<Uuid>, AppError> {
    let mut tx = pool.begin().await?;

    let listing = crate::services::listings::lock_listing(&mut tx, listing_id).await?;
    if listing.status != crate::models::listing::ListingStatus::Published {
        return Ok(None);
    }

    let already_handled: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM refund_cases
            WHERE listing_id = $1 AND scenario = 'EXPIRED'
            AND status IN ('PENDING', 'REFUNDED')
        )
        "#,
    )
    .bind(listing_id)
    .fetch_one(&mut *tx)
    .await?;
    if already_handled {
        return Ok(None);
    }

    let case = create_case_in_tx(
        &mut tx,
        listing_id,
        None,
        listing.seller_id,
        RefundScenario::Expired,
        policy.rate_for(RefundScenario::Expired),
        listing.deposit_vnd,
        Some("Listing expired without a sale".to_string()),
    )
    .await?;

    crate::services::listings::mark_status_in_tx(
        &mut tx,
        listing_id,
        crate::models::listing::ListingStatus::Expired,
    )
    .await?;

    tx.commit().await?;

    Ok(Some(case.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn policy(early: i32, late: i32, expired: i32, fraud: i32, hold_days: i32) -> RefundPolicy {
        RefundPolicy {
            id: Uuid::new_v4(),
            cancel_early_rate_percent: early,
            cancel_late_rate_percent: late,
            expired_rate_percent: expired,
            fraud_suspected_rate_percent: fraud,
            hold_days,
            auto_refund_after_days: 7,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).unwrap()
    }

    // classify_cancellation

    #[test]
    fn cancellation_before_hold_period_is_early() {
        assert_eq!(
            classify_cancellation(at(1), at(3), 7),
            RefundScenario::CancelEarly
        );
    }

    #[test]
    fn cancellation_after_hold_period_is_late() {
        assert_eq!(
            classify_cancellation(at(1), at(9), 7),
            RefundScenario::CancelLate
        );
    }

    #[test]
    fn cancellation_exactly_at_hold_boundary_is_late() {
        assert_eq!(
            classify_cancellation(at(1), at(8), 7),
            RefundScenario::CancelLate
        );
    }

    // classify_scenario

    #[test]
    fn fraud_flag_wins_over_timing() {
        assert_eq!(
            classify_scenario(at(1), Some(at(30)), at(2), true, 7),
            RefundScenario::FraudSuspected
        );
    }

    #[test]
    fn passed_expiry_classifies_as_expired() {
        assert_eq!(
            classify_scenario(at(1), Some(at(10)), at(15), false, 7),
            RefundScenario::Expired
        );
    }

    #[test]
    fn before_expiry_falls_back_to_cancellation_timing() {
        assert_eq!(
            classify_scenario(at(1), Some(at(30)), at(2), false, 7),
            RefundScenario::CancelEarly
        );
        assert_eq!(
            classify_scenario(at(1), Some(at(30)), at(20), false, 7),
            RefundScenario::CancelLate
        );
    }

    #[test]
    fn no_expiry_never_classifies_as_expired() {
        assert_eq!(
            classify_scenario(at(1), None, at(25), false, 7),
            RefundScenario::CancelLate
        );
    }

    // compute_refund_amount

    #[test]
    fn refund_amount_applies_scenario_rate() {
        let p = policy(80, 50, 90, 100, 7);
        assert_eq!(
            compute_refund_amount(100_000, RefundScenario::CancelEarly, &p),
            80_000
        );
        assert_eq!(
            compute_refund_amount(100_000, RefundScenario::CancelLate, &p),
            50_000
        );
        assert_eq!(
            compute_refund_amount(100_000, RefundScenario::Expired, &p),
            90_000
        );
        assert_eq!(
            compute_refund_amount(100_000, RefundScenario::FraudSuspected, &p),
            100_000
        );
    }

    #[test]
    fn refund_amount_rounds_down() {
        let p = policy(80, 50, 90, 100, 7);
        // 80% of 99 VND = 79.2, truncated to 79
        assert_eq!(
            compute_refund_amount(99, RefundScenario::CancelEarly, &p),
            79
        );
    }

    #[test]
    fn zero_rate_refunds_nothing() {
        let p = policy(0, 0, 0, 0, 7);
        assert_eq!(
            compute_refund_amount(500_000, RefundScenario::CancelEarly, &p),
            0
        );
    }
}

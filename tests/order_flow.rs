//! End-to-end order flow tests: escrow, seller decision, completion,
//! cancellation, and the ledger invariants behind them.

mod common;

use common::*;
use voltmarket::error::AppError;
use voltmarket::models::order::{OrderStatus, SellerAction};
use voltmarket::models::wallet::TxType;
use voltmarket::services::{orders, wallet};

/// Buyer buys a 10,000,000 VND listing on a 5% deposit tier: buy-now debits
/// 500,000, seller accepts, buyer completes, seller is credited 500,000
/// minus the 50,000 posting fee, the fee lands on the platform account and
/// the listing is marked SOLD.
#[sqlx::test]
async fn buy_now_happy_path_to_completion(pool: sqlx::PgPool) {
    let platform = create_account(&pool, "platform").await;
    let seller = create_account(&pool, "seller").await;
    let buyer = create_account(&pool, "buyer").await;
    seed_fee_tier(&pool, 5, 50_000).await;

    let listing = insert_published_listing(&pool, seller, 10_000_000, 500_000).await;
    topup(&pool, buyer, 1_000_000).await;

    let order = orders::buy_now(&pool, buyer, listing, Some("weekend pickup".into()))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::AwaitingSeller);
    assert_eq!(order.amount_vnd, 500_000);
    assert!(order.code.starts_with("ORD-"));
    assert_eq!(balance(&pool, buyer).await, 500_000);

    let order = orders::seller_confirm(&pool, seller, order.id, SellerAction::Accept, None)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Accepted);
    // Accepting moves no money
    assert_eq!(balance(&pool, buyer).await, 500_000);
    assert_eq!(balance(&pool, seller).await, 0);

    let order = orders::complete_order(&pool, buyer, order.id, platform)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert!(order.completed_at.is_some());

    assert_eq!(balance(&pool, seller).await, 450_000);
    assert_eq!(balance(&pool, platform).await, 50_000);
    assert_eq!(listing_status(&pool, listing).await, "SOLD");

    // Every wallet the flow touched still satisfies the ledger invariant
    for account in [buyer, seller, platform] {
        wallet::audit(&pool, account).await.unwrap();
    }
}

/// Cancelling before the seller accepts refunds the full escrow; the seller
/// side of the ledger stays empty.
#[sqlx::test]
async fn cancel_before_accept_fully_refunds(pool: sqlx::PgPool) {
    let seller = create_account(&pool, "seller").await;
    let buyer = create_account(&pool, "buyer").await;
    seed_fee_tier(&pool, 5, 50_000).await;

    let listing = insert_published_listing(&pool, seller, 10_000_000, 500_000).await;
    topup(&pool, buyer, 500_000).await;

    let order = orders::buy_now(&pool, buyer, listing, None).await.unwrap();
    assert_eq!(balance(&pool, buyer).await, 0);

    let order = orders::cancel_order(&pool, buyer, order.id, Some("changed my mind".into()))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(balance(&pool, buyer).await, 500_000);
    assert_eq!(ledger_count(&pool, seller).await, 0);
    wallet::audit(&pool, buyer).await.unwrap();
}

/// A rejected order credits the buyer exactly once, even when the release
/// is replayed with the same idempotency key (simulating a retry).
#[sqlx::test]
async fn seller_reject_credits_buyer_exactly_once(pool: sqlx::PgPool) {
    let seller = create_account(&pool, "seller").await;
    let buyer = create_account(&pool, "buyer").await;
    seed_fee_tier(&pool, 5, 0).await;

    let listing = insert_published_listing(&pool, seller, 10_000_000, 500_000).await;
    topup(&pool, buyer, 500_000).await;

    let order = orders::buy_now(&pool, buyer, listing, None).await.unwrap();

    let order = orders::seller_confirm(
        &pool,
        seller,
        order.id,
        SellerAction::Reject,
        Some("sold elsewhere".into()),
    )
    .await
    .unwrap();
    assert_eq!(order.status, OrderStatus::Rejected);
    assert_eq!(balance(&pool, buyer).await, 500_000);

    // A whole-operation retry bounces off the terminal state
    let err = orders::seller_confirm(&pool, seller, order.id, SellerAction::Reject, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    // A raw ledger retry replays the key and returns the recorded entry
    let replay = wallet::credit(
        &pool,
        buyer,
        order.amount_vnd,
        TxType::EscrowRelease,
        None,
        None,
        None,
        Some(format!("order:{}:release", order.id)),
    )
    .await
    .unwrap();
    assert_eq!(balance(&pool, buyer).await, 500_000);
    assert_eq!(replay.tx_type, TxType::EscrowRelease);

    // topup + escrow hold + one release, nothing more
    assert_eq!(ledger_count(&pool, buyer).await, 3);
    wallet::audit(&pool, buyer).await.unwrap();
}

/// From AWAITING_SELLER only the seller decision and cancel are reachable;
/// COMPLETED is reachable only from ACCEPTED; terminal states admit nothing.
#[sqlx::test]
async fn state_machine_rejects_illegal_transitions(pool: sqlx::PgPool) {
    let platform = create_account(&pool, "platform").await;
    let seller = create_account(&pool, "seller").await;
    let buyer = create_account(&pool, "buyer").await;
    seed_fee_tier(&pool, 5, 0).await;

    let listing = insert_published_listing(&pool, seller, 10_000_000, 500_000).await;
    topup(&pool, buyer, 500_000).await;

    let order = orders::buy_now(&pool, buyer, listing, None).await.unwrap();

    // Cannot complete an order the seller has not accepted
    let err = orders::complete_order(&pool, buyer, order.id, platform)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    // Only the seller decides; only the buyer completes or cancels
    let err = orders::seller_confirm(&pool, buyer, order.id, SellerAction::Accept, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    let err = orders::cancel_order(&pool, seller, order.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    orders::seller_confirm(&pool, seller, order.id, SellerAction::Accept, None)
        .await
        .unwrap();

    // The seller cannot decide twice
    let err = orders::seller_confirm(&pool, seller, order.id, SellerAction::Reject, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    orders::complete_order(&pool, buyer, order.id, platform)
        .await
        .unwrap();

    // Terminal: neither cancel nor complete again
    let err = orders::cancel_order(&pool, buyer, order.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
    let err = orders::complete_order(&pool, buyer, order.id, platform)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
}

/// Buy-now is rejected outright when the buyer cannot cover the deposit,
/// and no order row is left behind.
#[sqlx::test]
async fn insufficient_balance_rejects_buy_now(pool: sqlx::PgPool) {
    let seller = create_account(&pool, "seller").await;
    let buyer = create_account(&pool, "buyer").await;
    seed_fee_tier(&pool, 5, 0).await;

    let listing = insert_published_listing(&pool, seller, 10_000_000, 500_000).await;
    topup(&pool, buyer, 499_999).await;

    let err = orders::buy_now(&pool, buyer, listing, None).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientBalance));

    let orders_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(orders_count, 0);
    assert_eq!(balance(&pool, buyer).await, 499_999);
}

/// A listing with an active order cannot be bought again, and a draft
/// listing cannot be bought at all.
#[sqlx::test]
async fn listing_availability_is_enforced(pool: sqlx::PgPool) {
    let seller = create_account(&pool, "seller").await;
    let buyer = create_account(&pool, "buyer").await;
    let other = create_account(&pool, "other").await;
    seed_fee_tier(&pool, 5, 0).await;

    let listing = insert_published_listing(&pool, seller, 10_000_000, 500_000).await;
    topup(&pool, buyer, 500_000).await;
    topup(&pool, other, 500_000).await;

    orders::buy_now(&pool, buyer, listing, None).await.unwrap();

    let err = orders::buy_now(&pool, other, listing, None).await.unwrap_err();
    assert!(matches!(err, AppError::ListingUnavailable(_)));
    assert_eq!(balance(&pool, other).await, 500_000);

    let draft = insert_draft_listing(&pool, seller, 8_000_000).await;
    let err = orders::buy_now(&pool, other, draft, None).await.unwrap_err();
    assert!(matches!(err, AppError::ListingUnavailable(_)));

    // Sellers cannot buy their own listing
    let own = insert_published_listing(&pool, other, 5_000_000, 250_000).await;
    let err = orders::buy_now(&pool, other, own, None).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));
}

/// The signed ledger sum tracks the balance through an arbitrary sequence
/// of movements: final balance = initial + credits - debits.
#[sqlx::test]
async fn balance_conservation_across_mixed_movements(pool: sqlx::PgPool) {
    let account = create_account(&pool, "account").await;

    topup(&pool, account, 2_000_000).await;
    wallet::debit(
        &pool,
        account,
        750_000,
        TxType::EscrowHold,
        None,
        None,
        None,
        None,
    )
    .await
    .unwrap();
    wallet::credit(
        &pool,
        account,
        750_000,
        TxType::EscrowRelease,
        None,
        None,
        None,
        None,
    )
    .await
    .unwrap();
    wallet::debit(
        &pool,
        account,
        300_000,
        TxType::DepositCharge,
        None,
        None,
        None,
        None,
    )
    .await
    .unwrap();

    assert_eq!(balance(&pool, account).await, 1_700_000);
    assert_eq!(wallet::audit(&pool, account).await.unwrap(), 1_700_000);

    // The logically reversed pair netted to zero
    let escrow_net: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(
            CASE WHEN direction = 'CREDIT' THEN amount_vnd ELSE -amount_vnd END
        ), 0)::BIGINT
        FROM wallet_transactions
        WHERE account_id = $1 AND tx_type IN ('ESCROW_HOLD', 'ESCROW_RELEASE')
        "#,
    )
    .bind(account)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(escrow_net, 0);
}

/// A debit below the floor leaves no trace: no balance change, no ledger row.
#[sqlx::test]
async fn failed_debit_has_no_partial_effect(pool: sqlx::PgPool) {
    let account = create_account(&pool, "account").await;
    topup(&pool, account, 100_000).await;

    let err = wallet::debit(
        &pool,
        account,
        100_001,
        TxType::EscrowHold,
        None,
        None,
        None,
        Some("escrow:test".to_string()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InsufficientBalance));

    assert_eq!(balance(&pool, account).await, 100_000);
    assert_eq!(ledger_count(&pool, account).await, 1);
    wallet::audit(&pool, account).await.unwrap();
}

/// Replaying a top-up callback's idempotency key credits once and returns
/// the recorded entry.
#[sqlx::test]
async fn topup_replay_credits_once(pool: sqlx::PgPool) {
    let account = create_account(&pool, "account").await;

    let first = wallet::credit(
        &pool,
        account,
        2_000_000,
        TxType::Topup,
        None,
        Some("20250601001".to_string()),
        None,
        Some("topup:20250601001".to_string()),
    )
    .await
    .unwrap();

    let replay = wallet::credit(
        &pool,
        account,
        2_000_000,
        TxType::Topup,
        None,
        Some("20250601001".to_string()),
        None,
        Some("topup:20250601001".to_string()),
    )
    .await
    .unwrap();

    assert_eq!(first.id, replay.id);
    assert_eq!(balance(&pool, account).await, 2_000_000);
    assert_eq!(ledger_count(&pool, account).await, 1);
}

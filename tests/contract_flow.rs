//! Contract confirmation flow tests: dual sign-off, exactly-once payout,
//! forfeiture, and mutual exclusion with the order path.

mod common;

use common::*;
use voltmarket::error::AppError;
use voltmarket::models::contract::ContractStatus;
use voltmarket::services::{contracts, listings, orders, wallet};

/// Confirming as buyer then seller (either order) sets `confirmed_at`
/// exactly once and triggers exactly one payout: deposit minus commission
/// to the seller, commission to the platform.
#[sqlx::test]
async fn dual_confirmation_pays_exactly_once(pool: sqlx::PgPool) {
    let platform = create_account(&pool, "platform").await;
    let seller = create_account(&pool, "seller").await;
    let buyer = create_account(&pool, "buyer").await;
    seed_fee_tier(&pool, 5, 0).await;

    // Publish through the real deposit flow so the escrow actually left
    // the seller's wallet
    topup(&pool, seller, 500_000).await;
    let listing = insert_draft_listing(&pool, seller, 10_000_000).await;
    let listing = listings::charge_deposit(&pool, seller, listing, 30).await.unwrap();
    assert_eq!(listing.deposit_vnd, 500_000);
    assert_eq!(balance(&pool, seller).await, 0);

    let contract = contracts::create_by_seller(&pool, seller, listing.id, buyer)
        .await
        .unwrap();
    assert_eq!(contract.status, ContractStatus::AwaitingConfirmation);
    assert_eq!(contract.fee_rate_percent, 5);

    // First confirmation: recorded, no payout yet
    let contract = contracts::confirm(&pool, buyer, contract.id, platform)
        .await
        .unwrap();
    assert!(contract.buyer_confirmed_at.is_some());
    assert!(contract.confirmed_at.is_none());
    assert_eq!(balance(&pool, seller).await, 0);

    // Same party again: no-op error, no second write
    let err = contracts::confirm(&pool, buyer, contract.id, platform)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyConfirmed));

    // A stranger cannot confirm
    let stranger = create_account(&pool, "stranger").await;
    let err = contracts::confirm(&pool, stranger, contract.id, platform)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    // Second party: the commit point
    let contract = contracts::confirm(&pool, seller, contract.id, platform)
        .await
        .unwrap();
    assert_eq!(contract.status, ContractStatus::Success);
    assert!(contract.confirmed_at.is_some());

    // 500,000 deposit, 5% commission: 475,000 back to the seller
    assert_eq!(balance(&pool, seller).await, 475_000);
    assert_eq!(balance(&pool, platform).await, 25_000);
    assert_eq!(listing_status(&pool, listing.id).await, "SOLD");

    // Confirming a finished contract fails without another payout
    let err = contracts::confirm(&pool, seller, contract.id, platform)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
    assert_eq!(balance(&pool, seller).await, 475_000);

    for account in [seller, buyer, platform] {
        wallet::audit(&pool, account).await.unwrap();
    }
}

/// Marking the sale external without buyer confirmation forfeits the whole
/// deposit to the platform and delists the listing.
#[sqlx::test]
async fn external_sale_forfeits_deposit(pool: sqlx::PgPool) {
    let platform = create_account(&pool, "platform").await;
    let seller = create_account(&pool, "seller").await;
    let buyer = create_account(&pool, "buyer").await;
    seed_fee_tier(&pool, 5, 0).await;

    let listing = insert_published_listing(&pool, seller, 10_000_000, 500_000).await;
    let contract = contracts::create_by_seller(&pool, seller, listing, buyer)
        .await
        .unwrap();

    let contract = contracts::mark_external(&pool, seller, contract.id, platform)
        .await
        .unwrap();
    assert_eq!(contract.status, ContractStatus::ForfeitedExternal);
    assert_eq!(balance(&pool, platform).await, 500_000);
    assert_eq!(balance(&pool, seller).await, 0);
    assert_eq!(listing_status(&pool, listing).await, "DELISTED");
}

/// Once the buyer has confirmed, the seller can no longer forfeit - the
/// dual-confirmation path must finish instead.
#[sqlx::test]
async fn forfeit_is_blocked_after_buyer_confirms(pool: sqlx::PgPool) {
    let platform = create_account(&pool, "platform").await;
    let seller = create_account(&pool, "seller").await;
    let buyer = create_account(&pool, "buyer").await;
    seed_fee_tier(&pool, 5, 0).await;

    let listing = insert_published_listing(&pool, seller, 10_000_000, 500_000).await;
    let contract = contracts::create_by_seller(&pool, seller, listing, buyer)
        .await
        .unwrap();

    contracts::confirm(&pool, buyer, contract.id, platform)
        .await
        .unwrap();

    let err = contracts::mark_external(&pool, seller, contract.id, platform)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
    assert_eq!(balance(&pool, platform).await, 0);
}

/// The order path and the contract path exclude each other per listing, so
/// the same sale can never be paid out twice.
#[sqlx::test]
async fn order_and_contract_paths_are_mutually_exclusive(pool: sqlx::PgPool) {
    let seller = create_account(&pool, "seller").await;
    let buyer = create_account(&pool, "buyer").await;
    seed_fee_tier(&pool, 5, 0).await;

    // An open contract blocks buy-now
    let listing_a = insert_published_listing(&pool, seller, 10_000_000, 500_000).await;
    contracts::create_by_seller(&pool, seller, listing_a, buyer)
        .await
        .unwrap();
    topup(&pool, buyer, 500_000).await;
    let err = orders::buy_now(&pool, buyer, listing_a, None).await.unwrap_err();
    assert!(matches!(err, AppError::ListingUnavailable(_)));

    // An active order blocks contract creation
    let listing_b = insert_published_listing(&pool, seller, 10_000_000, 500_000).await;
    orders::buy_now(&pool, buyer, listing_b, None).await.unwrap();
    let err = contracts::create_by_seller(&pool, seller, listing_b, buyer)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ListingUnavailable(_)));
}

/// Only the listing's seller may open a contract, and only against a
/// published listing with a deposit in escrow.
#[sqlx::test]
async fn contract_creation_guards(pool: sqlx::PgPool) {
    let seller = create_account(&pool, "seller").await;
    let buyer = create_account(&pool, "buyer").await;
    seed_fee_tier(&pool, 5, 0).await;

    let listing = insert_published_listing(&pool, seller, 10_000_000, 500_000).await;

    let err = contracts::create_by_seller(&pool, buyer, listing, buyer)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = contracts::create_by_seller(&pool, seller, listing, seller)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));

    let draft = insert_draft_listing(&pool, seller, 10_000_000).await;
    let err = contracts::create_by_seller(&pool, seller, draft, buyer)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ListingUnavailable(_)));
}

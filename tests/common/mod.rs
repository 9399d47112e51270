//! Shared fixtures for the integration tests.
//!
//! Each `#[sqlx::test]` gets a fresh database with the migrations applied;
//! these helpers seed the rows the flows need (accounts with wallets, fee
//! tiers, the refund policy, listings) and read back balances and ledger
//! counts for assertions.

#![allow(dead_code)]

use sqlx::PgPool;
use uuid::Uuid;
use voltmarket::models::wallet::TxType;
use voltmarket::services::wallet;

/// Insert an account with a fresh wallet and return its id.
pub async fn create_account(pool: &PgPool, name: &str) -> Uuid {
    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO accounts (display_name, token_hash) VALUES ($1, $2) RETURNING id",
    )
    .bind(name)
    .bind(format!("test-hash-{}", Uuid::new_v4()))
    .fetch_one(pool)
    .await
    .unwrap();

    sqlx::query("INSERT INTO wallets (account_id) VALUES ($1)")
        .bind(id)
        .execute(pool)
        .await
        .unwrap();

    id
}

/// Credit an account through the ledger, as the top-up path would.
pub async fn topup(pool: &PgPool, account_id: Uuid, amount_vnd: i64) {
    wallet::credit(
        pool,
        account_id,
        amount_vnd,
        TxType::Topup,
        None,
        None,
        Some("test top-up".to_string()),
        Some(format!("topup:test:{}", Uuid::new_v4())),
    )
    .await
    .unwrap();
}

/// Seed a single unbounded fee tier.
pub async fn seed_fee_tier(pool: &PgPool, deposit_rate_percent: i32, posting_fee_vnd: i64) {
    sqlx::query(
        r#"
        INSERT INTO fee_tiers (min_price_vnd, max_price_vnd, deposit_rate_percent, posting_fee_vnd)
        VALUES (0, NULL, $1, $2)
        "#,
    )
    .bind(deposit_rate_percent)
    .bind(posting_fee_vnd)
    .execute(pool)
    .await
    .unwrap();
}

/// Seed the active refund policy.
pub async fn seed_policy(
    pool: &PgPool,
    cancel_early: i32,
    cancel_late: i32,
    expired: i32,
    fraud: i32,
    hold_days: i32,
    auto_refund_after_days: i32,
) {
    sqlx::query(
        r#"
        INSERT INTO refund_policies (
            cancel_early_rate_percent, cancel_late_rate_percent,
            expired_rate_percent, fraud_suspected_rate_percent,
            hold_days, auto_refund_after_days
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(cancel_early)
    .bind(cancel_late)
    .bind(expired)
    .bind(fraud)
    .bind(hold_days)
    .bind(auto_refund_after_days)
    .execute(pool)
    .await
    .unwrap();
}

/// Insert an already-published listing with its deposit recorded.
///
/// Bypasses the deposit charge flow: the seller's wallet is untouched, only
/// the listing row carries the deposit amount.
pub async fn insert_published_listing(
    pool: &PgPool,
    seller_id: Uuid,
    price_vnd: i64,
    deposit_vnd: i64,
) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO listings (seller_id, title, price_vnd, status, deposit_vnd, published_at, expires_at)
        VALUES ($1, $2, $3, 'PUBLISHED', $4, NOW(), NOW() + INTERVAL '30 days')
        RETURNING id
        "#,
    )
    .bind(seller_id)
    .bind("VinFast VF8 2023, 12k km")
    .bind(price_vnd)
    .bind(deposit_vnd)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Insert a draft listing (no deposit yet).
pub async fn insert_draft_listing(pool: &PgPool, seller_id: Uuid, price_vnd: i64) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO listings (seller_id, title, price_vnd) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(seller_id)
    .bind("Pin LFP 60kWh, 92% SoH")
    .bind(price_vnd)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Current wallet balance.
pub async fn balance(pool: &PgPool, account_id: Uuid) -> i64 {
    wallet::balance_of(pool, account_id).await.unwrap()
}

/// Number of ledger entries for an account.
pub async fn ledger_count(pool: &PgPool, account_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM wallet_transactions WHERE account_id = $1")
        .bind(account_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Listing status as stored.
pub async fn listing_status(pool: &PgPool, listing_id: Uuid) -> String {
    sqlx::query_scalar("SELECT status FROM listings WHERE id = $1")
        .bind(listing_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

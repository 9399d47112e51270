//! Wallet ledger - primitive debit/credit operations.
//!
//! This service owns every mutation of wallet balances:
//! - Atomic balance updates (balance change + ledger row in one commit)
//! - Idempotency checking (a replayed key returns the original entry)
//! - Balance validation (debits fail on insufficient funds)
//!
//! # Atomicity Guarantees
//!
//! The `*_in_tx` variants take an open database transaction so callers can
//! compose a ledger write with their own state transition (order status,
//! refund case, listing flip) - both are written in one commit or neither.
//! The pool-level wrappers exist for standalone movements (top-ups).
//!
//! Wallet rows are locked `FOR UPDATE` before any balance check or update,
//! which serializes all mutations per account.

use crate::{
    db::{DbPool, DbTx},
    error::AppError,
    models::wallet::{Direction, RelatedType, TxType, Wallet, WalletTransaction},
};
use uuid::Uuid;

/// Credit a wallet (add money) within the caller's transaction.
///
/// # Process
///
/// 1. Replay check: if `idempotency_key` was already consumed, return the
///    recorded entry - success-equivalent, no second balance change
/// 2. Lock the wallet row and add to the balance
/// 3. Append the ledger entry
///
/// Credits cannot violate the non-negative balance invariant, so there is
/// no balance check.
///
/// # Errors
///
/// - `AccountNotFound`: no wallet row for the account
/// - `InvalidRequest`: amount is zero or negative
/// - `Database`: database error occurred
#[allow(clippy::too_many_arguments)]
pub async fn credit_in_tx(
    tx: &mut DbTx<'_>,
    account_id: Uuid,
    amount_vnd: i64,
    tx_type: TxType,
    related_type: Option<RelatedType>,
    related_id: Option<String>,
    description: Option<String>,
    idempotency_key: Option<String>,
) -> Result<WalletTransaction, AppError> {
    apply_in_tx(
        tx,
        Direction::Credit,
        account_id,
        amount_vnd,
        tx_type,
        related_type,
        related_id,
        description,
        idempotency_key,
    )
    .await
}

/// Debit a wallet (remove money) within the caller's transaction.
///
/// Same process as [`credit_in_tx`], plus a balance check after the row
/// lock: fails with `InsufficientBalance` when `balance < amount`.
#[allow(clippy::too_many_arguments)]
pub async fn debit_in_tx(
    tx: &mut DbTx<'_>,
    account_id: Uuid,
    amount_vnd: i64,
    tx_type: TxType,
    related_type: Option<RelatedType>,
    related_id: Option<String>,
    description: Option<String>,
    idempotency_key: Option<String>,
) -> Result<WalletTransaction, AppError> {
    apply_in_tx(
        tx,
        Direction::Debit,
        account_id,
        amount_vnd,
        tx_type,
        related_type,
        related_id,
        description,
        idempotency_key,
    )
    .await
}

/// Shared implementation for both directions.
#[allow(clippy::too_many_arguments)]
async fn apply_in_tx(
    tx: &mut DbTx<'_>,
    direction: Direction,
    account_id: Uuid,
    amount_vnd: i64,
    tx_type: TxType,
    related_type: Option<RelatedType>,
    related_id: Option<String>,
    description: Option<String>,
    idempotency_key: Option<String>,
) -> Result<WalletTransaction, AppError> {
    // Validate amount
    if amount_vnd <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }

    // Replay check inside the transaction, so a retry racing the original
    // still observes the committed entry
    if let Some(ref key) = idempotency_key {
        if let Some(existing) = sqlx::query_as::<_, WalletTransaction>(
            "SELECT * FROM wallet_transactions WHERE idempotency_key = $1",
        )
        .bind(key)
        .fetch_optional(&mut **tx)
        .await?
        {
            tracing::info!(key = %key, "idempotency key replayed, returning recorded entry");
            return Ok(existing);
        }
    }

    // Lock the wallet row; all per-account mutations serialize here
    let balance_vnd: i64 =
        sqlx::query_scalar("SELECT balance_vnd FROM wallets WHERE account_id = $1 FOR UPDATE")
            .bind(account_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(AppError::AccountNotFound)?;

    let delta = match direction {
        Direction::Credit => amount_vnd,
        Direction::Debit => {
            // Validate sufficient balance
            if balance_vnd < amount_vnd {
                return Err(AppError::InsufficientBalance);
            }
            -amount_vnd
        }
    };

    // Update balance
    sqlx::query(
        r#"
        UPDATE wallets
        SET balance_vnd = balance_vnd + $1,
            updated_at = NOW()
        WHERE account_id = $2
        "#,
    )
    .bind(delta)
    .bind(account_id)
    .execute(&mut **tx)
    .await?;

    // Append the ledger entry
    let entry = sqlx::query_as::<_, WalletTransaction>(
        r#"
        INSERT INTO wallet_transactions (
            account_id,
            amount_vnd,
            direction,
            tx_type,
            related_type,
            related_id,
            description,
            idempotency_key
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(account_id)
    .bind(amount_vnd)
    .bind(direction)
    .bind(tx_type)
    .bind(related_type)
    .bind(related_id)
    .bind(description)
    .bind(idempotency_key)
    .fetch_one(&mut **tx)
    .await?;

    tracing::info!(
        account = %account_id,
        amount = amount_vnd,
        ?direction,
        ?tx_type,
        "ledger entry recorded"
    );

    Ok(entry)
}

/// Credit a wallet in its own transaction (standalone path, e.g. top-ups).
#[allow(clippy::too_many_arguments)]
pub async fn credit(
    pool: &DbPool,
    account_id: Uuid,
    amount_vnd: i64,
    tx_type: TxType,
    related_type: Option<RelatedType>,
    related_id: Option<String>,
    description: Option<String>,
    idempotency_key: Option<String>,
) -> Result<WalletTransaction, AppError> {
    let mut tx = pool.begin().await?;
    let entry = credit_in_tx(
        &mut tx,
        account_id,
        amount_vnd,
        tx_type,
        related_type,
        related_id,
        description,
        idempotency_key,
    )
    .await?;
    // Commit all changes atomically
    tx.commit().await?;
    Ok(entry)
}

/// Debit a wallet in its own transaction.
#[allow(clippy::too_many_arguments)]
pub async fn debit(
    pool: &DbPool,
    account_id: Uuid,
    amount_vnd: i64,
    tx_type: TxType,
    related_type: Option<RelatedType>,
    related_id: Option<String>,
    description: Option<String>,
    idempotency_key: Option<String>,
) -> Result<WalletTransaction, AppError> {
    let mut tx = pool.begin().await?;
    let entry = debit_in_tx(
        &mut tx,
        account_id,
        amount_vnd,
        tx_type,
        related_type,
        related_id,
        description,
        idempotency_key,
    )
    .await?;
    tx.commit().await?;
    Ok(entry)
}

/// Read a wallet's committed state.
pub async fn get_wallet(pool: &DbPool, account_id: Uuid) -> Result<Wallet, AppError> {
    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE account_id = $1")
        .bind(account_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::AccountNotFound)
}

/// Read a wallet's committed balance.
pub async fn balance_of(pool: &DbPool, account_id: Uuid) -> Result<i64, AppError> {
    Ok(get_wallet(pool, account_id).await?.balance_vnd)
}

/// List a wallet's ledger entries, newest first.
pub async fn list_transactions(
    pool: &DbPool,
    account_id: Uuid,
) -> Result<Vec<WalletTransaction>, AppError> {
    let entries = sqlx::query_as::<_, WalletTransaction>(
        "SELECT * FROM wallet_transactions WHERE account_id = $1 ORDER BY created_at DESC",
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

/// Recompute the signed ledger sum and check it against the balance.
///
/// Returns the balance when they agree. A mismatch means the atomicity
/// discipline was broken somewhere and surfaces as an internal error, never
/// as a user-facing condition.
pub async fn audit(pool: &DbPool, account_id: Uuid) -> Result<i64, AppError> {
    let wallet = get_wallet(pool, account_id).await?;

    let ledger_sum_vnd: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(
            CASE WHEN direction = 'CREDIT' THEN amount_vnd ELSE -amount_vnd END
        ), 0)::BIGINT
        FROM wallet_transactions
        WHERE account_id = $1
        "#,
    )
    .bind(account_id)
    .fetch_one(pool)
    .await?;

    if ledger_sum_vnd != wallet.balance_vnd {
        return Err(AppError::LedgerMismatch {
            account_id,
            balance_vnd: wallet.balance_vnd,
            ledger_sum_vnd,
        });
    }

    Ok(wallet.balance_vnd)
}

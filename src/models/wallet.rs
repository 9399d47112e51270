//! Wallet and wallet-ledger data models.
//!
//! This module defines:
//! - `Wallet`: per-account balance row, mutated only by ledger operations
//! - `WalletTransaction`: immutable, append-only ledger entry
//! - The direction / type / related-entity enums used by ledger entries
//!
//! # Balance Storage
//!
//! Balances and amounts are stored as `i64` VND. VND has no subunit, so the
//! smallest currency unit is 1 VND. Never floats.
//!
//! # Ledger Invariant
//!
//! The signed sum of a wallet's ledger entries (credits minus debits) equals
//! its current balance at every point in time. Entries are created, never
//! mutated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-account wallet balance.
///
/// Maps to the `wallets` table. `balance_vnd` is never negative (enforced by
/// a database CHECK constraint) and is never written directly by business
/// code - only through `services::wallet`.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Wallet {
    pub account_id: Uuid,
    pub balance_vnd: i64,
    pub updated_at: DateTime<Utc>,
}

/// Whether a ledger entry adds to or removes from the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Credit,
    Debit,
}

/// The business meaning of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxType {
    /// Money in from a confirmed external payment (the only money-in path
    /// not originating inside the core)
    Topup,
    /// Buyer funds debited and held pending order resolution
    EscrowHold,
    /// Held escrow returned to the buyer (reject / cancel before accept)
    EscrowRelease,
    /// Seller listing deposit debited at publication time
    DepositCharge,
    /// Seller paid out on completion or contract success
    Payout,
    /// Refund-case credit computed by the policy engine
    Refund,
    /// Platform revenue (posting fees, commissions, refund remainders,
    /// forfeited deposits)
    Fee,
}

/// The entity a ledger entry relates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelatedType {
    Order,
    Listing,
    RefundCase,
    Payment,
    Contract,
}

/// Immutable ledger entry.
///
/// Maps to the `wallet_transactions` table. `amount_vnd` is always a
/// positive magnitude; `direction` carries the sign. If a caller supplies
/// the same `idempotency_key` twice, the second call returns the original
/// entry instead of moving money again.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub amount_vnd: i64,
    pub direction: Direction,
    pub tx_type: TxType,
    pub related_type: Option<RelatedType>,
    pub related_id: Option<String>,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    /// The entry's contribution to the balance: positive for credits,
    /// negative for debits.
    pub fn signed_amount(&self) -> i64 {
        match self.direction {
            Direction::Credit => self.amount_vnd,
            Direction::Debit => -self.amount_vnd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(direction: Direction, amount_vnd: i64) -> WalletTransaction {
        WalletTransaction {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            amount_vnd,
            direction,
            tx_type: TxType::Topup,
            related_type: None,
            related_id: None,
            description: None,
            idempotency_key: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn credit_signed_amount_is_positive() {
        assert_eq!(entry(Direction::Credit, 500_000).signed_amount(), 500_000);
    }

    #[test]
    fn debit_signed_amount_is_negative() {
        assert_eq!(entry(Direction::Debit, 500_000).signed_amount(), -500_000);
    }
}

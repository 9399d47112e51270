//! Contract data model for the dual-confirmation sale path.
//!
//! A contract records a seller-initiated "the sale happened in person" claim
//! against a published listing. It finalizes only when BOTH buyer and seller
//! independently confirm; the instant the second confirmation lands,
//! `confirmed_at` is set - exactly once - and the contract is immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Contract lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractStatus {
    /// Waiting for one or both parties to confirm
    AwaitingConfirmation,
    /// Both parties confirmed; deposit paid out minus commission
    Success,
    /// Seller declared an off-platform sale without buyer confirmation;
    /// the deposit is forfeited to the platform
    ForfeitedExternal,
    /// Escalated to the refund engine for an admin decision
    PendingRefund,
}

/// Represents a contract record from the database.
///
/// `listing_snapshot` freezes the listing (title, price, deposit) at
/// contract-creation time so later listing edits cannot change what the
/// parties agreed on. `fee_rate_percent` is the commission rate snapshotted
/// from the listing's fee tier.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Contract {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub status: ContractStatus,
    pub buyer_confirmed_at: Option<DateTime<Utc>>,
    pub seller_confirmed_at: Option<DateTime<Utc>>,

    /// Set exactly once, the instant the second party confirms
    pub confirmed_at: Option<DateTime<Utc>>,

    pub is_external_transaction: bool,
    pub listing_snapshot: serde_json::Value,
    pub fee_rate_percent: i32,
    pub created_at: DateTime<Utc>,
}

/// Request body for seller-initiated contract creation.
///
/// # JSON Example
///
/// ```json
/// {
///   "listing_id": "550e8400-e29b-41d4-a716-446655440000",
///   "buyer_id": "660e8400-e29b-41d4-a716-446655440001"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateContractRequest {
    pub listing_id: Uuid,
    pub buyer_id: Uuid,
}

/// Request body for the admin escalation endpoint.
#[derive(Debug, Deserialize)]
pub struct EscalateContractRequest {
    pub reason: String,
}

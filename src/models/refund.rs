//! Refund policy and refund case models.
//!
//! The policy is a single active configuration row of scenario rates; a
//! refund case is one concrete "should we give this money back" question,
//! decided exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a refund is being considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundScenario {
    /// Cancellation before the policy hold period elapsed
    CancelEarly,
    /// Cancellation after the hold period but before hard expiry
    CancelLate,
    /// Listing passed its lifecycle expiration without a terminal outcome
    Expired,
    /// Flagged by the fraud collaborator; never auto-refunded
    FraudSuspected,
}

/// Refund case lifecycle status. REFUNDED, REJECTED and FAILED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundCaseStatus {
    Pending,
    Refunded,
    Rejected,
    Failed,
}

/// The active refund policy configuration.
///
/// Rates are the percentage of the escrowed amount returned under each
/// scenario; the remainder is retained as platform fee.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct RefundPolicy {
    pub id: Uuid,
    pub cancel_early_rate_percent: i32,
    pub cancel_late_rate_percent: i32,
    pub expired_rate_percent: i32,
    pub fraud_suspected_rate_percent: i32,

    /// Grace period (days) before a cancellation counts as late
    pub hold_days: i32,

    /// Days past listing expiry before the automatic scan refunds deposits
    pub auto_refund_after_days: i32,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl RefundPolicy {
    /// The refund rate the policy prescribes for a scenario.
    pub fn rate_for(&self, scenario: RefundScenario) -> i32 {
        match scenario {
            RefundScenario::CancelEarly => self.cancel_early_rate_percent,
            RefundScenario::CancelLate => self.cancel_late_rate_percent,
            RefundScenario::Expired => self.expired_rate_percent,
            RefundScenario::FraudSuspected => self.fraud_suspected_rate_percent,
        }
    }
}

/// Represents a refund case record from the database.
///
/// Created by the scan or an admin; mutated only by the decide operation.
/// `wallet_transaction_id` links to the REFUND credit once executed.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct RefundCase {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub order_id: Option<Uuid>,

    /// The account the refund would be credited to
    pub account_id: Uuid,

    pub scenario: RefundScenario,
    pub policy_rate_percent: i32,
    pub amount_original_vnd: i64,
    pub amount_refund_vnd: i64,
    pub status: RefundCaseStatus,
    pub reason: Option<String>,
    pub admin_note: Option<String>,
    pub wallet_transaction_id: Option<Uuid>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Request body for manual (admin) refund case creation.
///
/// # JSON Example
///
/// ```json
/// {
///   "listing_id": "550e8400-e29b-41d4-a716-446655440000",
///   "account_id": "660e8400-e29b-41d4-a716-446655440001",
///   "scenario": "FRAUD_SUSPECTED",
///   "amount_original_vnd": 500000,
///   "reason": "Reported by fraud review"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateRefundCaseRequest {
    pub listing_id: Uuid,
    pub order_id: Option<Uuid>,
    pub account_id: Uuid,
    pub scenario: RefundScenario,
    pub amount_original_vnd: i64,
    pub reason: Option<String>,
}

/// The admin's decision on a pending refund case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundDecision {
    Approve,
    Reject,
}

/// Request body for the refund decision endpoint.
///
/// `override_percent` replaces the stored policy rate before the refund
/// amount is computed (approve only).
#[derive(Debug, Deserialize)]
pub struct DecideRefundRequest {
    pub decision: RefundDecision,
    pub admin_note: Option<String>,
    pub override_percent: Option<i32>,
}

/// Response body for the refund scan endpoint.
#[derive(Debug, Serialize)]
pub struct ScanResponse {
    /// Cases created by this sweep
    pub created: Vec<Uuid>,
    /// How many of them were auto-refunded
    pub refunded: usize,
}

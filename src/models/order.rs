//! Order data model and API request/response types.
//!
//! An order is a buyer's escrowed claim on a listing:
//!
//! ```text
//! (none) --buy_now--> AWAITING_SELLER --accept--> ACCEPTED --complete--> COMPLETED
//!                   |                           |
//!                   +--reject--> REJECTED       +--cancel/dispute--> CANCELLED / DISPUTE
//! ```
//!
//! COMPLETED, REJECTED and CANCELLED are terminal: no further ledger effects
//! are permitted once an order reaches one of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order lifecycle status.
///
/// `Pending` and `AwaitingSeller` both mean "escrow held, waiting for the
/// seller's decision"; rows predating the status split use `Pending` and are
/// accepted wherever `AwaitingSeller` is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    AwaitingSeller,
    Accepted,
    Rejected,
    Completed,
    Cancelled,
    Dispute,
}

impl OrderStatus {
    /// Whether the order still holds escrow and can change state.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            OrderStatus::Pending
                | OrderStatus::AwaitingSeller
                | OrderStatus::Accepted
                | OrderStatus::Dispute
        )
    }

    /// Terminal states are final; no transition leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Rejected | OrderStatus::Completed | OrderStatus::Cancelled
        )
    }

    /// Whether the seller may still accept or reject.
    pub fn awaiting_seller(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::AwaitingSeller)
    }
}

/// Represents an order record from the database.
///
/// `amount_vnd` is the escrowed amount - the fee-tier deposit computed from
/// the listing price at buy-now time, not the full listing price.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Order {
    /// Unique identifier for this order
    pub id: Uuid,

    /// Human-readable order code, e.g. `ORD-9F2C41AB`
    pub code: String,

    pub listing_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,

    /// Escrowed amount in VND
    pub amount_vnd: i64,

    pub status: OrderStatus,

    /// Buyer note or seller rejection reason
    pub note: Option<String>,

    /// When the order was created (and the escrow debited)
    pub created_at: DateTime<Utc>,

    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    /// When the order reached a terminal state
    pub closed_at: Option<DateTime<Utc>>,
}

/// Request body for buy-now.
///
/// # JSON Example
///
/// ```json
/// {
///   "listing_id": "550e8400-e29b-41d4-a716-446655440000",
///   "note": "Can pick up this weekend"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct BuyNowRequest {
    pub listing_id: Uuid,
    pub note: Option<String>,
}

/// The seller's decision on a pending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SellerAction {
    Accept,
    Reject,
}

/// Request body for the seller decision endpoint.
///
/// # JSON Example
///
/// ```json
/// {
///   "action": "REJECT",
///   "reason": "Vehicle no longer available"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct SellerDecisionRequest {
    pub action: SellerAction,
    pub reason: Option<String>,
}

/// Request body for buyer cancellation.
#[derive(Debug, Deserialize)]
pub struct CancelOrderRequest {
    pub note: Option<String>,
}

/// Request body for the admin dispute flag.
#[derive(Debug, Deserialize)]
pub struct DisputeRequest {
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_not_active() {
        for status in [
            OrderStatus::Rejected,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            assert!(status.is_terminal());
            assert!(!status.is_active());
        }
    }

    #[test]
    fn pending_and_awaiting_seller_are_interchangeable() {
        assert!(OrderStatus::Pending.awaiting_seller());
        assert!(OrderStatus::AwaitingSeller.awaiting_seller());
        assert!(!OrderStatus::Accepted.awaiting_seller());
    }

    #[test]
    fn dispute_is_active_but_not_awaiting_seller() {
        assert!(OrderStatus::Dispute.is_active());
        assert!(!OrderStatus::Dispute.awaiting_seller());
        assert!(!OrderStatus::Dispute.is_terminal());
    }
}

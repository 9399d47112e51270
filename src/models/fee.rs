//! Fee tier model.
//!
//! A fee tier is a price bracket mapping a listing price to the deposit
//! escrowed at listing-payment time (and for buy-now orders) and the fixed
//! posting fee the platform retains from the seller payout.
//!
//! Active tiers are non-overlapping and ordered by `min_price_vnd`
//! ascending; `max_price_vnd` is NULL only on the last (unbounded) tier.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Represents a fee tier record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct FeeTier {
    pub id: Uuid,

    /// Inclusive lower bound of the price bracket
    pub min_price_vnd: i64,

    /// Exclusive upper bound; NULL = unbounded (last tier only)
    pub max_price_vnd: Option<i64>,

    /// Percentage of the listing price escrowed as deposit
    pub deposit_rate_percent: i32,

    /// Fixed platform fee retained from the seller payout
    pub posting_fee_vnd: i64,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl FeeTier {
    /// Whether this tier brackets the given price.
    ///
    /// Brackets are half-open: `[min_price_vnd, max_price_vnd)`.
    pub fn covers(&self, price_vnd: i64) -> bool {
        price_vnd >= self.min_price_vnd
            && self.max_price_vnd.is_none_or(|max| price_vnd < max)
    }
}

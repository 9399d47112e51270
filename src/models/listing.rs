//! Listing model - the slice of the listing module the escrow core touches.
//!
//! The listing module owns the full post lifecycle (media, geo, moderation);
//! the core only reads price/status/expiry, charges the publication deposit,
//! and flips the status on sale or expiry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Listing lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingStatus {
    /// Created, deposit not yet charged - not purchasable
    Draft,
    /// Deposit escrowed, visible to buyers
    Published,
    /// Terminal: sold through the order or contract path
    Sold,
    /// Terminal: lifecycle expired, deposit refund handled by the scan
    Expired,
    /// Terminal: taken down (e.g., after an external-sale forfeiture)
    Delisted,
}

impl ListingStatus {
    /// Whether a buy-now order or contract may be opened against the listing.
    pub fn is_purchasable(self) -> bool {
        matches!(self, ListingStatus::Published)
    }
}

/// Represents a listing record from the database.
///
/// `deposit_vnd` is the amount escrowed from the seller at publication time
/// (0 until the deposit is charged). It is the amount at stake in the
/// contract-confirmation and expiry-refund flows.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Listing {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub price_vnd: i64,
    pub status: ListingStatus,
    pub deposit_vnd: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_published_listings_are_purchasable() {
        assert!(ListingStatus::Published.is_purchasable());
        assert!(!ListingStatus::Draft.is_purchasable());
        assert!(!ListingStatus::Sold.is_purchasable());
        assert!(!ListingStatus::Expired.is_purchasable());
        assert!(!ListingStatus::Delisted.is_purchasable());
    }
}

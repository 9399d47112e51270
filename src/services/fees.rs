//! Fee tier lookup and escrow arithmetic.
//!
//! The lookup itself is pure (a scan over the loaded tier table) so it can
//! be unit-tested without a database; the async wrappers load active tiers
//! and delegate.

use crate::{db::DbPool, error::AppError, models::fee::FeeTier};

/// Find the tier bracketing a price. Pure.
pub fn tier_for(tiers: &[FeeTier], price_vnd: i64) -> Option<&FeeTier> {
    tiers.iter().find(|t| t.covers(price_vnd))
}

/// The amount escrowed for a listing price under a tier:
/// `price * deposit_rate / 100`, rounded down to the smallest currency unit.
pub fn escrow_amount(price_vnd: i64, tier: &FeeTier) -> i64 {
    price_vnd * tier.deposit_rate_percent as i64 / 100
}

/// Load all active tiers, ordered by bracket.
pub async fn active_tiers(pool: &DbPool) -> Result<Vec<FeeTier>, AppError> {
    let tiers = sqlx::query_as::<_, FeeTier>(
        "SELECT * FROM fee_tiers WHERE is_active = true ORDER BY min_price_vnd ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(tiers)
}

/// Look up the tier for a price, or fail with `FeeTierNotFound`.
pub async fn tier_for_price(pool: &DbPool, price_vnd: i64) -> Result<FeeTier, AppError> {
    let tiers = active_tiers(pool).await?;
    tier_for(&tiers, price_vnd)
        .cloned()
        .ok_or(AppError::FeeTierNotFound(price_vnd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn tier(min: i64, max: Option<i64>, rate: i32, posting_fee: i64) -> FeeTier {
        FeeTier {
            id: Uuid::new_v4(),
            min_price_vnd: min,
            max_price_vnd: max,
            deposit_rate_percent: rate,
            posting_fee_vnd: posting_fee,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn tiers() -> Vec<FeeTier> {
        vec![
            tier(0, Some(5_000_000), 3, 10_000),
            tier(5_000_000, Some(50_000_000), 5, 50_000),
            tier(50_000_000, None, 7, 200_000),
        ]
    }

    #[test]
    fn brackets_are_half_open() {
        let tiers = tiers();
        assert_eq!(tier_for(&tiers, 4_999_999).unwrap().deposit_rate_percent, 3);
        assert_eq!(tier_for(&tiers, 5_000_000).unwrap().deposit_rate_percent, 5);
        assert_eq!(
            tier_for(&tiers, 49_999_999).unwrap().deposit_rate_percent,
            5
        );
        assert_eq!(
            tier_for(&tiers, 50_000_000).unwrap().deposit_rate_percent,
            7
        );
    }

    #[test]
    fn unbounded_last_tier_covers_any_price() {
        let tiers = tiers();
        assert_eq!(
            tier_for(&tiers, 9_999_999_999).unwrap().deposit_rate_percent,
            7
        );
    }

    #[test]
    fn no_tier_for_uncovered_price() {
        let gap = vec![tier(1_000_000, Some(2_000_000), 5, 0)];
        assert!(tier_for(&gap, 500_000).is_none());
    }

    #[test]
    fn escrow_amount_five_percent_of_ten_million() {
        let t = tier(5_000_000, Some(50_000_000), 5, 50_000);
        assert_eq!(escrow_amount(10_000_000, &t), 500_000);
    }

    #[test]
    fn escrow_amount_rounds_down() {
        let t = tier(0, None, 3, 0);
        // 3% of 99 VND = 2.97, truncated to 2
        assert_eq!(escrow_amount(99, &t), 2);
    }
}

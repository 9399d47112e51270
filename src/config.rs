//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;
use uuid::Uuid;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `PAYOS_CHECKSUM_KEY` (required): HMAC key used to verify PayOS top-up
///   callback signatures
/// - `PLATFORM_ACCOUNT_ID` (required): account that receives platform FEE
///   ledger entries (payout fees, refund remainders, forfeited deposits).
///   The account must exist; operators create it once and pin its id here.
/// - `LISTING_TTL_DAYS` (optional): listing lifetime after publication,
///   defaults to 30 days
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    pub payos_checksum_key: String,

    pub platform_account_id: Uuid,

    #[serde(default = "default_listing_ttl_days")]
    pub listing_ttl_days: i64,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

/// Default listing lifetime if LISTING_TTL_DAYS is not set.
fn default_listing_ttl_days() -> i64 {
    30
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Parse environment variables into Config struct
        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }
}

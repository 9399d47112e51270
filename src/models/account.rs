//! Account model and request/response types.
//!
//! Accounts authenticate with a bearer access token stored as a SHA-256
//! hash. Every account owns exactly one wallet row, created alongside it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an account record from the database.
///
/// # Database Table
///
/// Maps to the `accounts` table. When a request comes in with
/// `Authorization: Bearer <token>`, we hash the token with SHA-256 and look
/// up `token_hash`. Inactive accounts are rejected during authentication,
/// which provides a way to revoke access without deleting the record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    /// Unique identifier for this account
    pub id: Uuid,

    /// Human-readable display name
    pub display_name: String,

    /// SHA-256 hash of the access token (64 hex characters)
    pub token_hash: String,

    /// Whether this account may perform admin operations
    /// (refund decisions, refund scans, dispute flags)
    pub is_admin: bool,

    /// Whether this account is currently active
    pub is_active: bool,

    /// Timestamp when this account was created
    pub created_at: DateTime<Utc>,
}

/// Request body for creating a new account (admin only).
///
/// # JSON Example
///
/// ```json
/// {
///   "display_name": "Nguyen Van A",
///   "is_admin": false
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub display_name: String,

    #[serde(default)]
    pub is_admin: bool,
}

/// Response body for account endpoints.
///
/// The access token is ONLY included in the creation response - it is never
/// stored in plaintext and can never be shown again.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub display_name: String,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            display_name: account.display_name,
            is_admin: account.is_admin,
            access_token: None, // Never include the token by default
            created_at: account.created_at,
        }
    }
}

impl AccountResponse {
    /// Attach the plaintext token (only for the creation response).
    pub fn with_token(mut self, token: String) -> Self {
        self.access_token = Some(token);
        self
    }
}

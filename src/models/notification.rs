//! Notification endpoint and event models.
//!
//! Accounts register webhook URLs to receive fire-and-forget event POSTs
//! (order accepted, refund approved, ...). Payloads are signed with
//! HMAC-SHA256; the secret is only shown once during registration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Notification endpoint registered by an account.
///
/// The `secret` is stored in plaintext (required for HMAC generation)
/// but never returned in list operations.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationEndpoint {
    pub id: Uuid,
    pub account_id: Uuid,
    pub url: String,
    pub secret: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Request to register a new notification endpoint.
///
/// # Validation
///
/// - URL must be valid HTTPS (HTTP allowed for localhost in development)
/// - URL must not exceed 2048 characters
#[derive(Debug, Deserialize)]
pub struct NotificationEndpointRequest {
    pub url: String,
}

/// Response when registering or listing a notification endpoint.
///
/// The `secret` field is ONLY included when creating a new endpoint.
#[derive(Debug, Serialize)]
pub struct NotificationEndpointResponse {
    pub id: Uuid,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationEndpoint> for NotificationEndpointResponse {
    fn from(endpoint: NotificationEndpoint) -> Self {
        Self {
            id: endpoint.id,
            url: endpoint.url,
            secret: None, // Never include secret by default
            is_active: endpoint.is_active,
            created_at: endpoint.created_at,
        }
    }
}

impl NotificationEndpointResponse {
    /// Create response with secret included (only for registration).
    pub fn with_secret(mut self, secret: String) -> Self {
        self.secret = Some(secret);
        self
    }
}

/// The JSON body sent in the notification POST.
///
/// The request carries an `X-Voltmarket-Signature` header with format
/// `sha256=<hex_encoded_hmac>`; receivers verify it by computing
/// HMAC-SHA256(secret, body) and comparing constant-time.
#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Event type, e.g. `order.accepted`, `refund.approved`
    pub event_type: String,

    /// Unique identifier for this delivery
    pub event_id: Uuid,

    pub created_at: DateTime<Utc>,

    /// Event-specific data (order, contract or refund case fields)
    pub data: serde_json::Value,
}

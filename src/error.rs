//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use uuid::Uuid;

/// Application-wide error type.
///
/// This enum represents all possible errors that can occur in the application.
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Database errors**: any sqlx::Error from database operations
/// - **Authentication errors**: invalid tokens, bad webhook signatures
/// - **Resource errors**: missing rows, insufficient balance, unavailable listings
/// - **Validation errors**: wrong actor, wrong state, bad input
/// - **Invariant violations**: ledger sums that no longer match a balance -
///   these indicate a bug, not a user-facing condition
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Access token is missing, invalid, or inactive.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid access token")]
    InvalidToken,

    /// Webhook callback signature did not verify against the checksum key.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Authenticated account is not a party to the resource, or the
    /// operation requires an admin.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Forbidden")]
    Forbidden,

    /// Requested account (or its wallet) does not exist.
    #[error("Account not found")]
    AccountNotFound,

    /// Requested listing does not exist.
    #[error("Listing not found")]
    ListingNotFound,

    /// Requested order does not exist.
    #[error("Order not found")]
    OrderNotFound,

    /// Requested contract does not exist.
    #[error("Contract not found")]
    ContractNotFound,

    /// Requested refund case does not exist.
    #[error("Refund case not found")]
    RefundCaseNotFound,

    /// Requested notification endpoint does not exist.
    #[error("Notification endpoint not found")]
    EndpointNotFound,

    /// Wallet has insufficient balance for the requested debit.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Insufficient balance")]
    InsufficientBalance,

    /// Listing is not in a purchasable state (not published, already sold,
    /// already reserved by an active order or open contract).
    #[error("Listing unavailable: {0}")]
    ListingUnavailable(String),

    /// The requested state transition is not legal from the current state.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// The same party already confirmed this contract.
    #[error("Already confirmed")]
    AlreadyConfirmed,

    /// The refund case was already decided; decisions are final.
    #[error("Refund case already decided")]
    AlreadyDecided,

    /// No active fee tier brackets the given price.
    #[error("No fee tier covers price {0}")]
    FeeTierNotFound(i64),

    /// No active refund policy row is configured.
    #[error("No active refund policy configured")]
    PolicyNotConfigured,

    /// The signed sum of a wallet's ledger entries no longer matches its
    /// balance. Should never happen; indicates a bug in transaction scoping.
    #[error("Ledger mismatch for account {account_id}: balance {balance_vnd}, ledger sum {ledger_sum_vnd}")]
    LedgerMismatch {
        account_id: Uuid,
        balance_vnd: i64,
        ledger_sum_vnd: i64,
    },

    /// Request body or parameters are invalid.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// Notification endpoint URL failed validation.
    #[error("Invalid webhook URL")]
    InvalidWebhookUrl(String),
}

/// Convert AppError into an HTTP response.
///
/// This implementation allows Axum handlers to return `Result<T, AppError>`
/// and have errors automatically converted to proper HTTP responses.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Internal errors (database failures, ledger mismatches) are logged with
/// full detail but surface only an opaque message, so internal state never
/// leaks to clients.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Map each error variant to (HTTP status, error code, message)
        let (status, code, message) = match self {
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", self.to_string()),
            AppError::InvalidSignature => (
                StatusCode::UNAUTHORIZED,
                "invalid_signature",
                self.to_string(),
            ),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string()),
            AppError::AccountNotFound => {
                (StatusCode::NOT_FOUND, "account_not_found", self.to_string())
            }
            AppError::ListingNotFound => {
                (StatusCode::NOT_FOUND, "listing_not_found", self.to_string())
            }
            AppError::OrderNotFound => (StatusCode::NOT_FOUND, "order_not_found", self.to_string()),
            AppError::ContractNotFound => (
                StatusCode::NOT_FOUND,
                "contract_not_found",
                self.to_string(),
            ),
            AppError::RefundCaseNotFound => (
                StatusCode::NOT_FOUND,
                "refund_case_not_found",
                self.to_string(),
            ),
            AppError::EndpointNotFound => (
                StatusCode::NOT_FOUND,
                "endpoint_not_found",
                self.to_string(),
            ),
            AppError::InsufficientBalance => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "insufficient_balance",
                self.to_string(),
            ),
            AppError::ListingUnavailable(ref msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "listing_unavailable",
                msg.clone(),
            ),
            AppError::InvalidTransition(ref msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_transition",
                msg.clone(),
            ),
            AppError::AlreadyConfirmed => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "already_confirmed",
                self.to_string(),
            ),
            AppError::AlreadyDecided => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "already_decided",
                self.to_string(),
            ),
            AppError::FeeTierNotFound(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "fee_tier_not_found",
                self.to_string(),
            ),
            AppError::PolicyNotConfigured => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "policy_not_configured",
                self.to_string(),
            ),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::InvalidWebhookUrl(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_webhook_url", msg.clone())
            }
            AppError::LedgerMismatch { .. } => {
                tracing::error!("{}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Database(ref e) => {
                tracing::error!("database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        // Build JSON response body
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

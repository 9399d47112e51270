//! PayOS top-up callback handler.
//!
//! - POST /api/v1/webhooks/payos - Signed payment confirmation
//!
//! This is the only money-in path that does not originate inside the core:
//! the payment provider confirms a top-up and the wallet is credited. The
//! endpoint is public (no bearer auth) - authenticity comes from the HMAC
//! signature over the raw body, verified against the configured checksum
//! key. Replays carry the same payment order code and hit the idempotency
//! key, so they can never double-credit.

use crate::{
    AppState,
    error::AppError,
    models::wallet::{RelatedType, TxType},
    services::wallet,
};
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// PayOS result code for a successful payment.
const PAYOS_SUCCESS_CODE: &str = "00";

/// Callback body sent by PayOS after a payment attempt.
///
/// # JSON Example
///
/// ```json
/// {
///   "code": "00",
///   "desc": "success",
///   "data": {
///     "order_code": 20250601001,
///     "account_id": "550e8400-e29b-41d4-a716-446655440000",
///     "amount_vnd": 2000000
///   }
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct PayosCallback {
    /// Result code; "00" means the payment succeeded
    pub code: String,
    pub desc: Option<String>,
    pub data: PayosCallbackData,
}

/// Payment details within the callback.
#[derive(Debug, Deserialize)]
pub struct PayosCallbackData {
    /// PayOS payment order code; doubles as the idempotency key
    pub order_code: i64,
    pub account_id: Uuid,
    pub amount_vnd: i64,
}

/// Acknowledgement returned to PayOS.
#[derive(Debug, Serialize)]
pub struct TopupResponse {
    pub received: bool,
    /// Whether a wallet credit was recorded for this callback
    pub credited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<Uuid>,
}

/// Handle a PayOS payment confirmation.
///
/// # Flow
///
/// 1. Verify `x-payos-signature` (HMAC-SHA256 of the raw body, hex encoded)
/// 2. Parse the callback body
/// 3. Ignore non-success results (acknowledged, nothing credited)
/// 4. Credit the wallet (TOPUP, idempotency key `topup:{order_code}`)
pub async fn payos_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TopupResponse>, AppError> {
    // Step 1: verify the signature over the raw body, before parsing
    let signature = headers
        .get("x-payos-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;
    verify_signature(&state.config.payos_checksum_key, &body, signature)?;

    // Step 2: parse
    let callback: PayosCallback = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidRequest(format!("Malformed callback body: {e}")))?;

    // Step 3: non-success results are acknowledged but move no money
    if callback.code != PAYOS_SUCCESS_CODE {
        tracing::info!(
            order_code = callback.data.order_code,
            code = %callback.code,
            desc = callback.desc.as_deref().unwrap_or(""),
            "ignoring non-success payment callback"
        );
        return Ok(Json(TopupResponse {
            received: true,
            credited: false,
            transaction_id: None,
        }));
    }

    // Step 4: idempotent wallet credit
    let entry = wallet::credit(
        &state.pool,
        callback.data.account_id,
        callback.data.amount_vnd,
        TxType::Topup,
        Some(RelatedType::Payment),
        Some(callback.data.order_code.to_string()),
        Some("Wallet top-up via PayOS".to_string()),
        Some(format!("topup:{}", callback.data.order_code)),
    )
    .await?;

    Ok(Json(TopupResponse {
        received: true,
        credited: true,
        transaction_id: Some(entry.id),
    }))
}

/// Verify an HMAC-SHA256 signature (hex, optionally `sha256=`-prefixed)
/// over the raw callback body. Comparison is constant-time.
fn verify_signature(checksum_key: &str, body: &[u8], signature: &str) -> Result<(), AppError> {
    let hex_sig = signature.strip_prefix("sha256=").unwrap_or(signature);
    let sig_bytes = hex::decode(hex_sig).map_err(|_| AppError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(checksum_key.as_bytes())
        .expect("HMAC key length is valid");
    mac.update(body);
    mac.verify_slice(&sig_bytes)
        .map_err(|_| AppError::InvalidSignature)
}

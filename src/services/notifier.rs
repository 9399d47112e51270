//! Notification delivery - endpoint management and signed event webhooks.
//!
//! Accounts register endpoint URLs; the core emits fire-and-forget events
//! (`order.accepted`, `refund.approved`, ...) after its transaction
//! commits. Delivery is best-effort: failures are logged and recorded but
//! never roll back the state transition that triggered them, and the
//! triggering request never waits on delivery.

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::notification::{
    NotificationEndpoint, NotificationEndpointRequest, NotificationEndpointResponse,
    NotificationPayload,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Register a new notification endpoint.
///
/// # Process
///
/// 1. Validate URL format
/// 2. Generate cryptographically secure secret (32 bytes)
/// 3. Store endpoint in database
/// 4. Return endpoint with secret (only shown once)
///
/// # Security
///
/// - HTTPS is required for production endpoints
/// - HTTP localhost is allowed for testing
/// - Secret is 64 hex characters (32 bytes of randomness)
pub async fn create_endpoint(
    pool: &DbPool,
    account_id: Uuid,
    request: NotificationEndpointRequest,
) -> Result<NotificationEndpointResponse, AppError> {
    // Validate URL
    validate_endpoint_url(&request.url)?;

    // Generate secure random secret (32 bytes = 64 hex chars)
    let secret = generate_secret();

    let endpoint = sqlx::query_as::<_, NotificationEndpoint>(
        r#"
        INSERT INTO notification_endpoints (account_id, url, secret)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(account_id)
    .bind(&request.url)
    .bind(&secret)
    .fetch_one(pool)
    .await?;

    // Return response with secret included (only time it's shown)
    Ok(NotificationEndpointResponse::from(endpoint).with_secret(secret))
}

/// List an account's active notification endpoints (secrets excluded).
pub async fn list_endpoints(
    pool: &DbPool,
    account_id: Uuid,
) -> Result<Vec<NotificationEndpointResponse>, AppError> {
    let endpoints = sqlx::query_as::<_, NotificationEndpoint>(
        "SELECT * FROM notification_endpoints WHERE account_id = $1 AND is_active = true ORDER BY created_at DESC",
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;

    Ok(endpoints.into_iter().map(|e| e.into()).collect())
}

/// Delete a notification endpoint (soft delete, preserves event history).
pub async fn delete_endpoint(
    pool: &DbPool,
    account_id: Uuid,
    endpoint_id: Uuid,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE notification_endpoints SET is_active = false WHERE id = $1 AND account_id = $2",
    )
    .bind(endpoint_id)
    .bind(account_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::EndpointNotFound);
    }

    Ok(())
}

/// Emit an event to the given accounts without awaiting delivery.
///
/// The delivery task is spawned onto the runtime; the caller returns
/// immediately. This is the only emission surface the services use.
pub fn spawn_emit(
    pool: DbPool,
    account_ids: Vec<Uuid>,
    event_type: &'static str,
    data: serde_json::Value,
) {
    tokio::spawn(async move {
        for account_id in account_ids {
            if let Err(e) = emit(&pool, account_id, event_type, data.clone()).await {
                tracing::error!(%account_id, event_type, "notification emission failed: {e}");
            }
        }
    });
}

/// Send one event to all of an account's active endpoints.
///
/// Individual endpoint failures are logged but don't fail the overall
/// operation.
pub async fn emit(
    pool: &DbPool,
    account_id: Uuid,
    event_type: &str,
    data: serde_json::Value,
) -> Result<(), AppError> {
    let endpoints = sqlx::query_as::<_, NotificationEndpoint>(
        "SELECT * FROM notification_endpoints WHERE account_id = $1 AND is_active = true",
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;

    for endpoint in endpoints {
        if let Err(e) = send_notification(pool, &endpoint, event_type, data.clone()).await {
            tracing::error!("Failed to notify {}: {:?}", endpoint.url, e);
            // Continue to next endpoint even if one fails
        }
    }

    Ok(())
}

/// Send a single notification with HMAC signature and record the attempt.
///
/// # Headers Sent
///
/// - `Content-Type: application/json`
/// - `X-Voltmarket-Signature: sha256=<hex>`
/// - `X-Voltmarket-Event-Id: <uuid>`
///
/// # Timeout
///
/// 5 seconds per endpoint (prevents hanging on slow receivers)
async fn send_notification(
    pool: &DbPool,
    endpoint: &NotificationEndpoint,
    event_type: &str,
    data: serde_json::Value,
) -> Result<(), AppError> {
    let event_id = Uuid::new_v4();

    let payload = NotificationPayload {
        event_type: event_type.to_string(),
        event_id,
        created_at: chrono::Utc::now(),
        data,
    };
    let payload_json = serde_json::to_string(&payload)
        .map_err(|e| AppError::InvalidRequest(format!("Failed to serialize payload: {e}")))?;

    // Generate HMAC signature
    let signature = generate_signature(&endpoint.secret, &payload_json);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .map_err(|e| AppError::InvalidRequest(format!("HTTP client error: {e}")))?;

    let response = client
        .post(&endpoint.url)
        .header("Content-Type", "application/json")
        .header("X-Voltmarket-Signature", &signature)
        .header("X-Voltmarket-Event-Id", event_id.to_string())
        .body(payload_json.clone())
        .send()
        .await;

    let (status, body) = match response {
        Ok(resp) => {
            let status = resp.status().as_u16() as i32;
            let body = resp.text().await.ok();
            (Some(status), body)
        }
        Err(e) => {
            let error_msg = format!("Request failed: {e}");
            tracing::error!("{}", error_msg);
            (None, Some(error_msg))
        }
    };

    // Record the delivery attempt
    let payload_value = serde_json::from_str::<serde_json::Value>(&payload_json)
        .map_err(|e| AppError::InvalidRequest(format!("Failed to parse payload: {e}")))?;

    sqlx::query(
        r#"
        INSERT INTO notification_events (
            id,
            endpoint_id,
            event_type,
            payload,
            response_status,
            response_body
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(event_id)
    .bind(endpoint.id)
    .bind(event_type)
    .bind(payload_value)
    .bind(status)
    .bind(body)
    .execute(pool)
    .await?;

    Ok(())
}

/// Generate HMAC-SHA256 signature for a notification payload.
///
/// # Format
///
/// `sha256=<hex_encoded_hmac>`
///
/// Receivers verify by computing HMAC-SHA256(secret, request_body) and
/// comparing constant-time.
pub fn generate_signature(secret: &str, payload: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid");
    mac.update(payload.as_bytes());
    let result = mac.finalize();
    format!("sha256={}", hex::encode(result.into_bytes()))
}

/// Generate cryptographically secure random secret (64 hex characters).
pub fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Validate notification endpoint URL format.
///
/// # Rules
///
/// - Must be a valid URL
/// - Must be HTTPS (HTTP localhost allowed for development)
/// - Maximum 2048 characters
fn validate_endpoint_url(url: &str) -> Result<(), AppError> {
    if url.len() > 2048 {
        return Err(AppError::InvalidWebhookUrl(
            "URL exceeds 2048 characters".to_string(),
        ));
    }

    let parsed = url::Url::parse(url)
        .map_err(|_| AppError::InvalidWebhookUrl("Invalid URL format".to_string()))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" => {
            // Allow HTTP for localhost/127.0.0.1 (testing)
            if parsed.host_str() == Some("localhost")
                || parsed.host_str() == Some("127.0.0.1")
                || parsed.host_str() == Some("0.0.0.0")
            {
                Ok(())
            } else {
                Err(AppError::InvalidWebhookUrl(
                    "HTTP is only allowed for localhost. Use HTTPS for production.".to_string(),
                ))
            }
        }
        _ => Err(AppError::InvalidWebhookUrl(
            "URL must use HTTP or HTTPS".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_stable_for_same_input() {
        let a = generate_signature("secret", r#"{"x":1}"#);
        let b = generate_signature("secret", r#"{"x":1}"#);
        assert_eq!(a, b);
        assert!(a.starts_with("sha256="));
    }

    #[test]
    fn signature_changes_with_payload_and_secret() {
        let base = generate_signature("secret", "payload");
        assert_ne!(base, generate_signature("secret", "payload2"));
        assert_ne!(base, generate_signature("secret2", "payload"));
    }

    #[test]
    fn secret_is_64_hex_chars() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn https_urls_are_accepted() {
        assert!(validate_endpoint_url("https://example.com/hooks").is_ok());
    }

    #[test]
    fn http_is_only_allowed_for_localhost() {
        assert!(validate_endpoint_url("http://localhost:3000/hooks").is_ok());
        assert!(validate_endpoint_url("http://127.0.0.1/hooks").is_ok());
        assert!(validate_endpoint_url("http://example.com/hooks").is_err());
    }

    #[test]
    fn non_http_schemes_are_rejected() {
        assert!(validate_endpoint_url("ftp://example.com").is_err());
        assert!(validate_endpoint_url("not a url").is_err());
    }
}

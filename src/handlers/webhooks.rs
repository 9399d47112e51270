//! HTTP handlers for notification endpoint management.
//!
//! This module provides API endpoints for accounts to register, list, and
//! delete webhook endpoints that receive marketplace event notifications
//! (order accepted, refund approved, ...).

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::notification::{NotificationEndpointRequest, NotificationEndpointResponse};
use crate::services::notifier;

/// Register a new notification endpoint.
///
/// # Request Body
///
/// ```json
/// {
///   "url": "https://example.com/webhook"
/// }
/// ```
///
/// # Response
///
/// Returns 201 Created with the endpoint details. The `secret` is only
/// returned once during creation.
///
/// # Security
///
/// - HTTPS URLs required (HTTP localhost allowed for development)
/// - Secret is 64-character hex string for HMAC-SHA256
pub async fn create_webhook(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<NotificationEndpointRequest>,
) -> Result<impl IntoResponse, AppError> {
    let endpoint = notifier::create_endpoint(&state.pool, auth.account_id, request).await?;

    Ok((StatusCode::CREATED, Json(endpoint)))
}

/// List all active notification endpoints.
///
/// Returns only endpoints belonging to the authenticated account; secrets
/// are never returned in list operations.
pub async fn list_webhooks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<NotificationEndpointResponse>>, AppError> {
    let webhooks = notifier::list_endpoints(&state.pool, auth.account_id).await?;

    Ok(Json(webhooks))
}

/// Delete a notification endpoint (soft delete).
///
/// Returns 204 No Content on success. Sets `is_active = false` to preserve
/// event history; the endpoint will no longer receive notifications.
pub async fn delete_webhook(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(webhook_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    notifier::delete_endpoint(&state.pool, auth.account_id, webhook_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

//! Refund case HTTP handlers (admin surface).
//!
//! - POST /api/v1/refund-cases - Create a case manually
//! - GET /api/v1/refund-cases/:id - Get case details
//! - POST /api/v1/refund-cases/:id/decision - Approve or reject
//! - POST /api/v1/refunds/scan - Run one automatic sweep
//!
//! The scan endpoint is the surface the external scheduler calls; the core
//! does not run its own timers.

use crate::{
    AppState,
    error::AppError,
    middleware::auth::AuthContext,
    models::refund::{
        CreateRefundCaseRequest, DecideRefundRequest, RefundCase, ScanResponse,
    },
    services::refunds,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Create a refund case manually (admin only). Moves no money.
///
/// # Request Body
///
/// ```json
/// {
///   "listing_id": "550e8400-...",
///   "account_id": "660e8400-...",
///   "scenario": "FRAUD_SUSPECTED",
///   "amount_original_vnd": 500000,
///   "reason": "Reported by fraud review"
/// }
/// ```
pub async fn create_case(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateRefundCaseRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require_admin()?;

    let case = refunds::create_case(
        &state.pool,
        request.listing_id,
        request.order_id,
        request.account_id,
        request.scenario,
        request.amount_original_vnd,
        request.reason,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(case)))
}

/// Get refund case details.
///
/// The case's account and admins may view it.
pub async fn get_case(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(case_id): Path<Uuid>,
) -> Result<Json<RefundCase>, AppError> {
    let case = refunds::get_case(&state.pool, case_id).await?;

    if case.account_id != auth.account_id && !auth.is_admin {
        return Err(AppError::RefundCaseNotFound);
    }

    Ok(Json(case))
}

/// Decide a pending refund case (admin only). Decisions are final.
///
/// # Request Body
///
/// ```json
/// {
///   "decision": "APPROVE",
///   "admin_note": "Verified with both parties",
///   "override_percent": 100
/// }
/// ```
pub async fn decide(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(case_id): Path<Uuid>,
    Json(request): Json<DecideRefundRequest>,
) -> Result<Json<RefundCase>, AppError> {
    auth.require_admin()?;

    let case = refunds::decide(
        &state.pool,
        case_id,
        request.decision,
        request.admin_note,
        request.override_percent,
        state.config.platform_account_id,
    )
    .await?;

    Ok(Json(case))
}

/// Run one sweep of the automatic refund path (admin only).
///
/// Intended for the external scheduler; safe to call repeatedly.
pub async fn run_scan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ScanResponse>, AppError> {
    auth.require_admin()?;

    let (created, refunded) =
        refunds::run_scan(&state.pool, state.config.platform_account_id).await?;

    Ok(Json(ScanResponse { created, refunded }))
}

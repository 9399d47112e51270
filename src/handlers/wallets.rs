//! Wallet HTTP handlers.
//!
//! - GET /api/v1/wallet - The authenticated account's balance
//! - GET /api/v1/wallet/transactions - Its ledger entries, newest first
//!
//! Wallets are read-only over HTTP; money only moves through the order,
//! contract, refund and top-up flows.

use crate::{
    AppState,
    error::AppError,
    middleware::auth::AuthContext,
    models::wallet::{Wallet, WalletTransaction},
    services::wallet,
};
use axum::{Extension, Json, extract::State};

/// Get the authenticated account's wallet.
pub async fn get_wallet(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Wallet>, AppError> {
    let wallet = wallet::get_wallet(&state.pool, auth.account_id).await?;
    Ok(Json(wallet))
}

/// List the authenticated account's ledger entries.
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<WalletTransaction>>, AppError> {
    let entries = wallet::list_transactions(&state.pool, auth.account_id).await?;
    Ok(Json(entries))
}

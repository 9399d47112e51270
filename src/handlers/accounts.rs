//! Account management HTTP handlers.
//!
//! - POST /api/v1/accounts - Create new account (admin)
//! - GET /api/v1/accounts/me - Get the authenticated account
//!
//! The first admin account is provisioned out of band (a row inserted with
//! a pre-hashed token); every further account is created through the API.

use crate::{
    AppState,
    error::AppError,
    middleware::auth::{AuthContext, hash_token},
    models::account::{Account, AccountResponse, CreateAccountRequest},
};
use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

/// Create a new account with its wallet (admin only).
///
/// # Request Body
///
/// ```json
/// {
///   "display_name": "Nguyen Van A",
///   "is_admin": false
/// }
/// ```
///
/// # Response (201)
///
/// Returns the account including its plaintext `access_token` - the only
/// time it is ever shown. Only the SHA-256 hash is stored.
///
/// The account row and its zero-balance wallet row are inserted in one
/// transaction; wallets only ever gain money through ledger entries, so
/// there is no initial-balance parameter.
pub async fn create_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require_admin()?;

    if request.display_name.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "Display name must not be empty".to_string(),
        ));
    }

    // Generate the access token (32 random bytes, shown once)
    let token: [u8; 32] = rand::random();
    let token = hex::encode(token);

    let mut tx = state.pool.begin().await?;

    let account = sqlx::query_as::<_, Account>(
        r#"
        INSERT INTO accounts (display_name, token_hash, is_admin)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(request.display_name)
    .bind(hash_token(&token))
    .bind(request.is_admin)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO wallets (account_id) VALUES ($1)")
        .bind(account.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(account = %account.id, "account created");

    Ok((
        StatusCode::CREATED,
        Json(AccountResponse::from(account).with_token(token)),
    ))
}

/// Get the authenticated account.
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
        .bind(auth.account_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::AccountNotFound)?;

    Ok(Json(account.into()))
}

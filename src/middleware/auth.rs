//! Bearer token authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the access token from the Authorization header
//! 2. Hash it and verify it exists in the database
//! 3. Inject authentication context into the request
//! 4. Reject unauthorized requests with HTTP 401

use crate::{AppState, error::AppError, models::account::Account};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Authentication context attached to authenticated requests.
///
/// Inserted into the request's extension map; route handlers extract it to
/// know who made the request and whether they may perform admin operations.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// ID of the authenticated account
    pub account_id: Uuid,

    /// Display name of the account making the request
    pub display_name: String,

    /// Whether the account may perform admin operations
    pub is_admin: bool,
}

impl AuthContext {
    /// Reject non-admin callers on admin-only routes.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// Hash an access token the way it is stored in the accounts table.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Bearer token authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <token>` header from request
/// 2. Hash the `<token>` using SHA-256
/// 3. Query database for matching hash where `is_active = true`
/// 4. If found: inject `AuthContext` into request, call next handler
/// 5. If not found: return 401 Unauthorized error
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Step 1: Extract Authorization header
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidToken)?;

    // Step 2: Extract Bearer token
    // Expected format: "Bearer <token>"
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::InvalidToken)?;

    // Step 3+4: Hash and look up the token
    let token_hash = hash_token(token);

    let account = sqlx::query_as::<_, Account>(
        "SELECT * FROM accounts WHERE token_hash = $1 AND is_active = true",
    )
    .bind(&token_hash)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::InvalidToken)?;

    // Step 5: Create authentication context
    let auth_context = AuthContext {
        account_id: account.id,
        display_name: account.display_name,
        is_admin: account.is_admin,
    };

    // Step 6: Inject context into request extensions
    // Route handlers can now extract this using Extension<AuthContext>
    request.extensions_mut().insert(auth_context);

    // Step 7: Call the next middleware/handler
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hash_is_sha256_hex() {
        // SHA-256 of the empty string, a well-known vector
        assert_eq!(
            hash_token(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(hash_token("abc123").len(), 64);
    }
}

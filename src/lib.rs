//! Voltmarket - order, escrow and refund core for a peer-to-peer used-EV
//! marketplace.
//!
//! This crate implements the money-moving heart of the marketplace: the
//! wallet ledger, the buy-now order state machine, the dual-confirmation
//! contract flow, and the refund policy engine. Listing CRUD, chat, geo and
//! the rest of the product live elsewhere and are consumed as collaborators.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: bearer tokens with SHA-256 hashing
//! - **Format**: JSON requests/responses
//!
//! Handlers are thin; the services layer owns all business logic and every
//! transaction boundary. A state transition and the ledger entries it
//! triggers are always one commit.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

/// Shared application state: the connection pool and the loaded config.
#[derive(Clone)]
pub struct AppState {
    pub pool: db::DbPool,
    pub config: config::Config,
}

/// Build the HTTP router with all routes and middleware.
pub fn router(state: AppState) -> Router {
    // Authenticated routes (API endpoints)
    let authenticated_routes = Router::new()
        // Account management routes
        .route("/api/v1/accounts", post(handlers::accounts::create_account))
        .route("/api/v1/accounts/me", get(handlers::accounts::me))
        // Wallet routes (read-only; money moves through the flows below)
        .route("/api/v1/wallet", get(handlers::wallets::get_wallet))
        .route(
            "/api/v1/wallet/transactions",
            get(handlers::wallets::list_transactions),
        )
        // Listing routes (the core's slice of the listing module)
        .route(
            "/api/v1/listings/{id}",
            get(handlers::listings::get_listing),
        )
        .route(
            "/api/v1/listings/{id}/deposit",
            post(handlers::listings::charge_deposit),
        )
        // Order routes
        .route("/api/v1/orders", post(handlers::orders::buy_now))
        .route("/api/v1/orders/{id}", get(handlers::orders::get_order))
        .route(
            "/api/v1/orders/{id}/decision",
            post(handlers::orders::seller_decision),
        )
        .route(
            "/api/v1/orders/{id}/complete",
            post(handlers::orders::complete_order),
        )
        .route(
            "/api/v1/orders/{id}/cancel",
            post(handlers::orders::cancel_order),
        )
        .route(
            "/api/v1/orders/{id}/dispute",
            post(handlers::orders::flag_dispute),
        )
        // Contract routes
        .route(
            "/api/v1/contracts",
            post(handlers::contracts::create_contract),
        )
        .route(
            "/api/v1/contracts/{id}",
            get(handlers::contracts::get_contract),
        )
        .route(
            "/api/v1/contracts/{id}/confirm",
            post(handlers::contracts::confirm),
        )
        .route(
            "/api/v1/contracts/{id}/external",
            post(handlers::contracts::mark_external),
        )
        .route(
            "/api/v1/contracts/{id}/escalate",
            post(handlers::contracts::escalate),
        )
        // Refund routes
        .route(
            "/api/v1/refund-cases",
            post(handlers::refunds::create_case),
        )
        .route(
            "/api/v1/refund-cases/{id}",
            get(handlers::refunds::get_case),
        )
        .route(
            "/api/v1/refund-cases/{id}/decision",
            post(handlers::refunds::decide),
        )
        .route("/api/v1/refunds/scan", post(handlers::refunds::run_scan))
        // Notification endpoint routes
        .route("/api/v1/webhooks", post(handlers::webhooks::create_webhook))
        .route("/api/v1/webhooks", get(handlers::webhooks::list_webhooks))
        .route(
            "/api/v1/webhooks/{id}",
            delete(handlers::webhooks::delete_webhook),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        // Public routes (no bearer auth)
        .route("/health", get(handlers::health::health_check))
        // The PayOS callback authenticates via its HMAC signature instead
        .route(
            "/api/v1/webhooks/payos",
            post(handlers::topups::payos_callback),
        )
        // Merge authenticated routes
        .merge(authenticated_routes)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        // Share state with all handlers via State extraction
        .with_state(state)
}

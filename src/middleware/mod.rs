//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers. They can
//! authenticate requests, modify request/response, or short-circuit
//! unauthorized requests.

/// Bearer token authentication middleware
pub mod auth;

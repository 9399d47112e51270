//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the API request/response types derived from them.

pub mod account;
pub mod contract;
pub mod fee;
pub mod listing;
pub mod notification;
pub mod order;
pub mod refund;
pub mod wallet;

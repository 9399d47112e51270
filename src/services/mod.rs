//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers. Each
//! service owns its transaction boundaries: a state transition and the
//! ledger writes it triggers are one atomic unit of work. Components take
//! their collaborators as explicit parameters - no ambient container.

pub mod contracts;
pub mod fees;
pub mod listings;
pub mod notifier;
pub mod orders;
pub mod refunds;
pub mod wallet;

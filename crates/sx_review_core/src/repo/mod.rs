//! Repository layer: ledger and preference persistence.
//!
//! # Responsibility
//! - Define the collaborator contracts the review engine writes through.
//! - Keep SQLite query details out of collection and service code.
//!
//! # Invariants
//! - Repository APIs return semantic errors in addition to DB transport
//!   errors.

pub mod ledger_repo;
pub mod preference_repo;

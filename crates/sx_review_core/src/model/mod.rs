//! Domain model for scheduled transaction review.
//!
//! # Responsibility
//! - Define canonical data structures consumed by collection, projection and
//!   review services.
//!
//! # Invariants
//! - Instances are addressed positionally (`InstanceKey`), never by pointer.
//! - Variable indices are always editable-filtered.

pub mod amount;
pub mod instance;
pub mod preferences;
pub mod transaction;

//! Review use-case services.
//!
//! # Responsibility
//! - Orchestrate collection, projection and preference calls into the
//!   review workflow.
//! - Keep presentation layers decoupled from collection internals.

pub mod review_service;
pub mod startup;

//! Topic storage and relation graph maintenance.
//!
//! # Responsibility
//! - Own the canonical topic arena and root order.
//! - Keep relation sets symmetric and free of dangling ids.
//!
//! # Invariants
//! - Store writes validate before mutating; a returned error means no change.
//! - Store APIs return semantic errors (`NotFound`, `Cycle`, `SelfReference`);
//!   mapping them to no-ops is the facade's job.

pub mod relation_sync;
pub mod topic_store;

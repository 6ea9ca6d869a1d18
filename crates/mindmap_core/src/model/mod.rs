//! Mind-map domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by store, layout and sync.
//!
//! # Invariants
//! - Every topic is identified by a stable `TopicId`.
//! - Tree links are ids, never nested values; the store arena owns topics.

pub mod document;
pub mod path;
pub mod topic;

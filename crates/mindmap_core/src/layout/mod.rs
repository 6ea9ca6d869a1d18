//! Automatic layout of the topic tree.
//!
//! # Responsibility
//! - Measure topic boxes from display text.
//! - Compute deterministic positions for all visible topics.
//!
//! # Invariants
//! - Layout never mutates the store; callers commit returned positions.

pub mod engine;
pub mod measure;

pub use engine::{compute_layout, next_child_slot, LayoutResult};
pub use measure::{measure_text, BoxSize};

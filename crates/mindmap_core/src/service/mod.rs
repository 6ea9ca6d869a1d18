//! Document-level use-case services.
//!
//! # Responsibility
//! - Orchestrate store, history and layout into the editing operations
//!   consumed by rendering/UI and sync collaborators.
//! - Publish typed change events to registered observers.

pub mod events;
pub mod mind_map;

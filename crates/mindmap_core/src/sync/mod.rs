//! Real-time collaboration plumbing.
//!
//! # Responsibility
//! - Define the JSON change envelope and its transport frames.
//! - Apply inbound envelopes to a document and forward local edits outbound.
//! - Run the reconnecting transport session on the async runtime.
//!
//! # Invariants
//! - Only the document's owning loop mutates the document; the session task
//!   exchanges envelopes with it through channels.

pub mod envelope;
pub mod local_tracker;
pub mod remote_applier;
pub mod session;

//! Core engine for interactive mind maps.
//! This crate is the single source of truth for topic-tree invariants.

pub mod config;
pub mod history;
pub mod layout;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use config::{ConfigError, EngineConfig, HistoryConfig, LayoutConfig, SessionConfig};
pub use history::{HistoryManager, HistorySnapshot};
pub use layout::{compute_layout, LayoutResult};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::document::{DocumentTree, TopicNode};
pub use model::path::TopicPath;
pub use model::topic::{Position, Topic, TopicId, TopicPatch, TopicShape, TopicStyle};
pub use repo::topic_store::{StoreError, StoreResult, TopicStore};
pub use service::events::{ChangeOrigin, DocumentEvent, SubscriptionId};
pub use service::mind_map::{EditError, MindMap};
pub use sync::envelope::{ChangeEnvelope, ChangeType, Frame};
pub use sync::local_tracker::LocalChangeTracker;
pub use sync::remote_applier::{ApplyError, ApplyOutcome, ApplyReport, RemoteChangeApplier};
pub use sync::session::{
    session_channels, CollaborationSession, SessionStatus, Transport, TransportError,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

//! Typed document event bus.
//!
//! # Responsibility
//! - Fan document changes out to registered observers (rendering, the
//!   local-change tracker, persistence hooks).
//!
//! # Invariants
//! - Listeners run synchronously on the thread that owns the document, in
//!   registration order, after the mutation has fully completed.
//! - Every change event carries its `ChangeOrigin`, so remote edits are
//!   never forwarded back to the network.

use crate::model::topic::{Position, Topic, TopicId};

/// Where a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    Local,
    Remote,
}

/// Direction of a history restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryDirection {
    Undo,
    Redo,
}

/// One observable document change.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    TopicCreated {
        topic: Topic,
        origin: ChangeOrigin,
    },
    TopicUpdated {
        topic: Topic,
        origin: ChangeOrigin,
    },
    TopicDeleted {
        topic_id: TopicId,
        /// Every removed id, the deleted topic first.
        removed: Vec<TopicId>,
        origin: ChangeOrigin,
    },
    TopicMoved {
        topic_id: TopicId,
        position: Position,
        origin: ChangeOrigin,
    },
    TopicReparented {
        topic_id: TopicId,
        parent_id: TopicId,
        origin: ChangeOrigin,
    },
    RelationAdded {
        from: TopicId,
        to: TopicId,
        origin: ChangeOrigin,
    },
    RelationRemoved {
        from: TopicId,
        to: TopicId,
        origin: ChangeOrigin,
    },
    CollapseToggled {
        topic_id: TopicId,
        collapsed: bool,
    },
    /// A layout pass committed new positions.
    LayoutApplied {
        moved: Vec<(TopicId, Position)>,
    },
    HistoryRestored {
        direction: HistoryDirection,
    },
    /// The whole tree was replaced by an import.
    DocumentLoaded {
        topic_count: usize,
    },
    SelectionChanged {
        selected: Option<TopicId>,
    },
}

impl DocumentEvent {
    /// Origin of a change event; `None` for events that only exist locally.
    pub fn origin(&self) -> Option<ChangeOrigin> {
        match self {
            Self::TopicCreated { origin, .. }
            | Self::TopicUpdated { origin, .. }
            | Self::TopicDeleted { origin, .. }
            | Self::TopicMoved { origin, .. }
            | Self::TopicReparented { origin, .. }
            | Self::RelationAdded { origin, .. }
            | Self::RelationRemoved { origin, .. } => Some(*origin),
            Self::CollapseToggled { .. }
            | Self::LayoutApplied { .. }
            | Self::HistoryRestored { .. }
            | Self::DocumentLoaded { .. }
            | Self::SelectionChanged { .. } => None,
        }
    }
}

/// Handle returned by `EventBus::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&DocumentEvent)>;

/// Synchronous listener registry.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&DocumentEvent) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes one listener. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn publish(&mut self, event: &DocumentEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentEvent, EventBus};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn unsubscribed_listener_stops_receiving() {
        let seen = Rc::new(RefCell::new(0usize));
        let mut bus = EventBus::new();
        let counter = Rc::clone(&seen);
        let id = bus.subscribe(move |_| *counter.borrow_mut() += 1);

        let event = DocumentEvent::SelectionChanged { selected: None };
        bus.publish(&event);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&event);

        assert_eq!(*seen.borrow(), 1);
        assert_eq!(bus.listener_count(), 0);
    }
}

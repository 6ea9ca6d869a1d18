//! Local change forwarding.
//!
//! Turns locally originated document events into outbound envelopes for the
//! collaboration session. Remote-origin events are never echoed back.
//! Reparenting, collapse, history restores and imports have no envelope
//! type and stay local.

use crate::service::events::{ChangeOrigin, DocumentEvent, SubscriptionId};
use crate::service::mind_map::MindMap;
use crate::sync::envelope::ChangeEnvelope;
use log::{debug, warn};
use tokio::sync::mpsc::UnboundedSender;

/// Forwards local edits to an outbound envelope channel.
#[derive(Debug)]
pub struct LocalChangeTracker {
    outbound: UnboundedSender<ChangeEnvelope>,
    forwarded: u64,
}

impl LocalChangeTracker {
    pub fn new(outbound: UnboundedSender<ChangeEnvelope>) -> Self {
        Self {
            outbound,
            forwarded: 0,
        }
    }

    /// Number of envelopes handed to the channel so far.
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    /// Envelopes describing `event`, empty for remote or local-only events.
    pub fn envelopes_for(event: &DocumentEvent) -> Vec<ChangeEnvelope> {
        if event.origin() == Some(ChangeOrigin::Remote) {
            return Vec::new();
        }
        match event {
            DocumentEvent::TopicCreated { topic, .. } => vec![ChangeEnvelope::create(topic)],
            DocumentEvent::TopicUpdated { topic, .. } => vec![ChangeEnvelope::update(topic)],
            DocumentEvent::TopicDeleted { topic_id, .. } => vec![ChangeEnvelope::delete(*topic_id)],
            DocumentEvent::TopicMoved {
                topic_id, position, ..
            } => vec![ChangeEnvelope::moved(*topic_id, *position)],
            DocumentEvent::RelationAdded { from, to, .. } => {
                vec![ChangeEnvelope::connect(*from, *to)]
            }
            DocumentEvent::RelationRemoved { from, to, .. } => {
                vec![ChangeEnvelope::disconnect(*from, *to)]
            }
            DocumentEvent::LayoutApplied { moved } => moved
                .iter()
                .map(|(id, position)| ChangeEnvelope::moved(*id, *position))
                .collect(),
            DocumentEvent::TopicReparented { .. }
            | DocumentEvent::CollapseToggled { .. }
            | DocumentEvent::HistoryRestored { .. }
            | DocumentEvent::DocumentLoaded { .. }
            | DocumentEvent::SelectionChanged { .. } => Vec::new(),
        }
    }

    /// Forwards the envelopes for one event.
    pub fn observe(&mut self, event: &DocumentEvent) {
        for envelope in Self::envelopes_for(event) {
            let change_type = envelope.change_type.as_str();
            let topic_id = envelope.topic_id;
            if self.outbound.send(envelope).is_err() {
                warn!(
                    "event=local_forward module=remote status=error reason=channel_closed type={change_type} topic={topic_id}"
                );
                return;
            }
            self.forwarded += 1;
            debug!("event=local_forward module=remote status=ok type={change_type} topic={topic_id}");
        }
    }

    /// Subscribes this tracker to `document`.
    pub fn attach(mut self, document: &mut MindMap) -> SubscriptionId {
        document.subscribe(move |event| self.observe(event))
    }
}

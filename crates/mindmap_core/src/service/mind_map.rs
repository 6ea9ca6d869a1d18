//! Mind-map document facade.
//!
//! # Responsibility
//! - Expose the public editing operations consumed by UI and sync layers.
//! - Sequence every structural change as: validate, save history pre-image,
//!   mutate store, publish event.
//!
//! # Invariants
//! - Not-found and duplicate conditions are silent no-ops at this layer;
//!   only cycle and self-reference violations surface as `EditError`.
//! - A rejected or no-op call records no history entry and publishes nothing.
//! - Selection and editing state never enters history or exports.
//! - Local and remote edits share the same `*_as` code paths.

use crate::config::EngineConfig;
use crate::history::{HistoryManager, HistorySnapshot};
use crate::layout::{compute_layout, next_child_slot, LayoutResult};
use crate::model::document::DocumentTree;
use crate::model::topic::{normalize_topic_name, Position, Topic, TopicId, TopicPatch};
use crate::repo::relation_sync;
use crate::repo::topic_store::{StoreError, TopicStore};
use crate::service::events::{
    ChangeOrigin, DocumentEvent, EventBus, HistoryDirection, SubscriptionId,
};
use log::{debug, info, warn};
use std::error::Error;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Typed failures surfaced by facade operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditError {
    /// The operation would make a topic its own ancestor.
    Cycle { child: TopicId, parent: TopicId },
    /// The operation targets the topic itself.
    SelfReference(TopicId),
}

impl Display for EditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cycle { child, parent } => write!(
                f,
                "cannot move topic {child} under its own descendant {parent}"
            ),
            Self::SelfReference(id) => write!(f, "topic cannot target itself: {id}"),
        }
    }
}

impl Error for EditError {}

/// Splits store errors into typed edit failures and silent no-ops.
fn edit_failure(err: StoreError) -> Result<(), EditError> {
    match err {
        StoreError::Cycle { child, parent } => Err(EditError::Cycle { child, parent }),
        StoreError::SelfReference(id) => Err(EditError::SelfReference(id)),
        other => {
            debug!("event=edit_noop module=store status=skip reason={other}");
            Ok(())
        }
    }
}

/// One editable mind-map document.
pub struct MindMap {
    store: TopicStore,
    history: HistoryManager,
    config: EngineConfig,
    selection: Option<TopicId>,
    editing: Option<TopicId>,
    events: EventBus,
}

impl std::fmt::Debug for MindMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MindMap")
            .field("topics", &self.store.len())
            .field("history", &self.history.len())
            .field("selection", &self.selection)
            .field("events", &self.events)
            .finish()
    }
}

impl Default for MindMap {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl MindMap {
    /// Creates an empty document.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            store: TopicStore::new(),
            history: HistoryManager::new(&config.history),
            config,
            selection: None,
            editing: None,
            events: EventBus::new(),
        }
    }

    /// Creates a document holding one main topic at the origin.
    ///
    /// The initial topic is not an undoable edit.
    pub fn with_central_topic(config: EngineConfig) -> Self {
        let mut map = Self::new(config);
        let topic = Topic::new(
            map.config.defaults.main_topic_name.clone(),
            Position::default(),
            map.config.defaults.style.clone(),
        );
        if let Err(err) = map.store.add(topic, None) {
            warn!("event=document_init module=store status=error error={err}");
        }
        map
    }

    pub fn store(&self) -> &TopicStore {
        &self.store
    }

    pub fn topic(&self, id: TopicId) -> Option<&Topic> {
        self.store.get(id)
    }

    pub fn roots(&self) -> &[TopicId] {
        self.store.roots()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn selection(&self) -> Option<TopicId> {
        self.selection
    }

    pub fn editing(&self) -> Option<TopicId> {
        self.editing
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&DocumentEvent) + 'static,
    {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    // Public editing operations.

    /// Adds a new main topic at `position` with the configured default style.
    pub fn add_main_topic(&mut self, position: Position) -> Option<TopicId> {
        let topic = Topic::new(
            self.config.defaults.main_topic_name.clone(),
            position,
            self.config.defaults.style.clone(),
        );
        self.create_topic_as(topic, None, ChangeOrigin::Local).ok()
    }

    /// Adds a subtopic as last child of `parent_id`, inheriting its style.
    ///
    /// A collapsed parent is expanded so the new topic is visible.
    pub fn add_subtopic(&mut self, parent_id: TopicId) -> Option<TopicId> {
        let parent = self.store.get(parent_id)?;
        let name = self.config.defaults.subtopic_name.clone();
        let position = next_child_slot(&self.store, parent_id, &name, &self.config.layout)
            .unwrap_or(parent.position);
        let style = parent.style.clone();
        let expand = parent.is_collapsed;

        let topic = Topic::new(name, position, style);
        let id = self
            .create_topic_as(topic, Some(parent_id), ChangeOrigin::Local)
            .ok()?;
        if expand {
            self.write_topic(parent_id, |topic| topic.is_collapsed = false);
            self.events.publish(&DocumentEvent::CollapseToggled {
                topic_id: parent_id,
                collapsed: false,
            });
        }
        Some(id)
    }

    /// Applies `patch` to one topic.
    pub fn update_topic(&mut self, id: TopicId, patch: &TopicPatch) -> Option<TopicId> {
        self.update_topic_as(id, patch, ChangeOrigin::Local)
            .ok()
            .map(|_| id)
    }

    /// Deletes one topic and its subtree.
    pub fn delete_topic(&mut self, id: TopicId) -> Option<TopicId> {
        match self.delete_topic_as(id, ChangeOrigin::Local) {
            Ok(removed) if !removed.is_empty() => Some(id),
            _ => None,
        }
    }

    pub fn move_topic(&mut self, id: TopicId, position: Position) -> Option<TopicId> {
        self.move_topic_as(id, position, ChangeOrigin::Local)
            .ok()
            .map(|_| id)
    }

    /// Relates `a` and `b` symmetrically. Returns whether a relation was added.
    pub fn add_relation(&mut self, a: TopicId, b: TopicId) -> Result<bool, EditError> {
        match self.add_relation_as(a, b, ChangeOrigin::Local) {
            Ok(()) => Ok(true),
            Err(err) => edit_failure(err).map(|_| false),
        }
    }

    /// Removes the relation between `a` and `b`. Returns whether one existed.
    pub fn remove_relation(&mut self, a: TopicId, b: TopicId) -> Result<bool, EditError> {
        match self.remove_relation_as(a, b, ChangeOrigin::Local) {
            Ok(removed) => Ok(removed),
            Err(err) => edit_failure(err).map(|_| false),
        }
    }

    /// Moves `child_id` to the end of `parent_id`'s children.
    pub fn reparent(
        &mut self,
        child_id: TopicId,
        parent_id: TopicId,
    ) -> Result<Option<TopicId>, EditError> {
        match self.reparent_as(child_id, parent_id, ChangeOrigin::Local) {
            Ok(_) => Ok(Some(child_id)),
            Err(err) => edit_failure(err).map(|_| None),
        }
    }

    /// Flips the collapsed flag. Returns the new state.
    pub fn collapse_toggle(&mut self, id: TopicId) -> Option<bool> {
        let collapsed = !self.store.get(id)?.is_collapsed;
        self.save_history();
        self.store
            .update(id, |topic| topic.is_collapsed = collapsed)
            .ok()?;
        self.events.publish(&DocumentEvent::CollapseToggled {
            topic_id: id,
            collapsed,
        });
        Some(collapsed)
    }

    /// Runs the layout engine around the selection (or first root) and
    /// commits the result. Returns the number of topics that moved.
    pub fn perform_auto_layout(&mut self) -> usize {
        let result = self.preview_layout();
        let moved: Vec<(TopicId, Position)> = result
            .positions
            .iter()
            .filter(|(id, position)| {
                self.store
                    .get(**id)
                    .is_some_and(|topic| topic.position != **position)
            })
            .map(|(id, position)| (*id, *position))
            .collect();
        if moved.is_empty() {
            return 0;
        }

        self.save_history();
        for (id, position) in &moved {
            let position = *position;
            self.write_topic(*id, |topic| topic.position = position);
        }
        info!(
            "event=layout_apply module=layout status=ok moved={} positioned={}",
            moved.len(),
            result.len()
        );
        let count = moved.len();
        self.events.publish(&DocumentEvent::LayoutApplied { moved });
        count
    }

    /// Computes the layout the next `perform_auto_layout` would commit.
    pub fn preview_layout(&self) -> LayoutResult {
        compute_layout(&self.store, self.selection, &self.config.layout)
    }

    pub fn undo(&mut self) -> bool {
        let current = HistorySnapshot::capture(&self.store);
        match self.history.undo(current) {
            Some(snapshot) => {
                self.restore(snapshot, HistoryDirection::Undo);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(snapshot) => {
                self.restore(snapshot, HistoryDirection::Redo);
                true
            }
            None => false,
        }
    }

    // Transient state. None of these record history.

    /// Selects one topic, clearing any previous selection.
    pub fn select(&mut self, id: TopicId) -> bool {
        if !self.store.contains(id) {
            return false;
        }
        self.clear_selection_flags();
        self.write_topic(id, |topic| topic.is_selected = true);
        self.selection = Some(id);
        self.events
            .publish(&DocumentEvent::SelectionChanged { selected: Some(id) });
        true
    }

    pub fn clear_selection(&mut self) {
        if self.selection.is_none() {
            return;
        }
        self.end_editing();
        self.clear_selection_flags();
        self.selection = None;
        self.events
            .publish(&DocumentEvent::SelectionChanged { selected: None });
    }

    /// Starts in-place text editing of `id`, selecting it.
    pub fn begin_editing(&mut self, id: TopicId) -> bool {
        if !self.select(id) {
            return false;
        }
        self.write_topic(id, |topic| topic.is_editing = true);
        self.editing = Some(id);
        true
    }

    /// Replaces the name of `id` during text editing.
    ///
    /// History is saved at most once per configured text-edit interval,
    /// measured with the caller-supplied clock.
    pub fn edit_text(&mut self, id: TopicId, text: &str, now: Instant) -> Option<TopicId> {
        let normalized = normalize_topic_name(text);
        let topic = self.store.get(id)?;
        if topic.name == normalized {
            return Some(id);
        }

        self.history
            .save_coalesced(HistorySnapshot::capture(&self.store), now);
        self.store.update(id, |topic| topic.name = normalized).ok()?;
        self.publish_updated(id, ChangeOrigin::Local);
        Some(id)
    }

    pub fn end_editing(&mut self) {
        if let Some(id) = self.editing.take() {
            self.write_topic(id, |topic| topic.is_editing = false);
        }
    }

    // Persistence hand-off.

    /// Exports the full root sequence for the persistence collaborator.
    pub fn export_document(&self) -> DocumentTree {
        self.store.to_document()
    }

    /// Replaces the document with `document`.
    ///
    /// Relations are repaired, transient state and history are cleared.
    /// Returns the number of loaded topics.
    pub fn import_document(&mut self, document: &DocumentTree) -> Result<usize, StoreError> {
        let mut store = TopicStore::from_document(document)?;
        store.validate_structure()?;
        relation_sync::repair(&mut store);

        self.store = store;
        self.history.clear();
        self.selection = None;
        self.editing = None;
        let topic_count = self.store.len();
        info!("event=document_load module=store status=ok topics={topic_count}");
        self.events
            .publish(&DocumentEvent::DocumentLoaded { topic_count });
        Ok(topic_count)
    }

    // Shared local/remote paths.

    pub(crate) fn create_topic_as(
        &mut self,
        topic: Topic,
        parent_id: Option<TopicId>,
        origin: ChangeOrigin,
    ) -> Result<TopicId, StoreError> {
        if self.store.contains(topic.id) {
            return Err(StoreError::DuplicateId(topic.id));
        }
        if let Some(parent_id) = parent_id {
            if !self.store.contains(parent_id) {
                return Err(StoreError::NotFound(parent_id));
            }
        }

        self.save_history();
        let id = self.store.add(topic, parent_id)?;
        if let Some(topic) = self.store.get(id) {
            let event = DocumentEvent::TopicCreated {
                topic: topic.clone(),
                origin,
            };
            self.events.publish(&event);
        }
        Ok(id)
    }

    /// Returns whether the patch changed anything.
    pub(crate) fn update_topic_as(
        &mut self,
        id: TopicId,
        patch: &TopicPatch,
        origin: ChangeOrigin,
    ) -> Result<bool, StoreError> {
        let topic = self.store.get(id).ok_or(StoreError::NotFound(id))?;
        let mut preview = topic.clone();
        if !patch.apply_to(&mut preview) {
            return Ok(false);
        }

        self.save_history();
        self.store.update(id, |topic| {
            patch.apply_to(topic);
        })?;
        self.publish_updated(id, origin);
        Ok(true)
    }

    pub(crate) fn delete_topic_as(
        &mut self,
        id: TopicId,
        origin: ChangeOrigin,
    ) -> Result<Vec<TopicId>, StoreError> {
        let topic = self.store.get(id).ok_or(StoreError::NotFound(id))?;
        if topic.is_root() && self.store.roots().len() == 1 && !topic.has_subtopics() {
            return Ok(Vec::new());
        }

        self.save_history();
        let removed = self.store.delete(id)?;
        if self.selection.is_some_and(|selected| removed.contains(&selected)) {
            self.selection = None;
        }
        if self.editing.is_some_and(|editing| removed.contains(&editing)) {
            self.editing = None;
        }
        self.events.publish(&DocumentEvent::TopicDeleted {
            topic_id: id,
            removed: removed.clone(),
            origin,
        });
        Ok(removed)
    }

    /// Returns whether the position changed.
    pub(crate) fn move_topic_as(
        &mut self,
        id: TopicId,
        position: Position,
        origin: ChangeOrigin,
    ) -> Result<bool, StoreError> {
        let topic = self.store.get(id).ok_or(StoreError::NotFound(id))?;
        if topic.position == position {
            return Ok(false);
        }

        self.save_history();
        self.store.set_position(id, position)?;
        self.events.publish(&DocumentEvent::TopicMoved {
            topic_id: id,
            position,
            origin,
        });
        Ok(true)
    }

    pub(crate) fn add_relation_as(
        &mut self,
        a: TopicId,
        b: TopicId,
        origin: ChangeOrigin,
    ) -> Result<(), StoreError> {
        if a == b {
            return Err(StoreError::SelfReference(a));
        }
        let from = self.store.get(a).ok_or(StoreError::NotFound(a))?;
        let to = self.store.get(b).ok_or(StoreError::NotFound(b))?;
        if from.relations.contains(&b) && to.relations.contains(&a) {
            return Err(StoreError::DuplicateRelation { from: a, to: b });
        }

        self.save_history();
        self.store.add_relation(a, b)?;
        self.events.publish(&DocumentEvent::RelationAdded {
            from: a,
            to: b,
            origin,
        });
        Ok(())
    }

    /// Returns whether a relation was removed.
    pub(crate) fn remove_relation_as(
        &mut self,
        a: TopicId,
        b: TopicId,
        origin: ChangeOrigin,
    ) -> Result<bool, StoreError> {
        if a == b {
            return Err(StoreError::SelfReference(a));
        }
        let from = self.store.get(a).ok_or(StoreError::NotFound(a))?;
        let to = self.store.get(b).ok_or(StoreError::NotFound(b))?;
        if !from.relations.contains(&b) && !to.relations.contains(&a) {
            return Ok(false);
        }

        self.save_history();
        let removed = self.store.remove_relation(a, b)?;
        self.events.publish(&DocumentEvent::RelationRemoved {
            from: a,
            to: b,
            origin,
        });
        Ok(removed)
    }

    /// Re-parents `child_id` and places its subtree in the new parent's next
    /// child slot. Returns whether ownership changed.
    pub(crate) fn reparent_as(
        &mut self,
        child_id: TopicId,
        parent_id: TopicId,
        origin: ChangeOrigin,
    ) -> Result<bool, StoreError> {
        if child_id == parent_id {
            return Err(StoreError::SelfReference(child_id));
        }
        let child = self
            .store
            .get(child_id)
            .ok_or(StoreError::NotFound(child_id))?;
        if !self.store.contains(parent_id) {
            return Err(StoreError::NotFound(parent_id));
        }
        if self.store.is_ancestor(child_id, parent_id) {
            return Err(StoreError::Cycle {
                child: child_id,
                parent: parent_id,
            });
        }
        if child.parent_id == Some(parent_id) {
            return Ok(false);
        }
        let old_position = child.position;
        let slot = next_child_slot(&self.store, parent_id, &child.name, &self.config.layout);

        self.save_history();
        self.store.reparent(child_id, Some(parent_id))?;
        if let Some(slot) = slot {
            let dx = slot.x - old_position.x;
            let dy = slot.y - old_position.y;
            let mut subtree = vec![child_id];
            subtree.extend(self.store.descendants(child_id));
            for id in subtree {
                self.write_topic(id, |topic| topic.position = topic.position.offset(dx, dy));
            }
        }
        self.events.publish(&DocumentEvent::TopicReparented {
            topic_id: child_id,
            parent_id,
            origin,
        });
        Ok(true)
    }

    fn save_history(&mut self) {
        self.history.save(HistorySnapshot::capture(&self.store));
    }

    fn publish_updated(&mut self, id: TopicId, origin: ChangeOrigin) {
        if let Some(topic) = self.store.get(id) {
            let event = DocumentEvent::TopicUpdated {
                topic: topic.clone(),
                origin,
            };
            self.events.publish(&event);
        }
    }

    fn clear_selection_flags(&mut self) {
        if let Some(previous) = self.selection {
            self.write_topic(previous, |topic| {
                topic.is_selected = false;
                topic.is_editing = false;
            });
        }
        self.editing = None;
    }

    /// Writes to a topic whose id was checked by the caller.
    fn write_topic<F>(&mut self, id: TopicId, mutator: F)
    where
        F: FnOnce(&mut Topic),
    {
        if let Err(err) = self.store.update(id, mutator) {
            debug!("event=topic_write module=store status=skip topic={id} reason={err}");
        }
    }

    fn restore(&mut self, snapshot: HistorySnapshot, direction: HistoryDirection) {
        let before = std::mem::replace(&mut self.store, snapshot.into_store());
        self.editing = None;
        self.selection = self.selection.filter(|id| self.store.contains(*id));
        if let Some(id) = self.selection {
            self.write_topic(id, |topic| topic.is_selected = true);
        }
        let changes = restore_changes(&before, &self.store);
        info!(
            "event=history_restore module=history status=ok direction={:?} topics={} changes={}",
            direction,
            self.store.len(),
            changes.len()
        );
        for event in &changes {
            self.events.publish(event);
        }
        self.events
            .publish(&DocumentEvent::HistoryRestored { direction });
    }
}

/// Local change events that turn `before` into `after`.
///
/// Creations come first in pre-order so parents precede children, then
/// field changes, relation changes and finally deletions of the top-most
/// removed topics.
fn restore_changes(before: &TopicStore, after: &TopicStore) -> Vec<DocumentEvent> {
    let origin = ChangeOrigin::Local;
    let mut events = Vec::new();

    for topic in after.iter() {
        let Some(old) = before.get(topic.id) else {
            events.push(DocumentEvent::TopicCreated {
                topic: topic.clone(),
                origin,
            });
            continue;
        };
        if old.parent_id != topic.parent_id {
            if let Some(parent_id) = topic.parent_id {
                events.push(DocumentEvent::TopicReparented {
                    topic_id: topic.id,
                    parent_id,
                    origin,
                });
            }
        }
        if old.name != topic.name || old.style != topic.style {
            events.push(DocumentEvent::TopicUpdated {
                topic: topic.clone(),
                origin,
            });
        } else if old.position != topic.position {
            events.push(DocumentEvent::TopicMoved {
                topic_id: topic.id,
                position: topic.position,
                origin,
            });
        }
        if old.is_collapsed != topic.is_collapsed {
            events.push(DocumentEvent::CollapseToggled {
                topic_id: topic.id,
                collapsed: topic.is_collapsed,
            });
        }
    }

    let old_pairs: BTreeSet<_> = relation_sync::relation_pairs(before).into_iter().collect();
    let new_pairs: BTreeSet<_> = relation_sync::relation_pairs(after).into_iter().collect();
    // Pairs touching a removed topic disappear with the delete.
    for &(from, to) in old_pairs.difference(&new_pairs) {
        if after.contains(from) && after.contains(to) {
            events.push(DocumentEvent::RelationRemoved { from, to, origin });
        }
    }
    for &(from, to) in new_pairs.difference(&old_pairs) {
        events.push(DocumentEvent::RelationAdded { from, to, origin });
    }

    for topic in before.iter() {
        if after.contains(topic.id) {
            continue;
        }
        let parent_removed = topic
            .parent_id
            .is_some_and(|parent_id| !after.contains(parent_id));
        if parent_removed {
            continue;
        }
        let mut removed = vec![topic.id];
        removed.extend(
            before
                .descendants(topic.id)
                .into_iter()
                .filter(|id| !after.contains(*id)),
        );
        events.push(DocumentEvent::TopicDeleted {
            topic_id: topic.id,
            removed,
            origin,
        });
    }
    events
}

//! Arena-backed topic store with path addressing.
//!
//! # Responsibility
//! - Own every topic of a document and the ordered root sequence.
//! - Provide id- and path-addressed CRUD, reparenting and cascading delete.
//!
//! # Invariants
//! - Every topic has exactly one owner: the root list or one parent's
//!   `subtopics`. No id appears twice.
//! - No topic is its own ancestor; `reparent` checks before committing.
//! - All validation happens before the first write, so a rejected operation
//!   leaves the store untouched.
//! - Deleting the sole root while it has no subtopics is a no-op.

use crate::model::document::{DocumentTree, TopicNode};
use crate::model::path::TopicPath;
use crate::model::topic::{Position, Topic, TopicId};
use crate::repo::relation_sync;
use log::{debug, info};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by topic store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from topic store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Referenced topic does not exist.
    NotFound(TopicId),
    /// Reparenting would make `child` an ancestor of itself.
    Cycle { child: TopicId, parent: TopicId },
    /// Relation or reparent targets the topic itself.
    SelfReference(TopicId),
    /// Relation already exists.
    DuplicateRelation { from: TopicId, to: TopicId },
    /// A topic with the same id is already in the store.
    DuplicateId(TopicId),
    /// Structural invariant check failed.
    InvalidStructure(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "topic not found: {id}"),
            Self::Cycle { child, parent } => write!(
                f,
                "reparent would create cycle: topic {child} under descendant {parent}"
            ),
            Self::SelfReference(id) => write!(f, "topic cannot reference itself: {id}"),
            Self::DuplicateRelation { from, to } => {
                write!(f, "relation already exists: {from} -> {to}")
            }
            Self::DuplicateId(id) => write!(f, "topic id already present: {id}"),
            Self::InvalidStructure(message) => write!(f, "invalid topic tree: {message}"),
        }
    }
}

impl Error for StoreError {}

/// Canonical owner of a document's topics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicStore {
    topics: HashMap<TopicId, Topic>,
    roots: Vec<TopicId>,
}

impl TopicStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Ordered root (main) topic ids.
    pub fn roots(&self) -> &[TopicId] {
        &self.roots
    }

    pub fn contains(&self, id: TopicId) -> bool {
        self.topics.contains_key(&id)
    }

    pub fn get(&self, id: TopicId) -> Option<&Topic> {
        self.topics.get(&id)
    }

    /// Ordered children of `id`; empty when the topic is absent.
    pub fn children(&self, id: TopicId) -> &[TopicId] {
        self.topics
            .get(&id)
            .map(|topic| topic.subtopics.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn topics_mut(&mut self) -> &mut HashMap<TopicId, Topic> {
        &mut self.topics
    }

    /// Resolves the current address of `id` by walking parent links.
    pub fn find_path(&self, id: TopicId) -> Option<TopicPath> {
        let mut child_indices = Vec::new();
        let mut cursor = self.topics.get(&id)?;
        while let Some(parent_id) = cursor.parent_id {
            let parent = self.topics.get(&parent_id)?;
            let index = parent
                .subtopics
                .iter()
                .position(|child| *child == cursor.id)?;
            child_indices.push(index);
            cursor = parent;
        }
        let root_index = self.roots.iter().position(|root| *root == cursor.id)?;
        child_indices.reverse();
        Some(TopicPath {
            root_index,
            child_indices,
        })
    }

    /// Resolves a path back to the topic it addresses.
    pub fn topic_at(&self, path: &TopicPath) -> Option<&Topic> {
        let root_id = self.roots.get(path.root_index)?;
        let mut cursor = self.topics.get(root_id)?;
        for index in &path.child_indices {
            let child_id = cursor.subtopics.get(*index)?;
            cursor = self.topics.get(child_id)?;
        }
        Some(cursor)
    }

    /// Ids of all topics in pre-order, roots first in root order.
    pub fn all_ids(&self) -> Vec<TopicId> {
        let mut ids = Vec::with_capacity(self.topics.len());
        for root in &self.roots {
            self.collect_subtree(*root, &mut ids);
        }
        ids
    }

    /// Pre-order iterator over every topic.
    pub fn iter(&self) -> impl Iterator<Item = &Topic> + '_ {
        self.all_ids()
            .into_iter()
            .filter_map(move |id| self.topics.get(&id))
    }

    /// Descendant ids of `id` in pre-order, excluding `id` itself.
    pub fn descendants(&self, id: TopicId) -> Vec<TopicId> {
        let mut ids = Vec::new();
        if self.topics.contains_key(&id) {
            self.collect_subtree(id, &mut ids);
            ids.remove(0);
        }
        ids
    }

    /// Ancestor ids of `id`, nearest first.
    pub fn ancestors(&self, id: TopicId) -> Vec<TopicId> {
        let mut ids = Vec::new();
        let mut cursor = self.topics.get(&id).and_then(|topic| topic.parent_id);
        while let Some(current) = cursor {
            ids.push(current);
            cursor = self.topics.get(&current).and_then(|topic| topic.parent_id);
        }
        ids
    }

    /// Returns whether `ancestor` is a strict ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: TopicId, id: TopicId) -> bool {
        let mut visited = HashSet::new();
        let mut cursor = self.topics.get(&id).and_then(|topic| topic.parent_id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            if !visited.insert(current) {
                return false;
            }
            cursor = self.topics.get(&current).and_then(|topic| topic.parent_id);
        }
        false
    }

    /// Id of the root owning `id`.
    pub fn root_of(&self, id: TopicId) -> Option<TopicId> {
        if !self.topics.contains_key(&id) {
            return None;
        }
        Some(self.ancestors(id).last().copied().unwrap_or(id))
    }

    /// Inserts `topic` as a new leaf, appended to `parent_id`'s children or
    /// to the root list.
    ///
    /// Incoming `subtopics` and `relations` are cleared; structure is only
    /// ever built through store operations.
    pub fn add(&mut self, mut topic: Topic, parent_id: Option<TopicId>) -> StoreResult<TopicId> {
        let id = topic.id;
        if self.topics.contains_key(&id) {
            return Err(StoreError::DuplicateId(id));
        }
        if let Some(parent_id) = parent_id {
            if !self.topics.contains_key(&parent_id) {
                return Err(StoreError::NotFound(parent_id));
            }
        }

        topic.parent_id = parent_id;
        topic.subtopics.clear();
        topic.relations.clear();
        self.topics.insert(id, topic);
        match parent_id {
            Some(parent_id) => {
                if let Some(parent) = self.topics.get_mut(&parent_id) {
                    parent.subtopics.push(id);
                }
            }
            None => self.roots.push(id),
        }
        debug!(
            "event=topic_add module=store status=ok topic={} parent={}",
            id,
            parent_id.map(|value| value.to_string()).unwrap_or_default()
        );
        Ok(id)
    }

    /// Applies `mutator` to one topic in place.
    ///
    /// Identity and structural fields (`id`, `parent_id`, `subtopics`,
    /// `relations`) are restored after the mutator runs.
    pub fn update<F>(&mut self, id: TopicId, mutator: F) -> StoreResult<()>
    where
        F: FnOnce(&mut Topic),
    {
        let topic = self.topics.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let parent_id = topic.parent_id;
        let subtopics = std::mem::take(&mut topic.subtopics);
        let relations = std::mem::take(&mut topic.relations);

        mutator(topic);

        topic.id = id;
        topic.parent_id = parent_id;
        topic.subtopics = subtopics;
        topic.relations = relations;
        Ok(())
    }

    pub fn set_position(&mut self, id: TopicId, position: Position) -> StoreResult<()> {
        self.update(id, |topic| topic.position = position)
    }

    /// Deletes `id` and its whole subtree.
    ///
    /// Relations pointing at any removed topic are pruned tree-wide before
    /// the topic leaves its owner. Returns removed ids in pre-order; empty
    /// when the sole-root policy turned the call into a no-op.
    pub fn delete(&mut self, id: TopicId) -> StoreResult<Vec<TopicId>> {
        let topic = self.topics.get(&id).ok_or(StoreError::NotFound(id))?;
        if topic.is_root() && self.roots.len() == 1 && !topic.has_subtopics() {
            info!("event=topic_delete module=store status=skip reason=sole_empty_root topic={id}");
            return Ok(Vec::new());
        }
        let owner = topic.parent_id;

        let mut removed = Vec::new();
        self.collect_subtree(id, &mut removed);
        let removed_set: HashSet<TopicId> = removed.iter().copied().collect();

        relation_sync::prune_targets(&mut self.topics, &removed_set);
        match owner {
            Some(parent_id) => {
                if let Some(parent) = self.topics.get_mut(&parent_id) {
                    parent.subtopics.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }
        for removed_id in &removed {
            self.topics.remove(removed_id);
        }

        info!(
            "event=topic_delete module=store status=ok topic={} removed={}",
            id,
            removed.len()
        );
        Ok(removed)
    }

    /// Moves `child_id` under `new_parent_id`, or to the end of the root list
    /// when `new_parent_id` is `None`.
    ///
    /// Returns `Ok(false)` when the topic already has that owner.
    pub fn reparent(
        &mut self,
        child_id: TopicId,
        new_parent_id: Option<TopicId>,
    ) -> StoreResult<bool> {
        let child = self
            .topics
            .get(&child_id)
            .ok_or(StoreError::NotFound(child_id))?;
        let old_parent_id = child.parent_id;
        if let Some(parent_id) = new_parent_id {
            if parent_id == child_id {
                return Err(StoreError::SelfReference(child_id));
            }
            if !self.topics.contains_key(&parent_id) {
                return Err(StoreError::NotFound(parent_id));
            }
            if self.is_ancestor(child_id, parent_id) {
                return Err(StoreError::Cycle {
                    child: child_id,
                    parent: parent_id,
                });
            }
        }
        if old_parent_id == new_parent_id {
            return Ok(false);
        }

        match old_parent_id {
            Some(parent_id) => {
                if let Some(parent) = self.topics.get_mut(&parent_id) {
                    parent.subtopics.retain(|id| *id != child_id);
                }
            }
            None => self.roots.retain(|id| *id != child_id),
        }
        match new_parent_id {
            Some(parent_id) => {
                if let Some(parent) = self.topics.get_mut(&parent_id) {
                    parent.subtopics.push(child_id);
                }
            }
            None => self.roots.push(child_id),
        }
        if let Some(child) = self.topics.get_mut(&child_id) {
            child.parent_id = new_parent_id;
        }

        info!(
            "event=topic_reparent module=store status=ok topic={} parent={}",
            child_id,
            new_parent_id
                .map(|value| value.to_string())
                .unwrap_or_else(|| "root".to_string())
        );
        Ok(true)
    }

    /// Adds a symmetric relation between `a` and `b`.
    pub fn add_relation(&mut self, a: TopicId, b: TopicId) -> StoreResult<()> {
        relation_sync::connect(&mut self.topics, a, b)
    }

    /// Removes the symmetric relation between `a` and `b`.
    ///
    /// Returns whether either side held the relation.
    pub fn remove_relation(&mut self, a: TopicId, b: TopicId) -> StoreResult<bool> {
        relation_sync::disconnect(&mut self.topics, a, b)
    }

    /// Clears selection and editing flags on every topic.
    pub fn clear_transient(&mut self) {
        for topic in self.topics.values_mut() {
            topic.clear_transient();
        }
    }

    /// Exports the root sequence as nested nodes.
    pub fn to_document(&self) -> DocumentTree {
        DocumentTree {
            roots: self
                .roots
                .iter()
                .filter_map(|root| self.export_node(*root))
                .collect(),
        }
    }

    /// Rebuilds a store from an exported document.
    ///
    /// Transient flags start cleared. Relations are copied as given; callers
    /// run `relation_sync::repair` to restore symmetry.
    pub fn from_document(document: &DocumentTree) -> StoreResult<Self> {
        let mut store = Self::new();
        let mut pending: Vec<(&TopicNode, Option<TopicId>)> = document
            .roots
            .iter()
            .rev()
            .map(|node| (node, None))
            .collect();
        let mut relations = Vec::new();

        while let Some((node, parent_id)) = pending.pop() {
            let topic = Topic {
                id: node.id,
                name: node.name.clone(),
                position: node.position,
                parent_id: None,
                subtopics: Vec::new(),
                relations: BTreeSet::new(),
                style: node.style.clone(),
                is_collapsed: node.is_collapsed,
                is_selected: false,
                is_editing: false,
            };
            if node.id.is_nil() {
                return Err(StoreError::InvalidStructure(
                    "nil topic id in document".to_string(),
                ));
            }
            store.add(topic, parent_id)?;
            relations.push((node.id, node.relations.clone()));
            for child in node.subtopics.iter().rev() {
                pending.push((child, Some(node.id)));
            }
        }

        for (id, targets) in relations {
            if let Some(topic) = store.topics.get_mut(&id) {
                topic.relations = targets.into_iter().collect();
            }
        }
        Ok(store)
    }

    /// Verifies ownership, acyclicity and parent-link consistency.
    pub fn validate_structure(&self) -> StoreResult<()> {
        let mut owners: HashMap<TopicId, Option<TopicId>> = HashMap::new();
        for root in &self.roots {
            if owners.insert(*root, None).is_some() {
                return Err(StoreError::InvalidStructure(format!(
                    "topic {root} owned twice"
                )));
            }
        }
        for topic in self.topics.values() {
            for child in &topic.subtopics {
                if owners.insert(*child, Some(topic.id)).is_some() {
                    return Err(StoreError::InvalidStructure(format!(
                        "topic {child} owned twice"
                    )));
                }
            }
        }
        for topic in self.topics.values() {
            match owners.get(&topic.id) {
                None => {
                    return Err(StoreError::InvalidStructure(format!(
                        "topic {} has no owner",
                        topic.id
                    )))
                }
                Some(owner) if *owner != topic.parent_id => {
                    return Err(StoreError::InvalidStructure(format!(
                        "topic {} parent link disagrees with owner",
                        topic.id
                    )))
                }
                Some(_) => {}
            }
        }
        if owners.len() != self.topics.len() {
            return Err(StoreError::InvalidStructure(
                "owner list references missing topics".to_string(),
            ));
        }
        if self.all_ids().len() != self.topics.len() {
            return Err(StoreError::InvalidStructure(
                "topics unreachable from roots".to_string(),
            ));
        }
        Ok(())
    }

    fn collect_subtree(&self, id: TopicId, out: &mut Vec<TopicId>) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(topic) = self.topics.get(&current) else {
                continue;
            };
            out.push(current);
            stack.extend(topic.subtopics.iter().rev().copied());
        }
    }

    fn export_node(&self, id: TopicId) -> Option<TopicNode> {
        let topic = self.topics.get(&id)?;
        Some(TopicNode {
            id: topic.id,
            name: topic.name.clone(),
            position: topic.position,
            style: topic.style.clone(),
            is_collapsed: topic.is_collapsed,
            relations: topic.relations.iter().copied().collect(),
            subtopics: topic
                .subtopics
                .iter()
                .filter_map(|child| self.export_node(*child))
                .collect(),
        })
    }
}

//! Relation graph consistency.
//!
//! # Responsibility
//! - Keep relation sets symmetric: `a -> b` exists iff `b -> a` exists.
//! - Prune relations to deleted topics before they leave the arena.
//! - Detect and repair asymmetric or dangling entries after bulk loads.
//!
//! # Invariants
//! - `connect` and `disconnect` validate both endpoints before writing, so
//!   either both sides change or neither does.
//! - A relation never targets its own topic.

use crate::model::topic::{Topic, TopicId};
use crate::repo::topic_store::{StoreError, StoreResult, TopicStore};
use log::warn;
use std::collections::{HashMap, HashSet};

/// One relation entry that breaks graph consistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationIssue {
    /// `from` lists `to`, but `to` does not list `from`.
    Asymmetric { from: TopicId, to: TopicId },
    /// `from` lists a target that is not in the store.
    Dangling { from: TopicId, to: TopicId },
    /// Topic lists itself.
    SelfLoop(TopicId),
}

pub(crate) fn connect(
    topics: &mut HashMap<TopicId, Topic>,
    a: TopicId,
    b: TopicId,
) -> StoreResult<()> {
    if a == b {
        return Err(StoreError::SelfReference(a));
    }
    let from = topics.get(&a).ok_or(StoreError::NotFound(a))?;
    let to = topics.get(&b).ok_or(StoreError::NotFound(b))?;
    if from.relations.contains(&b) && to.relations.contains(&a) {
        return Err(StoreError::DuplicateRelation { from: a, to: b });
    }

    if let Some(topic) = topics.get_mut(&a) {
        topic.relations.insert(b);
    }
    if let Some(topic) = topics.get_mut(&b) {
        topic.relations.insert(a);
    }
    Ok(())
}

pub(crate) fn disconnect(
    topics: &mut HashMap<TopicId, Topic>,
    a: TopicId,
    b: TopicId,
) -> StoreResult<bool> {
    if a == b {
        return Err(StoreError::SelfReference(a));
    }
    if !topics.contains_key(&a) {
        return Err(StoreError::NotFound(a));
    }
    if !topics.contains_key(&b) {
        return Err(StoreError::NotFound(b));
    }

    let mut removed = false;
    if let Some(topic) = topics.get_mut(&a) {
        removed |= topic.relations.remove(&b);
    }
    if let Some(topic) = topics.get_mut(&b) {
        removed |= topic.relations.remove(&a);
    }
    Ok(removed)
}

/// Removes every id in `targets` from every relation set.
pub(crate) fn prune_targets(topics: &mut HashMap<TopicId, Topic>, targets: &HashSet<TopicId>) {
    if targets.is_empty() {
        return;
    }
    for topic in topics.values_mut() {
        topic.relations.retain(|target| !targets.contains(target));
    }
}

/// Lists every relation entry that breaks symmetry or points nowhere.
///
/// Output order follows the store's pre-order walk.
pub fn audit(store: &TopicStore) -> Vec<RelationIssue> {
    let mut issues = Vec::new();
    for topic in store.iter() {
        for target in &topic.relations {
            if *target == topic.id {
                issues.push(RelationIssue::SelfLoop(topic.id));
                continue;
            }
            match store.get(*target) {
                None => issues.push(RelationIssue::Dangling {
                    from: topic.id,
                    to: *target,
                }),
                Some(other) if !other.relations.contains(&topic.id) => {
                    issues.push(RelationIssue::Asymmetric {
                        from: topic.id,
                        to: *target,
                    })
                }
                Some(_) => {}
            }
        }
    }
    issues
}

/// Restores relation consistency in place.
///
/// Asymmetric entries gain their mirror; dangling and self entries are
/// dropped. Returns the number of issues fixed.
pub fn repair(store: &mut TopicStore) -> usize {
    let issues = audit(store);
    if issues.is_empty() {
        return 0;
    }

    let topics = store.topics_mut();
    for issue in &issues {
        match *issue {
            RelationIssue::Asymmetric { from, to } => {
                if let Some(topic) = topics.get_mut(&to) {
                    topic.relations.insert(from);
                }
            }
            RelationIssue::Dangling { from, to } => {
                if let Some(topic) = topics.get_mut(&from) {
                    topic.relations.remove(&to);
                }
            }
            RelationIssue::SelfLoop(id) => {
                if let Some(topic) = topics.get_mut(&id) {
                    topic.relations.remove(&id);
                }
            }
        }
    }

    warn!(
        "event=relation_repair module=store status=ok fixed={}",
        issues.len()
    );
    issues.len()
}

/// Relation pairs `(a, b)` with `a < b`, each listed once.
pub fn relation_pairs(store: &TopicStore) -> Vec<(TopicId, TopicId)> {
    let mut pairs = Vec::new();
    for topic in store.iter() {
        for target in &topic.relations {
            if topic.id < *target {
                pairs.push((topic.id, *target));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::{audit, repair, RelationIssue};
    use crate::model::topic::{Position, Topic, TopicStyle};
    use crate::repo::topic_store::{StoreError, TopicStore};

    fn store_with(names: &[&str]) -> (TopicStore, Vec<uuid::Uuid>) {
        let mut store = TopicStore::new();
        let ids = names
            .iter()
            .map(|name| {
                store
                    .add(
                        Topic::new(*name, Position::default(), TopicStyle::default()),
                        None,
                    )
                    .unwrap()
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn connect_rejects_missing_endpoint_without_writing() {
        let (mut store, ids) = store_with(&["a"]);
        let missing = uuid::Uuid::new_v4();

        let err = store.add_relation(ids[0], missing).unwrap_err();
        assert_eq!(err, StoreError::NotFound(missing));
        assert!(store.get(ids[0]).unwrap().relations.is_empty());
    }

    #[test]
    fn connect_completes_half_present_relation() {
        let (mut store, ids) = store_with(&["a", "b"]);
        store
            .topics_mut()
            .get_mut(&ids[0])
            .unwrap()
            .relations
            .insert(ids[1]);

        store.add_relation(ids[0], ids[1]).unwrap();
        assert!(audit(&store).is_empty());
    }

    #[test]
    fn repair_mirrors_and_drops() {
        let (mut store, ids) = store_with(&["a", "b"]);
        let ghost = uuid::Uuid::new_v4();
        {
            let topics = store.topics_mut();
            let a = topics.get_mut(&ids[0]).unwrap();
            a.relations.insert(ids[1]);
            a.relations.insert(ghost);
            a.relations.insert(ids[0]);
        }

        let issues = audit(&store);
        assert_eq!(issues.len(), 3);
        assert!(issues.contains(&RelationIssue::Asymmetric {
            from: ids[0],
            to: ids[1]
        }));
        assert!(issues.contains(&RelationIssue::Dangling {
            from: ids[0],
            to: ghost
        }));
        assert!(issues.contains(&RelationIssue::SelfLoop(ids[0])));

        assert_eq!(repair(&mut store), 3);
        assert!(audit(&store).is_empty());
        assert!(store.get(ids[1]).unwrap().relations.contains(&ids[0]));
    }
}

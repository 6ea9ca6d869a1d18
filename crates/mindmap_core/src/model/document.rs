//! Nested export form of a mind-map document.
//!
//! # Responsibility
//! - Hand the full root sequence, subtrees and relations to the external
//!   persistence collaborator as one serde value.
//!
//! # Invariants
//! - Transient flags are not part of this shape, so they always load as false.
//! - Child order is the order of `subtopics`.

use crate::model::topic::{Position, TopicId, TopicStyle};
use serde::{Deserialize, Serialize};

/// One exported topic with its owned subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicNode {
    pub id: TopicId,
    pub name: String,
    pub position: Position,
    #[serde(default)]
    pub style: TopicStyle,
    #[serde(default)]
    pub is_collapsed: bool,
    #[serde(default)]
    pub relations: Vec<TopicId>,
    #[serde(default)]
    pub subtopics: Vec<TopicNode>,
}

impl TopicNode {
    /// Number of topics in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .subtopics
            .iter()
            .map(TopicNode::subtree_len)
            .sum::<usize>()
    }
}

/// Full exported document: the ordered root sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentTree {
    pub roots: Vec<TopicNode>,
}

impl DocumentTree {
    pub fn topic_count(&self) -> usize {
        self.roots.iter().map(TopicNode::subtree_len).sum()
    }
}

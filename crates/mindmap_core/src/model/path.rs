//! Path addressing for topics.
//!
//! A `TopicPath` is only valid for the tree it was computed from. Any
//! structural mutation invalidates it; callers resolve a fresh path through
//! `TopicStore::find_path` at the start of each operation.

use std::fmt::{Display, Formatter};

/// Address of a topic: index of its root plus child indices descending from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPath {
    pub root_index: usize,
    pub child_indices: Vec<usize>,
}

impl TopicPath {
    pub fn root(root_index: usize) -> Self {
        Self {
            root_index,
            child_indices: Vec::new(),
        }
    }

    /// Number of edges between the root and the addressed topic.
    pub fn depth(&self) -> usize {
        self.child_indices.len()
    }

    pub fn is_root(&self) -> bool {
        self.child_indices.is_empty()
    }

    /// Path of the owning topic, or `None` for a root.
    pub fn parent(&self) -> Option<TopicPath> {
        if self.is_root() {
            return None;
        }
        let mut child_indices = self.child_indices.clone();
        child_indices.pop();
        Some(Self {
            root_index: self.root_index,
            child_indices,
        })
    }

    /// Path of the `index`-th child of the addressed topic.
    pub fn child(&self, index: usize) -> TopicPath {
        let mut child_indices = self.child_indices.clone();
        child_indices.push(index);
        Self {
            root_index: self.root_index,
            child_indices,
        }
    }

    /// Returns whether `self` addresses `other` or one of its ancestors.
    pub fn is_prefix_of(&self, other: &TopicPath) -> bool {
        self.root_index == other.root_index
            && other.child_indices.starts_with(self.child_indices.as_slice())
    }
}

impl Display for TopicPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.root_index)?;
        for index in &self.child_indices {
            write!(f, "/{index}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::TopicPath;

    #[test]
    fn parent_and_child_are_inverse() {
        let path = TopicPath::root(2).child(0).child(3);
        assert_eq!(path.to_string(), "2/0/3");
        assert_eq!(path.depth(), 2);
        assert_eq!(path.parent().unwrap().child(3), path);
        assert!(TopicPath::root(2).is_prefix_of(&path));
        assert!(!TopicPath::root(1).is_prefix_of(&path));
        assert_eq!(TopicPath::root(0).parent(), None);
    }
}

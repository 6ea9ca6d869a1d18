//! Recursive auto-layout.
//!
//! # Responsibility
//! - Assign a position to every visible topic from tree shape and box sizes.
//!
//! # Invariants
//! - Pure: reads the store, returns positions, never writes.
//! - The anchor keeps its current position exactly.
//! - Children sit strictly right of their parent, vertically centered on it.
//! - Descendants of collapsed topics are not positioned and take no space.

use crate::config::LayoutConfig;
use crate::layout::measure::{measure_text, BoxSize};
use crate::model::topic::{Position, TopicId};
use crate::repo::topic_store::TopicStore;
use std::collections::{BTreeMap, HashMap};

/// Output of one layout pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutResult {
    /// Anchor actually used for the pass.
    pub anchor: Option<TopicId>,
    /// New position of every positioned topic.
    pub positions: BTreeMap<TopicId, Position>,
}

impl LayoutResult {
    pub fn position_of(&self, id: TopicId) -> Option<Position> {
        self.positions.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct SubtreeMetrics {
    size: BoxSize,
    /// Visible descendant count.
    weight: usize,
    /// Vertical extent of the laid-out subtree.
    height: f64,
    /// Horizontal extent measured from the box's left edge.
    span: f64,
    /// Gap between this topic's child subtrees.
    child_spacing: f64,
}

struct LayoutPass<'a> {
    store: &'a TopicStore,
    config: &'a LayoutConfig,
    metrics: HashMap<TopicId, SubtreeMetrics>,
    positions: BTreeMap<TopicId, Position>,
}

/// Computes positions for every visible topic around `anchor`.
///
/// Falls back to the first root when `anchor` is `None` or absent.
pub fn compute_layout(
    store: &TopicStore,
    anchor: Option<TopicId>,
    config: &LayoutConfig,
) -> LayoutResult {
    let Some(first_root) = store.roots().first().copied() else {
        return LayoutResult::default();
    };
    let anchor_id = anchor
        .filter(|id| store.contains(*id))
        .unwrap_or(first_root);
    let anchor_root = store.root_of(anchor_id).unwrap_or(first_root);
    let anchor_index = store
        .roots()
        .iter()
        .position(|root| *root == anchor_root)
        .unwrap_or(0);

    let mut pass = LayoutPass {
        store,
        config,
        metrics: HashMap::new(),
        positions: BTreeMap::new(),
    };
    for root in store.roots() {
        pass.measure_subtree(*root);
    }

    let origin = topic_position(store, anchor_root);
    pass.place_subtree(anchor_root, origin);

    let mut previous = anchor_root;
    let mut previous_x = origin.x;
    for root in &store.roots()[anchor_index + 1..] {
        let x = previous_x
            + pass.right_extent(previous)
            + pass.root_gap(previous, *root)
            + pass.width(*root) / 2.0;
        pass.place_subtree(*root, Position::new(x, origin.y));
        previous = *root;
        previous_x = x;
    }

    let mut next = anchor_root;
    let mut next_x = origin.x;
    for root in store.roots()[..anchor_index].iter().rev() {
        let x = next_x
            - pass.width(next) / 2.0
            - pass.root_gap(*root, next)
            - pass.right_extent(*root);
        pass.place_subtree(*root, Position::new(x, origin.y));
        next = *root;
        next_x = x;
    }

    let mut positions = pass.positions;
    if anchor_id != anchor_root {
        let current = topic_position(store, anchor_id);
        if let Some(computed) = positions.get(&anchor_id).copied() {
            let dx = current.x - computed.x;
            let dy = current.y - computed.y;
            for position in positions.values_mut() {
                *position = position.offset(dx, dy);
            }
            positions.insert(anchor_id, current);
        }
    }

    LayoutResult {
        anchor: Some(anchor_id),
        positions,
    }
}

/// Position for a new last child of `parent_id` whose text is `name`.
///
/// Places the box right of the parent and one slot below the current last
/// child, without moving anything else.
pub fn next_child_slot(
    store: &TopicStore,
    parent_id: TopicId,
    name: &str,
    config: &LayoutConfig,
) -> Option<Position> {
    let parent = store.get(parent_id)?;
    let parent_size = measure_text(&parent.name, config);
    let size = measure_text(name, config);
    let x = parent.position.x
        + parent_size.width / 2.0
        + horizontal_gap(config, parent_size, size)
        + size.width / 2.0;

    let y = match parent.subtopics.last().and_then(|id| store.get(*id)) {
        Some(last) => {
            let last_size = measure_text(&last.name, config);
            last.position.y + last_size.height / 2.0 + config.vertical_spacing + size.height / 2.0
        }
        None => parent.position.y,
    };
    Some(Position::new(x, y))
}

fn topic_position(store: &TopicStore, id: TopicId) -> Position {
    store
        .get(id)
        .map(|topic| topic.position)
        .unwrap_or_default()
}

fn horizontal_gap(config: &LayoutConfig, parent: BoxSize, child: BoxSize) -> f64 {
    config.horizontal_spacing + config.width_factor * (parent.width + child.width)
}

impl LayoutPass<'_> {
    fn visible_children(&self, id: TopicId) -> &[TopicId] {
        match self.store.get(id) {
            Some(topic) if !topic.is_collapsed => topic.subtopics.as_slice(),
            _ => &[],
        }
    }

    fn measure_subtree(&mut self, id: TopicId) -> SubtreeMetrics {
        let name = self
            .store
            .get(id)
            .map(|topic| topic.name.as_str())
            .unwrap_or("");
        let size = measure_text(name, self.config);
        let children = self.visible_children(id).to_vec();

        let mut weight = 0usize;
        let mut children_height = 0.0;
        let mut widest_child = 0.0f64;
        for child in &children {
            let child_metrics = self.measure_subtree(*child);
            weight += 1 + child_metrics.weight;
            children_height += child_metrics.height;
            let reach = horizontal_gap(self.config, size, child_metrics.size) + child_metrics.span;
            widest_child = widest_child.max(reach);
        }

        let child_spacing = if weight > 0 {
            self.config.vertical_spacing
                * (1.0 + (weight as f64).ln() * self.config.weight_dampening)
        } else {
            self.config.vertical_spacing
        };
        let height = if children.is_empty() {
            size.height
        } else {
            let stacked = children_height + child_spacing * (children.len() - 1) as f64;
            stacked.max(size.height)
        };

        let metrics = SubtreeMetrics {
            size,
            weight,
            height,
            span: size.width + widest_child,
            child_spacing,
        };
        self.metrics.insert(id, metrics);
        metrics
    }

    fn metrics(&self, id: TopicId) -> SubtreeMetrics {
        self.metrics.get(&id).copied().unwrap_or(SubtreeMetrics {
            size: BoxSize {
                width: self.config.min_box_width,
                height: self.config.line_height,
            },
            weight: 0,
            height: self.config.line_height,
            span: self.config.min_box_width,
            child_spacing: self.config.vertical_spacing,
        })
    }

    fn width(&self, id: TopicId) -> f64 {
        self.metrics(id).size.width
    }

    /// Distance from the box center to the right edge of its subtree.
    fn right_extent(&self, id: TopicId) -> f64 {
        let metrics = self.metrics(id);
        metrics.span - metrics.size.width / 2.0
    }

    fn root_gap(&self, left: TopicId, right: TopicId) -> f64 {
        self.config.root_spacing + self.config.width_factor * (self.width(left) + self.width(right))
    }

    fn place_subtree(&mut self, id: TopicId, position: Position) {
        self.positions.insert(id, position);
        let children = self.visible_children(id).to_vec();
        if children.is_empty() {
            return;
        }

        let metrics = self.metrics(id);
        let stacked: f64 = children
            .iter()
            .map(|child| self.metrics(*child).height)
            .sum::<f64>()
            + metrics.child_spacing * (children.len() - 1) as f64;
        let mut top = position.y - stacked / 2.0;
        for child in children {
            let child_metrics = self.metrics(child);
            let x = position.x
                + metrics.size.width / 2.0
                + horizontal_gap(self.config, metrics.size, child_metrics.size)
                + child_metrics.size.width / 2.0;
            let y = top + child_metrics.height / 2.0;
            self.place_subtree(child, Position::new(x, y));
            top += child_metrics.height + metrics.child_spacing;
        }
    }
}

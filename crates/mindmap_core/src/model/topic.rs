//! Topic domain model.
//!
//! # Responsibility
//! - Define the node record owned by the topic arena.
//! - Provide the partial-update (`TopicPatch`) shape used by local and remote edits.
//!
//! # Invariants
//! - `id` is stable and never reused for another topic.
//! - `subtopics` and `parent_id` are maintained by the store only; callers
//!   mutate them exclusively through store operations.
//! - `is_selected` / `is_editing` are transient and never serialized.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static LINE_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r\n?").expect("valid line break regex"));
static TRAILING_SPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)[ \t]+$").expect("valid trailing space regex"));

/// Stable identifier for every topic in a document.
pub type TopicId = Uuid;

/// 2-D center position of a topic box in canvas units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns this position shifted by `(dx, dy)`.
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Outline drawn around a topic. Opaque to the core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicShape {
    #[default]
    RoundedRectangle,
    Rectangle,
    Capsule,
    Ellipse,
    Underline,
}

/// Presentation payload carried by each topic.
///
/// The core copies and stores these values but never interprets them; layout
/// only looks at the display text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicStyle {
    pub shape: TopicShape,
    /// Fill color as `#RRGGBB`.
    pub background_color: String,
    /// Border color as `#RRGGBB`.
    pub border_color: String,
    pub font_family: String,
    pub font_size: u16,
    pub bold: bool,
}

impl Default for TopicStyle {
    fn default() -> Self {
        Self {
            shape: TopicShape::RoundedRectangle,
            background_color: "#FFFFFF".to_string(),
            border_color: "#3B82F6".to_string(),
            font_family: "system".to_string(),
            font_size: 14,
            bold: false,
        }
    }
}

/// Validation errors for topic construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicValidationError {
    /// Nil UUID cannot identify a topic.
    NilId,
}

impl Display for TopicValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "topic id must not be nil"),
        }
    }
}

impl Error for TopicValidationError {}

/// One node of the mind-map tree.
///
/// Children are referenced by id; the arena in `TopicStore` is the sole owner
/// of every topic value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// Stable global ID used for relations, sync envelopes and history.
    pub id: TopicId,
    /// User-facing label. May span several lines.
    pub name: String,
    /// Center of the topic box.
    pub position: Position,
    /// Owner of this topic. `None` means root (main) topic.
    pub parent_id: Option<TopicId>,
    /// Ordered, exclusively owned children.
    pub subtopics: Vec<TopicId>,
    /// Relation targets. Weak references, never ownership.
    pub relations: BTreeSet<TopicId>,
    pub style: TopicStyle,
    /// Collapsed topics hide their descendants from layout.
    pub is_collapsed: bool,
    #[serde(skip)]
    pub is_selected: bool,
    #[serde(skip)]
    pub is_editing: bool,
}

impl Topic {
    /// Creates a detached leaf topic with a generated ID.
    pub fn new(name: impl Into<String>, position: Position, style: TopicStyle) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: normalize_topic_name(&name.into()),
            position,
            parent_id: None,
            subtopics: Vec::new(),
            relations: BTreeSet::new(),
            style,
            is_collapsed: false,
            is_selected: false,
            is_editing: false,
        }
    }

    /// Creates a detached leaf topic with a caller-provided ID.
    ///
    /// Used by remote-change and import paths where identity already exists.
    pub fn with_id(
        id: TopicId,
        name: impl Into<String>,
        position: Position,
        style: TopicStyle,
    ) -> Result<Self, TopicValidationError> {
        if id.is_nil() {
            return Err(TopicValidationError::NilId);
        }
        let mut topic = Self::new(name, position, style);
        topic.id = id;
        Ok(topic)
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn has_subtopics(&self) -> bool {
        !self.subtopics.is_empty()
    }

    /// Resets selection and editing flags.
    pub fn clear_transient(&mut self) {
        self.is_selected = false;
        self.is_editing = false;
    }
}

/// Partial update applied by `update_topic` and remote `update` envelopes.
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicPatch {
    pub name: Option<String>,
    pub position: Option<Position>,
    pub style: Option<TopicStyle>,
    /// Shorthand for `style.background_color`; applied after `style`.
    pub color: Option<String>,
    pub is_collapsed: Option<bool>,
}

impl TopicPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.position.is_none()
            && self.style.is_none()
            && self.color.is_none()
            && self.is_collapsed.is_none()
    }

    pub fn name(value: impl Into<String>) -> Self {
        Self {
            name: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn color(value: impl Into<String>) -> Self {
        Self {
            color: Some(value.into()),
            ..Self::default()
        }
    }

    /// Applies this patch and reports whether any field changed.
    pub fn apply_to(&self, topic: &mut Topic) -> bool {
        let mut changed = false;
        if let Some(name) = &self.name {
            let normalized = normalize_topic_name(name);
            if topic.name != normalized {
                topic.name = normalized;
                changed = true;
            }
        }
        if let Some(position) = self.position {
            if topic.position != position {
                topic.position = position;
                changed = true;
            }
        }
        if let Some(style) = &self.style {
            if &topic.style != style {
                topic.style = style.clone();
                changed = true;
            }
        }
        if let Some(color) = &self.color {
            if &topic.style.background_color != color {
                topic.style.background_color = color.clone();
                changed = true;
            }
        }
        if let Some(collapsed) = self.is_collapsed {
            if topic.is_collapsed != collapsed {
                topic.is_collapsed = collapsed;
                changed = true;
            }
        }
        changed
    }
}

/// Normalizes line endings to `\n` and strips trailing blanks on each line.
pub fn normalize_topic_name(value: &str) -> String {
    let unified = LINE_BREAK_RE.replace_all(value, "\n");
    TRAILING_SPACE_RE.replace_all(&unified, "").into_owned()
}

//! Engine configuration.
//!
//! # Responsibility
//! - Collect every tunable of history, layout, collaboration and topic
//!   creation defaults into one explicit value threaded through the engine.
//!
//! # Invariants
//! - Every field has a default; partial JSON documents are accepted.
//! - `validate()` must pass before a config drives an engine.

use crate::model::topic::TopicStyle;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Smallest accepted history depth: one pre-image plus the live tip.
pub const MIN_HISTORY_DEPTH: usize = 2;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Input is not valid JSON for `EngineConfig`.
    Parse(String),
    /// A field holds an unusable value.
    Invalid {
        field: &'static str,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "invalid engine config: {message}"),
            Self::Invalid { field, reason } => {
                write!(f, "invalid engine config field `{field}`: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Undo/redo settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of retained snapshots.
    pub max_depth: usize,
    /// Minimum spacing between two text-edit history saves.
    pub text_edit_interval_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: 50,
            text_edit_interval_ms: 1_000,
        }
    }
}

impl HistoryConfig {
    pub fn text_edit_interval(&self) -> Duration {
        Duration::from_millis(self.text_edit_interval_ms)
    }
}

/// Auto-layout metrics, all in canvas units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Advance of one character.
    pub char_width: f64,
    pub line_height: f64,
    pub padding_x: f64,
    pub padding_y: f64,
    pub min_box_width: f64,
    /// Gap between sibling subtrees before weight dampening.
    pub vertical_spacing: f64,
    /// Gap between a parent box and its children's boxes.
    pub horizontal_spacing: f64,
    /// Gap between adjacent root subtrees.
    pub root_spacing: f64,
    /// Share of the two adjacent box widths added to horizontal gaps.
    pub width_factor: f64,
    /// `k` in `spacing * (1 + ln(weight) * k)`.
    pub weight_dampening: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            line_height: 20.0,
            padding_x: 16.0,
            padding_y: 10.0,
            min_box_width: 60.0,
            vertical_spacing: 20.0,
            horizontal_spacing: 40.0,
            root_spacing: 80.0,
            width_factor: 0.1,
            weight_dampening: 0.25,
        }
    }
}

/// Collaboration transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Consecutive failed connects tolerated before the session reports failure.
    pub max_reconnect_attempts: u32,
    /// Base of the backoff: attempt `n` waits `base * 2^n`.
    pub backoff_base_ms: u64,
    pub heartbeat_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            backoff_base_ms: 1_000,
            heartbeat_interval_ms: 30_000,
        }
    }
}

impl SessionConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

/// Values used when topics are created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicDefaults {
    pub main_topic_name: String,
    pub subtopic_name: String,
    /// Style given to new main topics. Subtopics inherit from their parent.
    pub style: TopicStyle,
}

impl Default for TopicDefaults {
    fn default() -> Self {
        Self {
            main_topic_name: "Main Topic".to_string(),
            subtopic_name: "Subtopic".to_string(),
            style: TopicStyle::default(),
        }
    }
}

/// Root configuration value for one mind-map engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub history: HistoryConfig,
    pub layout: LayoutConfig,
    pub session: SessionConfig,
    pub defaults: TopicDefaults,
}

impl EngineConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(input).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history.max_depth < MIN_HISTORY_DEPTH {
            return Err(ConfigError::Invalid {
                field: "history.max_depth",
                reason: format!("must be at least {MIN_HISTORY_DEPTH}"),
            });
        }

        let layout = &self.layout;
        let non_negative = [
            ("layout.char_width", layout.char_width),
            ("layout.line_height", layout.line_height),
            ("layout.padding_x", layout.padding_x),
            ("layout.padding_y", layout.padding_y),
            ("layout.min_box_width", layout.min_box_width),
            ("layout.vertical_spacing", layout.vertical_spacing),
            ("layout.horizontal_spacing", layout.horizontal_spacing),
            ("layout.root_spacing", layout.root_spacing),
            ("layout.width_factor", layout.width_factor),
            ("layout.weight_dampening", layout.weight_dampening),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be a finite non-negative number, got {value}"),
                });
            }
        }

        if self.session.max_reconnect_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "session.max_reconnect_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.session.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "session.heartbeat_interval_ms",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

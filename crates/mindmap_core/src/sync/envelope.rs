//! Collaboration wire envelope.
//!
//! # Responsibility
//! - Define the JSON envelope `{type, topicId, properties}` exchanged with
//!   collaborators and its text/binary frame encoding.
//! - Translate an envelope into one validated `RemoteCommand` before anything
//!   touches the document.
//!
//! # Invariants
//! - Unknown property keys are ignored.
//! - A known key with the wrong JSON shape makes the envelope malformed.
//! - Required keys are checked per change type; a malformed envelope yields
//!   no command at all.

use crate::model::topic::{Position, Topic, TopicId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub const PROP_NAME: &str = "name";
pub const PROP_POSITION: &str = "position";
pub const PROP_PARENT_ID: &str = "parentId";
pub const PROP_CHILD_ID: &str = "childId";
pub const PROP_COLOR: &str = "color";

/// Kind of change carried by an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
    Move,
    Connect,
    Disconnect,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Move => "move",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
        }
    }
}

/// One serialized change message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEnvelope {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub topic_id: TopicId,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Transport frame carrying one encoded envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Why an envelope could not be turned into a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedEnvelope {
    /// Required property is absent.
    MissingProperty {
        change_type: ChangeType,
        property: &'static str,
    },
    /// Property is present but has the wrong shape.
    InvalidProperty {
        property: &'static str,
        reason: String,
    },
    /// Update carried no property the engine understands.
    EmptyUpdate,
    /// Topic id is nil.
    NilTopicId,
}

impl Display for MalformedEnvelope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingProperty {
                change_type,
                property,
            } => write!(
                f,
                "`{}` envelope is missing `{property}`",
                change_type.as_str()
            ),
            Self::InvalidProperty { property, reason } => {
                write!(f, "invalid `{property}` property: {reason}")
            }
            Self::EmptyUpdate => write!(f, "`update` envelope carries no known property"),
            Self::NilTopicId => write!(f, "envelope topic id must not be nil"),
        }
    }
}

impl Error for MalformedEnvelope {}

/// Frame encode/decode failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Frame body is not a valid envelope.
    Decode(String),
    /// Envelope could not be serialized.
    Encode(String),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(message) => write!(f, "failed to decode envelope: {message}"),
            Self::Encode(message) => write!(f, "failed to encode envelope: {message}"),
        }
    }
}

impl Error for CodecError {}

/// Validated, typed form of one envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCommand {
    Create {
        topic_id: TopicId,
        name: Option<String>,
        position: Position,
        parent_id: Option<TopicId>,
        color: Option<String>,
    },
    Update {
        topic_id: TopicId,
        name: Option<String>,
        position: Option<Position>,
        color: Option<String>,
    },
    Delete {
        topic_id: TopicId,
    },
    Move {
        topic_id: TopicId,
        position: Position,
    },
    Connect {
        topic_id: TopicId,
        other_id: TopicId,
    },
    Disconnect {
        topic_id: TopicId,
        other_id: TopicId,
    },
}

impl RemoteCommand {
    pub fn topic_id(&self) -> TopicId {
        match self {
            Self::Create { topic_id, .. }
            | Self::Update { topic_id, .. }
            | Self::Delete { topic_id }
            | Self::Move { topic_id, .. }
            | Self::Connect { topic_id, .. }
            | Self::Disconnect { topic_id, .. } => *topic_id,
        }
    }
}

impl ChangeEnvelope {
    pub fn new(change_type: ChangeType, topic_id: TopicId) -> Self {
        Self {
            change_type,
            topic_id,
            properties: Map::new(),
        }
    }

    /// Adds one property, replacing an existing value.
    pub fn with_property(mut self, key: &str, value: Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    /// Envelope announcing a newly created topic.
    pub fn create(topic: &Topic) -> Self {
        let mut envelope = Self::new(ChangeType::Create, topic.id)
            .with_property(PROP_NAME, Value::String(topic.name.clone()))
            .with_property(PROP_POSITION, position_value(topic.position))
            .with_property(
                PROP_COLOR,
                Value::String(topic.style.background_color.clone()),
            );
        if let Some(parent_id) = topic.parent_id {
            envelope = envelope.with_property(PROP_PARENT_ID, Value::String(parent_id.to_string()));
        }
        envelope
    }

    /// Envelope carrying a topic's current name, position and color.
    pub fn update(topic: &Topic) -> Self {
        Self::new(ChangeType::Update, topic.id)
            .with_property(PROP_NAME, Value::String(topic.name.clone()))
            .with_property(PROP_POSITION, position_value(topic.position))
            .with_property(
                PROP_COLOR,
                Value::String(topic.style.background_color.clone()),
            )
    }

    pub fn delete(topic_id: TopicId) -> Self {
        Self::new(ChangeType::Delete, topic_id)
    }

    pub fn moved(topic_id: TopicId, position: Position) -> Self {
        Self::new(ChangeType::Move, topic_id).with_property(PROP_POSITION, position_value(position))
    }

    pub fn connect(topic_id: TopicId, other_id: TopicId) -> Self {
        Self::new(ChangeType::Connect, topic_id)
            .with_property(PROP_CHILD_ID, Value::String(other_id.to_string()))
    }

    pub fn disconnect(topic_id: TopicId, other_id: TopicId) -> Self {
        Self::new(ChangeType::Disconnect, topic_id)
            .with_property(PROP_CHILD_ID, Value::String(other_id.to_string()))
    }

    /// Validates this envelope into a command.
    pub fn to_command(&self) -> Result<RemoteCommand, MalformedEnvelope> {
        if self.topic_id.is_nil() {
            return Err(MalformedEnvelope::NilTopicId);
        }
        let topic_id = self.topic_id;
        let name = self.string_property(PROP_NAME)?;
        let position = self.position_property()?;
        let color = self.string_property(PROP_COLOR)?;

        match self.change_type {
            ChangeType::Create => Ok(RemoteCommand::Create {
                topic_id,
                name,
                position: position.ok_or(self.missing(PROP_POSITION))?,
                parent_id: self.id_property(PROP_PARENT_ID)?,
                color,
            }),
            ChangeType::Update => {
                if name.is_none() && position.is_none() && color.is_none() {
                    return Err(MalformedEnvelope::EmptyUpdate);
                }
                Ok(RemoteCommand::Update {
                    topic_id,
                    name,
                    position,
                    color,
                })
            }
            ChangeType::Delete => Ok(RemoteCommand::Delete { topic_id }),
            ChangeType::Move => Ok(RemoteCommand::Move {
                topic_id,
                position: position.ok_or(self.missing(PROP_POSITION))?,
            }),
            ChangeType::Connect => Ok(RemoteCommand::Connect {
                topic_id,
                other_id: self
                    .id_property(PROP_CHILD_ID)?
                    .ok_or(self.missing(PROP_CHILD_ID))?,
            }),
            ChangeType::Disconnect => Ok(RemoteCommand::Disconnect {
                topic_id,
                other_id: self
                    .id_property(PROP_CHILD_ID)?
                    .ok_or(self.missing(PROP_CHILD_ID))?,
            }),
        }
    }

    /// Encodes this envelope as a JSON text frame.
    pub fn encode(&self) -> Result<Frame, CodecError> {
        serde_json::to_string(self)
            .map(Frame::Text)
            .map_err(|err| CodecError::Encode(err.to_string()))
    }

    /// Decodes a text or binary JSON frame.
    pub fn decode(frame: &Frame) -> Result<Self, CodecError> {
        let decoded = match frame {
            Frame::Text(text) => serde_json::from_str(text),
            Frame::Binary(bytes) => serde_json::from_slice(bytes),
        };
        decoded.map_err(|err| CodecError::Decode(err.to_string()))
    }

    fn missing(&self, property: &'static str) -> MalformedEnvelope {
        MalformedEnvelope::MissingProperty {
            change_type: self.change_type,
            property,
        }
    }

    fn string_property(&self, key: &'static str) -> Result<Option<String>, MalformedEnvelope> {
        match self.properties.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(other) => Err(MalformedEnvelope::InvalidProperty {
                property: key,
                reason: format!("expected string, got {other}"),
            }),
        }
    }

    fn id_property(&self, key: &'static str) -> Result<Option<TopicId>, MalformedEnvelope> {
        let Some(raw) = self.string_property(key)? else {
            return Ok(None);
        };
        match Uuid::parse_str(raw.trim()) {
            Ok(id) if !id.is_nil() => Ok(Some(id)),
            Ok(_) => Err(MalformedEnvelope::InvalidProperty {
                property: key,
                reason: "nil uuid".to_string(),
            }),
            Err(err) => Err(MalformedEnvelope::InvalidProperty {
                property: key,
                reason: err.to_string(),
            }),
        }
    }

    fn position_property(&self) -> Result<Option<Position>, MalformedEnvelope> {
        match self.properties.get(PROP_POSITION) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => {
                let position: Position = serde_json::from_value(value.clone()).map_err(|err| {
                    MalformedEnvelope::InvalidProperty {
                        property: PROP_POSITION,
                        reason: err.to_string(),
                    }
                })?;
                if !position.x.is_finite() || !position.y.is_finite() {
                    return Err(MalformedEnvelope::InvalidProperty {
                        property: PROP_POSITION,
                        reason: "coordinates must be finite".to_string(),
                    });
                }
                Ok(Some(position))
            }
        }
    }
}

fn position_value(position: Position) -> Value {
    serde_json::json!({ "x": position.x, "y": position.y })
}

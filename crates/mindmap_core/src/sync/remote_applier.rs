//! Remote change application.
//!
//! # Responsibility
//! - Translate each inbound envelope into exactly one document operation.
//! - Drain the inbound channel on the thread that owns the document, so
//!   remote edits interleave with local ones only at operation boundaries.
//!
//! # Invariants
//! - Remote edits run through the same `MindMap` paths as local edits and
//!   therefore the same acyclicity and relation-symmetry checks.
//! - Re-applying `create` for an existing id, or `delete` for an absent id,
//!   is a no-op.
//! - Malformed envelopes are rejected before any mutation and reported.
//! - Conflicts resolve last-write-wins in arrival order.

use crate::model::topic::{Topic, TopicId, TopicPatch};
use crate::repo::topic_store::StoreError;
use crate::service::events::ChangeOrigin;
use crate::service::mind_map::MindMap;
use crate::sync::envelope::{ChangeEnvelope, CodecError, Frame, MalformedEnvelope, RemoteCommand};
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;

/// Why an envelope was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// Envelope lacks required properties or carries invalid ones.
    Malformed(MalformedEnvelope),
    /// Envelope references a topic that does not exist.
    NotFound(TopicId),
    /// Store rejected the operation (cycle, self-reference, ...).
    Store(StoreError),
    /// Frame body could not be decoded.
    Decode(CodecError),
}

impl Display for ApplyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(err) => write!(f, "malformed envelope: {err}"),
            Self::NotFound(id) => write!(f, "envelope references missing topic: {id}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Decode(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ApplyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Malformed(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Decode(err) => Some(err),
            Self::NotFound(_) => None,
        }
    }
}

impl From<MalformedEnvelope> for ApplyError {
    fn from(value: MalformedEnvelope) -> Self {
        Self::Malformed(value)
    }
}

impl From<CodecError> for ApplyError {
    fn from(value: CodecError) -> Self {
        Self::Decode(value)
    }
}

impl From<StoreError> for ApplyError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Why an envelope caused no change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// `create` for an id already in the document.
    AlreadyExists,
    /// `delete` for an id not in the document.
    AlreadyAbsent,
    /// Target state already matches the envelope.
    NoChange,
}

/// Successful result of applying one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(TopicId),
    Skipped { topic_id: TopicId, reason: SkipReason },
}

/// Counters for a batch of applied envelopes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub skipped: usize,
    pub dropped: usize,
    /// Errors of dropped envelopes, in arrival order.
    pub errors: Vec<ApplyError>,
}

impl ApplyReport {
    pub fn total(&self) -> usize {
        self.applied + self.skipped + self.dropped
    }

    fn record(&mut self, result: Result<ApplyOutcome, ApplyError>) {
        match result {
            Ok(ApplyOutcome::Applied(_)) => self.applied += 1,
            Ok(ApplyOutcome::Skipped { .. }) => self.skipped += 1,
            Err(err) => {
                self.dropped += 1;
                self.errors.push(err);
            }
        }
    }
}

/// Applies remote envelopes to a document.
#[derive(Debug, Default)]
pub struct RemoteChangeApplier {
    totals: ApplyReport,
}

impl RemoteChangeApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cumulative counters since construction.
    pub fn totals(&self) -> &ApplyReport {
        &self.totals
    }

    /// Applies one envelope. Dropped envelopes are logged and returned as errors.
    pub fn apply(
        &mut self,
        document: &mut MindMap,
        envelope: &ChangeEnvelope,
    ) -> Result<ApplyOutcome, ApplyError> {
        let result = envelope
            .to_command()
            .map_err(ApplyError::from)
            .and_then(|command| execute(document, command));
        match &result {
            Ok(outcome) => debug!(
                "event=remote_apply module=remote status=ok type={} topic={} outcome={:?}",
                envelope.change_type.as_str(),
                envelope.topic_id,
                outcome
            ),
            Err(err) => warn!(
                "event=remote_apply module=remote status=error type={} topic={} error={}",
                envelope.change_type.as_str(),
                envelope.topic_id,
                err
            ),
        }
        self.totals.record(result.clone());
        result
    }

    /// Decodes and applies one transport frame.
    pub fn apply_frame(
        &mut self,
        document: &mut MindMap,
        frame: &Frame,
    ) -> Result<ApplyOutcome, ApplyError> {
        match ChangeEnvelope::decode(frame) {
            Ok(envelope) => self.apply(document, &envelope),
            Err(err) => {
                warn!("event=remote_decode module=remote status=error error={err}");
                let err = ApplyError::from(err);
                self.totals.record(Err(err.clone()));
                Err(err)
            }
        }
    }

    /// Applies envelopes in order, continuing past dropped ones.
    pub fn apply_all<'a, I>(&mut self, document: &mut MindMap, envelopes: I) -> ApplyReport
    where
        I: IntoIterator<Item = &'a ChangeEnvelope>,
    {
        let mut report = ApplyReport::default();
        for envelope in envelopes {
            report.record(self.apply(document, envelope));
        }
        report
    }

    /// Applies every envelope currently queued on `inbound` without waiting.
    ///
    /// Call from the document's owning loop tick.
    pub fn drain(
        &mut self,
        document: &mut MindMap,
        inbound: &mut UnboundedReceiver<ChangeEnvelope>,
    ) -> ApplyReport {
        let mut report = ApplyReport::default();
        loop {
            match inbound.try_recv() {
                Ok(envelope) => report.record(self.apply(document, &envelope)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        report
    }
}

fn execute(document: &mut MindMap, command: RemoteCommand) -> Result<ApplyOutcome, ApplyError> {
    let origin = ChangeOrigin::Remote;
    match command {
        RemoteCommand::Create {
            topic_id,
            name,
            position,
            parent_id,
            color,
        } => {
            if document.topic(topic_id).is_some() {
                return Ok(skipped(topic_id, SkipReason::AlreadyExists));
            }
            let mut style = match parent_id.and_then(|id| document.topic(id)) {
                Some(parent) => parent.style.clone(),
                None => document.config().defaults.style.clone(),
            };
            if let Some(color) = color {
                style.background_color = color;
            }
            let name = name.unwrap_or_else(|| match parent_id {
                Some(_) => document.config().defaults.subtopic_name.clone(),
                None => document.config().defaults.main_topic_name.clone(),
            });
            let topic = Topic::with_id(topic_id, name, position, style)
                .map_err(|_| ApplyError::Malformed(MalformedEnvelope::NilTopicId))?;
            document.create_topic_as(topic, parent_id, origin)?;
            Ok(ApplyOutcome::Applied(topic_id))
        }
        RemoteCommand::Update {
            topic_id,
            name,
            position,
            color,
        } => {
            let patch = TopicPatch {
                name,
                position,
                color,
                ..TopicPatch::default()
            };
            changed(topic_id, document.update_topic_as(topic_id, &patch, origin)?)
        }
        RemoteCommand::Delete { topic_id } => {
            if document.topic(topic_id).is_none() {
                return Ok(skipped(topic_id, SkipReason::AlreadyAbsent));
            }
            let removed = document.delete_topic_as(topic_id, origin)?;
            changed(topic_id, !removed.is_empty())
        }
        RemoteCommand::Move { topic_id, position } => {
            changed(topic_id, document.move_topic_as(topic_id, position, origin)?)
        }
        RemoteCommand::Connect { topic_id, other_id } => {
            match document.add_relation_as(topic_id, other_id, origin) {
                Ok(()) => Ok(ApplyOutcome::Applied(topic_id)),
                Err(StoreError::DuplicateRelation { .. }) => {
                    Ok(skipped(topic_id, SkipReason::NoChange))
                }
                Err(err) => Err(err.into()),
            }
        }
        RemoteCommand::Disconnect { topic_id, other_id } => changed(
            topic_id,
            document.remove_relation_as(topic_id, other_id, origin)?,
        ),
    }
}

fn changed(topic_id: TopicId, changed: bool) -> Result<ApplyOutcome, ApplyError> {
    if changed {
        Ok(ApplyOutcome::Applied(topic_id))
    } else {
        Ok(skipped(topic_id, SkipReason::NoChange))
    }
}

fn skipped(topic_id: TopicId, reason: SkipReason) -> ApplyOutcome {
    ApplyOutcome::Skipped { topic_id, reason }
}

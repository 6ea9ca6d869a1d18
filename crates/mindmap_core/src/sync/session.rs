//! Collaboration session loop.
//!
//! # Responsibility
//! - Drive one persistent transport: connect, heartbeat, decode inbound
//!   frames into envelopes, encode outbound envelopes into frames.
//! - Reconnect with exponential backoff and give up after a bounded number
//!   of consecutive failures.
//!
//! # Invariants
//! - The session never touches the document; inbound envelopes go to a
//!   channel drained by the document's owning loop.
//! - `disconnect()` halts the backoff wait and heartbeat at once.
//! - A connect attempt already in flight when `disconnect()` is called runs
//!   to completion, but its result is discarded.
//! - A lost link is closed before the next connect attempt.

use crate::config::SessionConfig;
use crate::sync::envelope::{ChangeEnvelope, Frame};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Connection-level failures. Never surfaced to the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection could not be established.
    ConnectFailed(String),
    /// Established connection dropped.
    ConnectionLost(String),
    /// Peer closed the connection.
    Closed,
    /// Lower-level I/O failure.
    Io(String),
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectFailed(message) => write!(f, "connect failed: {message}"),
            Self::ConnectionLost(message) => write!(f, "connection lost: {message}"),
            Self::Closed => write!(f, "connection closed by peer"),
            Self::Io(message) => write!(f, "transport i/o error: {message}"),
        }
    }
}

impl Error for TransportError {}

/// Persistent bidirectional frame transport (e.g. a WebSocket client).
#[async_trait]
pub trait Transport: Send + 'static {
    async fn connect(&mut self) -> Result<(), TransportError>;
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;
    /// Waits for the next frame. Must be cancel-safe: it is raced against
    /// heartbeat, outbound traffic and cancellation.
    async fn recv(&mut self) -> Result<Frame, TransportError>;
    async fn ping(&mut self) -> Result<(), TransportError>;
    async fn close(&mut self);
}

/// Exponential reconnect delays with a bounded attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base: Duration,
    max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            Duration::from_millis(config.backoff_base_ms),
            config.max_reconnect_attempts,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `attempt`: `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(MAX_BACKOFF_EXPONENT);
        self.base.saturating_mul(factor)
    }
}

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Connecting { attempt: u32 },
    Connected,
    Backoff { attempt: u32, delay: Duration },
    /// Gave up after this many consecutive failures.
    Failed { attempts: u32 },
    Disconnected,
}

/// Session-side ends of the envelope channels.
#[derive(Debug)]
pub struct SessionChannels {
    pub inbound: UnboundedSender<ChangeEnvelope>,
    pub outbound: UnboundedReceiver<ChangeEnvelope>,
}

/// Document-side ends of the envelope channels.
#[derive(Debug)]
pub struct SessionEndpoints {
    /// Drained by `RemoteChangeApplier::drain`.
    pub inbound: UnboundedReceiver<ChangeEnvelope>,
    /// Fed by `LocalChangeTracker`.
    pub outbound: UnboundedSender<ChangeEnvelope>,
}

/// Creates the paired inbound/outbound channels for one session.
pub fn session_channels() -> (SessionChannels, SessionEndpoints) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    (
        SessionChannels {
            inbound: inbound_tx,
            outbound: outbound_rx,
        },
        SessionEndpoints {
            inbound: inbound_rx,
            outbound: outbound_tx,
        },
    )
}

/// Handle to a running session task.
#[derive(Debug)]
pub struct CollaborationSession {
    cancel: watch::Sender<bool>,
    status: watch::Receiver<SessionStatus>,
    task: JoinHandle<SessionStatus>,
}

impl CollaborationSession {
    /// Spawns the session loop on the current tokio runtime.
    pub fn start<T: Transport>(
        transport: T,
        config: SessionConfig,
        channels: SessionChannels,
    ) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(SessionStatus::Idle);
        let task = tokio::spawn(run_session(
            transport, config, channels, cancel_rx, status_tx,
        ));
        Self {
            cancel: cancel_tx,
            status: status_rx,
            task,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every status change.
    pub fn status_watch(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Requests shutdown. Idempotent.
    pub fn disconnect(&self) {
        if !self.cancel.send_replace(true) {
            info!("event=session_disconnect module=session status=ok");
        }
    }

    /// Waits for the session task to finish and returns its final status.
    pub async fn join(self) -> SessionStatus {
        match self.task.await {
            Ok(status) => status,
            Err(err) => {
                error!("event=session_join module=session status=error error={err}");
                SessionStatus::Disconnected
            }
        }
    }
}

enum LinkExit {
    Cancelled,
    /// Document side dropped its channel ends.
    Detached,
    Lost(TransportError),
}

fn is_cancelled(cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow() || cancel.has_changed().is_err()
}

async fn run_session<T: Transport>(
    mut transport: T,
    config: SessionConfig,
    mut channels: SessionChannels,
    mut cancel: watch::Receiver<bool>,
    status: watch::Sender<SessionStatus>,
) -> SessionStatus {
    let policy = ReconnectPolicy::from_config(&config);
    let mut failures = 0u32;

    loop {
        if is_cancelled(&cancel) {
            return finish(&status, SessionStatus::Disconnected);
        }
        status.send_replace(SessionStatus::Connecting {
            attempt: failures + 1,
        });

        let connected = transport.connect().await;
        if is_cancelled(&cancel) {
            if connected.is_ok() {
                transport.close().await;
            }
            info!("event=session_connect module=session status=skip reason=cancelled_in_flight");
            return finish(&status, SessionStatus::Disconnected);
        }

        match connected {
            Ok(()) => {
                failures = 0;
                status.send_replace(SessionStatus::Connected);
                info!("event=session_connect module=session status=ok");
                match run_connected(
                    &mut transport,
                    config.heartbeat_interval(),
                    &mut channels,
                    &mut cancel,
                )
                .await
                {
                    LinkExit::Cancelled | LinkExit::Detached => {
                        transport.close().await;
                        return finish(&status, SessionStatus::Disconnected);
                    }
                    LinkExit::Lost(err) => {
                        warn!("event=session_link module=session status=error error={err}");
                        transport.close().await;
                    }
                }
            }
            Err(err) => {
                warn!(
                    "event=session_connect module=session status=error attempt={} error={}",
                    failures + 1,
                    err
                );
            }
        }

        failures += 1;
        if failures >= policy.max_attempts() {
            error!("event=session_give_up module=session status=error attempts={failures}");
            return finish(&status, SessionStatus::Failed { attempts: failures });
        }

        let delay = policy.delay_for(failures);
        status.send_replace(SessionStatus::Backoff {
            attempt: failures,
            delay,
        });
        debug!(
            "event=session_backoff module=session status=ok attempt={} delay_ms={}",
            failures,
            delay.as_millis()
        );
        tokio::select! {
            _ = cancel.changed() => {
                return finish(&status, SessionStatus::Disconnected);
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn run_connected<T: Transport>(
    transport: &mut T,
    heartbeat_every: Duration,
    channels: &mut SessionChannels,
    cancel: &mut watch::Receiver<bool>,
) -> LinkExit {
    // tokio intervals reject a zero period.
    let heartbeat_every = heartbeat_every.max(Duration::from_millis(1));
    let mut heartbeat = tokio::time::interval_at(Instant::now() + heartbeat_every, heartbeat_every);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.changed() => return LinkExit::Cancelled,
            _ = heartbeat.tick() => {
                if let Err(err) = transport.ping().await {
                    return LinkExit::Lost(err);
                }
            }
            frame = transport.recv() => match frame {
                Ok(frame) => match ChangeEnvelope::decode(&frame) {
                    Ok(envelope) => {
                        if channels.inbound.send(envelope).is_err() {
                            return LinkExit::Detached;
                        }
                    }
                    Err(err) => {
                        warn!("event=session_recv module=session status=error error={err}");
                    }
                },
                Err(err) => return LinkExit::Lost(err),
            },
            outgoing = channels.outbound.recv() => match outgoing {
                Some(envelope) => match envelope.encode() {
                    Ok(frame) => {
                        if let Err(err) = transport.send(frame).await {
                            return LinkExit::Lost(err);
                        }
                    }
                    Err(err) => {
                        warn!("event=session_send module=session status=error error={err}");
                    }
                },
                None => return LinkExit::Detached,
            },
        }
    }
}

fn finish(status: &watch::Sender<SessionStatus>, last: SessionStatus) -> SessionStatus {
    status.send_replace(last.clone());
    last
}

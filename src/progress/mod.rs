//! Upload progress reporting for filevault.
//!
//! Uploads push `ProgressEvent`s into a process-wide `ProgressBus`. Clients
//! join the bus through a connection that first presents a handshake code
//! issued by the `HandshakeBroker`.

mod bus;
mod event;
mod handshake;

pub use bus::{ProgressBus, Subscriber, SubscriberClosed, SubscriberId};
pub use event::{AssetKind, ProgressEvent};
pub use handshake::HandshakeBroker;

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, trace};

use crate::Result;

/// Receives progress percentages from a running upload.
pub trait ProgressSink: Send + Sync {
    /// Report completion in `[0, 100]`.
    fn report(&self, progress: f64);
}

/// Discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: f64) {}
}

/// Maps `[0, 100]` onto `[0, share]` of another sink.
pub struct Scaled<'a> {
    inner: &'a dyn ProgressSink,
    share: f64,
}

impl<'a> Scaled<'a> {
    /// Scale reports into `share` percent of `inner`.
    pub fn new(inner: &'a dyn ProgressSink, share: f64) -> Self {
        Self { inner, share }
    }
}

impl ProgressSink for Scaled<'_> {
    fn report(&self, progress: f64) {
        self.inner.report(progress * self.share / 100.0);
    }
}

/// Round to two decimals.
pub fn round_progress(progress: f64) -> f64 {
    (progress * 100.0).round() / 100.0
}

/// Broadcasts the progress of one upload.
#[derive(Clone)]
pub struct ProgressReporter {
    bus: Arc<ProgressBus>,
    app: String,
    kind: AssetKind,
    filename: String,
}

impl ProgressReporter {
    /// Create a reporter for one upload.
    pub fn new(
        bus: Arc<ProgressBus>,
        app: impl Into<String>,
        kind: AssetKind,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            app: app.into(),
            kind,
            filename: filename.into(),
        }
    }

    /// Build the event for a progress value.
    pub fn event(&self, progress: f64) -> ProgressEvent {
        ProgressEvent {
            app: self.app.clone(),
            kind: self.kind,
            filename: self.filename.clone(),
            progress: round_progress(progress.clamp(0.0, 100.0)),
        }
    }
}

impl ProgressSink for ProgressReporter {
    fn report(&self, progress: f64) {
        let event = self.event(progress);
        trace!(filename = %event.filename, progress = event.progress, "Progress");
        self.bus.broadcast(&event);
    }
}

/// Connection metadata presented by a subscribing client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandshakeParams {
    /// Application name.
    #[serde(default)]
    pub app: String,
    /// Caller-supplied correlation ID.
    #[serde(default)]
    pub id: String,
    /// One-time code.
    #[serde(default)]
    pub code: String,
}

/// Lifecycle of a progress connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the handshake to be checked.
    Connecting,
    /// Registered on the bus.
    Subscribed(SubscriberId),
    /// Gone; a new handshake is needed to rejoin.
    Closed,
}

/// Error frame sent to a connection that failed its handshake.
pub fn handshake_error_frame(message: &str) -> String {
    serde_json::json!({
        "type": "error",
        "code": "handshake",
        "message": message,
    })
    .to_string()
}

/// Check the handshake of a new connection and register it on the bus.
///
/// On failure the connection receives a terminal error frame and is closed
/// without ever joining the bus.
pub fn connect(
    bus: &ProgressBus,
    broker: &HandshakeBroker,
    params: &HandshakeParams,
    subscriber: Box<dyn Subscriber>,
) -> Result<ConnectionState> {
    match broker.verify(&params.app, &params.id, &params.code) {
        Ok(()) => {
            let id = bus.subscribe(subscriber);
            debug!(app = %params.app, subscriber = id, "Progress connection subscribed");
            Ok(ConnectionState::Subscribed(id))
        }
        Err(e) => {
            debug!(app = %params.app, "Progress connection rejected: {}", e);
            let _ = subscriber.send_text(&handshake_error_frame(&e.to_string()));
            subscriber.close();
            Err(e)
        }
    }
}

/// Remove a connection from the bus once its peer is gone.
pub fn disconnect(bus: &ProgressBus, state: ConnectionState) -> ConnectionState {
    if let ConnectionState::Subscribed(id) = state {
        bus.unsubscribe(id);
    }
    ConnectionState::Closed
}

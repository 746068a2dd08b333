//! Ingest events for user-facing diagnostics.
//!
//! Every warning, rejection and failure the pipeline reports about a file
//! is an [`IngestEvent`] sent to an [`EventSink`]. Sinks must never block:
//! the pipeline emits from its worker thread while holding the store.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Severity of an ingest event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    /// The file was rejected as defective.
    Reject,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Reject => write!(f, "reject"),
        }
    }
}

/// A diagnostic about one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestEvent {
    /// File name the event is about.
    pub file: String,
    pub severity: Severity,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}

impl IngestEvent {
    /// Create an event stamped with the current time.
    pub fn new(file: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            severity,
            message: message.into(),
            at: OffsetDateTime::now_utc(),
        }
    }
}

/// Destination for ingest events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: IngestEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: IngestEvent) {
        (**self).emit(event)
    }
}

/// Forward to two sinks, e.g. logging and collection.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&self, event: IngestEvent) {
        self.0.emit(event.clone());
        self.1.emit(event);
    }
}

/// Logs events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: IngestEvent) {
        match event.severity {
            Severity::Info => info!(file = %event.file, "{}", event.message),
            Severity::Warning => warn!(file = %event.file, "{}", event.message),
            Severity::Error => error!(file = %event.file, "{}", event.message),
            Severity::Reject => warn!(file = %event.file, rejected = true, "{}", event.message),
        }
    }
}

/// Sender for ingest events.
pub type EventSender = broadcast::Sender<IngestEvent>;

/// Receiver for ingest events.
pub type EventReceiver = broadcast::Receiver<IngestEvent>;

/// Broadcasts events to any number of subscribers.
///
/// Events are dropped when nobody is subscribed.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: EventSender,
}

impl ChannelSink {
    /// Create a sink with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChannelSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: IngestEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<IngestEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events collected so far.
    pub fn events(&self) -> Vec<IngestEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of collected events with the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|e| e.severity == severity).count())
            .unwrap_or(0)
    }

    /// Remove and return all collected events.
    pub fn drain(&self) -> Vec<IngestEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: IngestEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

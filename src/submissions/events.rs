use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use super::state_machine::SubmissionEvent;
use super::types::{DataRecord, Submission};

/// Notification emitted after a lifecycle transition was committed.
///
/// `submission` is the snapshot taken before the transition, and `data` is the
/// record as it was at that point, so withdraw listeners can still read values
/// that the purge removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub kind: SubmissionEvent,
    pub submission: Submission,
    pub data: Option<DataRecord>,
    pub correlation_id: String,
    pub occurred_at: DateTime<Utc>,
}

impl LifecycleEvent {
    /// Fully qualified event name (`formstore.submit`, `formstore.withdraw`)
    pub fn name(&self) -> String {
        format!("formstore.{}", self.kind.name())
    }
}

/// Receives lifecycle notifications. Listeners cannot influence the outcome
/// of the transition that produced the event.
pub trait LifecycleListener: Send + Sync {
    fn on_event(&self, event: &LifecycleEvent);
}

/// Explicitly registered listeners, invoked in registration order
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Vec<Arc<dyn LifecycleListener>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Arc<dyn LifecycleListener>) {
        self.listeners.push(listener);
    }

    pub fn with_listener(mut self, listener: Arc<dyn LifecycleListener>) -> Self {
        self.register(listener);
        self
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn dispatch(&self, event: &LifecycleEvent) {
        debug!(
            event = %event.name(),
            submission.id = event.submission.id,
            listeners = self.listeners.len(),
            "Dispatching lifecycle event"
        );
        for listener in &self.listeners {
            listener.on_event(event);
        }
    }
}

/// Writes every event to the log
#[derive(Debug, Default)]
pub struct LoggingListener;

impl LifecycleListener for LoggingListener {
    fn on_event(&self, event: &LifecycleEvent) {
        info!(
            event = %event.name(),
            submission.id = event.submission.id,
            form.id = event.submission.form_id,
            submitter.id = event.submission.submitter_id,
            correlation.id = %event.correlation_id,
            "Submission lifecycle event"
        );
    }
}

/// Outbox that keeps every event it receives
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Removes and returns everything recorded so far
    pub fn drain(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}

impl LifecycleListener for RecordingListener {
    fn on_event(&self, event: &LifecycleEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(_) => warn!(event = %event.name(), "Event outbox poisoned, dropping event"),
        }
    }
}

/// Forwards events to an async consumer without waiting for it
#[derive(Debug)]
pub struct ChannelListener {
    sender: UnboundedSender<LifecycleEvent>,
}

impl ChannelListener {
    pub fn new(sender: UnboundedSender<LifecycleEvent>) -> Self {
        Self { sender }
    }
}

impl LifecycleListener for ChannelListener {
    fn on_event(&self, event: &LifecycleEvent) {
        if self.sender.send(event.clone()).is_err() {
            warn!(event = %event.name(), "Event consumer has gone away");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submissions::types::SubmissionState;

    fn event(kind: SubmissionEvent) -> LifecycleEvent {
        LifecycleEvent {
            kind,
            submission: Submission {
                id: 3,
                status: SubmissionState::Draft,
                treated: None,
                form_id: 1,
                submitter_id: 1,
                data: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            data: None,
            correlation_id: "test".to_string(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn test_bus_dispatches_to_every_listener() {
        let first = Arc::new(RecordingListener::new());
        let second = Arc::new(RecordingListener::new());
        let bus = EventBus::new()
            .with_listener(first.clone())
            .with_listener(second.clone());

        bus.dispatch(&event(SubmissionEvent::Submit));

        assert_eq!(first.events().len(), 1);
        assert_eq!(second.events()[0].name(), "formstore.submit");
    }

    #[test]
    fn test_drain_empties_outbox() {
        let outbox = RecordingListener::new();
        outbox.on_event(&event(SubmissionEvent::Withdraw));
        assert_eq!(outbox.drain().len(), 1);
        assert!(outbox.events().is_empty());
    }

    #[tokio::test]
    async fn test_channel_listener_forwards_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let listener = ChannelListener::new(tx);

        listener.on_event(&event(SubmissionEvent::Withdraw));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, SubmissionEvent::Withdraw);
    }
}

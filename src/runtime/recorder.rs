//! Append-only log of engine activity for tooling.
//!
//! Unlike the time engine, which stores full state snapshots, the recorder
//! keeps lightweight typed entries (`execution_start`, `variable_set`, ...)
//! plus whatever payload the recording site attached. Listeners are notified
//! synchronously on every record; a failing listener is logged and skipped,
//! never allowed to break the recording site.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use tracing::warn;

use crate::runtime::errors::AuraError;
use crate::runtime::events::EventData;

pub const EVENT_EXECUTION_START: &str = "execution_start";
pub const EVENT_EXECUTION_END: &str = "execution_end";
pub const EVENT_STATEMENT_EXECUTE: &str = "statement_execute";
pub const EVENT_VARIABLE_SET: &str = "variable_set";
pub const EVENT_FUNCTION_CALL: &str = "function_call";
pub const EVENT_FUNCTION_RETURN: &str = "function_return";
pub const EVENT_EMIT: &str = "event_emit";
pub const EVENT_ERROR: &str = "error";
pub const EVENT_STATE_CHANGE: &str = "state_change";

/// One logged entry.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub event_type: String,
    pub timestamp: SystemTime,
    pub data: EventData,
}

/// Handle returned by [`ExecutionRecorder::add_listener`], used to remove
/// the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&RecordedEvent) -> Result<(), AuraError> + Send + Sync>;

/// Thread-safe activity log with synchronous listeners.
pub struct ExecutionRecorder {
    recording: AtomicBool,
    events: Mutex<Vec<RecordedEvent>>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
}

impl ExecutionRecorder {
    pub fn new() -> Self {
        ExecutionRecorder {
            recording: AtomicBool::new(true),
            events: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
        }
    }

    /// Appends an entry and notifies listeners. A no-op while recording is
    /// stopped.
    pub fn record_event(&self, event_type: &str, data: EventData) {
        if !self.is_recording() {
            return;
        }
        let event = RecordedEvent {
            event_type: event_type.to_string(),
            timestamp: SystemTime::now(),
            data,
        };
        self.events.lock().push(event.clone());
        // Listeners run outside the log lock; a listener may query the
        // recorder it is registered on.
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in &listeners {
            if let Err(error) = listener(&event) {
                warn!("recorder listener failed on '{}': {}", event.event_type, error);
            }
        }
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&RecordedEvent) -> Result<(), AuraError> + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Returns true when the id was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn start_recording(&self) {
        self.recording.store(true, Ordering::Relaxed);
    }

    pub fn stop_recording(&self) {
        self.recording.store(false, Ordering::Relaxed);
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }

    /// Logged entries, optionally filtered by type, oldest first.
    pub fn events(&self, event_type: Option<&str>) -> Vec<RecordedEvent> {
        let events = self.events.lock();
        match event_type {
            Some(wanted) => events
                .iter()
                .filter(|event| event.event_type == wanted)
                .cloned()
                .collect(),
            None => events.clone(),
        }
    }

    /// The newest `count` entries, oldest of those first.
    pub fn recent(&self, count: usize) -> Vec<RecordedEvent> {
        let events = self.events.lock();
        let skip = events.len().saturating_sub(count);
        events[skip..].to_vec()
    }

    /// Distinct entry types seen so far, sorted.
    pub fn event_types(&self) -> Vec<String> {
        let events = self.events.lock();
        let mut types: Vec<String> = events.iter().map(|event| event.event_type.clone()).collect();
        types.sort();
        types.dedup();
        types
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Default for ExecutionRecorder {
    fn default() -> Self {
        ExecutionRecorder::new()
    }
}

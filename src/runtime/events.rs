//! Event queue, handler registry, and the delayed-event scheduler.
//!
//! Events are processed strictly in FIFO order. A handler may emit new
//! events while it runs; how those cascades drain is the caller's choice:
//!
//! - [`EventQueue::process_all`] keeps draining until the queue is empty,
//!   including events emitted mid-drain.
//! - [`EventQueue::process_generation`] fences the drain at the queue length
//!   observed on entry, so mid-drain emissions wait for the next tick and a
//!   self-emitting handler cannot starve the loop.
//!
//! Handler failures are logged and skipped; one failing handler never stops
//! the drain or the remaining handlers for the same event.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::runtime::errors::AuraError;
use crate::value::Value;

/// Payload map carried by every event.
pub type EventData = FxHashMap<String, Value>;

/// Handler invoked for each event whose name matches its registration.
pub type EventHandler = Arc<dyn Fn(&Event) -> Result<(), AuraError> + Send + Sync>;

/// A named occurrence plus its payload and emission time.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub data: EventData,
    pub timestamp: SystemTime,
}

impl Event {
    pub fn new(name: impl Into<String>, data: EventData) -> Self {
        Event {
            name: name.into(),
            data,
            timestamp: SystemTime::now(),
        }
    }
}

/// FIFO queue of pending events plus the name → handler registry.
///
/// All methods take `&self`; the queue is shared between the loop thread and
/// whoever emits.
pub struct EventQueue {
    queue: Mutex<VecDeque<Event>>,
    handlers: Mutex<FxHashMap<String, Vec<EventHandler>>>,
    processed: AtomicU64,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue {
            queue: Mutex::new(VecDeque::new()),
            handlers: Mutex::new(FxHashMap::default()),
            processed: AtomicU64::new(0),
        }
    }

    /// Registers `handler` for events named `name`. Multiple handlers per
    /// name run in registration order.
    pub fn on<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&Event) -> Result<(), AuraError> + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .entry(name.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Unregisters every handler for `name`.
    pub fn off(&self, name: &str) {
        self.handlers.lock().remove(name);
    }

    /// Appends an event to the back of the queue. Nothing runs until a
    /// `process_*` call drains it.
    pub fn emit(&self, name: impl Into<String>, data: EventData) {
        let event = Event::new(name, data);
        debug!("event emitted: {}", event.name);
        self.queue.lock().push_back(event);
    }

    /// Pops and dispatches the head event. Returns false when the queue was
    /// empty. An event with no handlers still counts as processed.
    pub fn process_one(&self) -> bool {
        let event = match self.queue.lock().pop_front() {
            Some(event) => event,
            None => return false,
        };
        // Handlers run outside the registry lock so they can emit or
        // register without deadlocking.
        let handlers: Vec<EventHandler> = self
            .handlers
            .lock()
            .get(&event.name)
            .cloned()
            .unwrap_or_default();
        for handler in &handlers {
            if let Err(error) = handler(&event) {
                warn!("handler for '{}' failed: {}", event.name, error);
            }
        }
        self.processed.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Drains until the queue is empty, following cascades. Returns the
    /// number of events processed.
    pub fn process_all(&self) -> usize {
        let mut count = 0;
        while self.process_one() {
            count += 1;
        }
        count
    }

    /// Drains at most the events that were pending on entry. Events emitted
    /// during this drain stay queued for the next call.
    pub fn process_generation(&self) -> usize {
        let fence = self.queue.lock().len();
        let mut count = 0;
        while count < fence && self.process_one() {
            count += 1;
        }
        count
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn has_handlers(&self, name: &str) -> bool {
        self.handlers.lock().contains_key(name)
    }

    /// Names with at least one registered handler, sorted for stable display.
    pub fn handler_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Empties both the pending queue and the handler registry.
    pub fn clear(&self) {
        self.queue.lock().clear();
        self.handlers.lock().clear();
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        EventQueue::new()
    }
}

struct ScheduledEvent {
    name: String,
    data: EventData,
    fire_at: Instant,
    /// `Some` reschedules after each firing; `None` is one-shot.
    interval: Option<Duration>,
}

/// Emits events into an [`EventQueue`] when their timers come due.
///
/// [`EventScheduler::tick`] is called once per runtime loop pass. Entries due
/// at the same tick fire in insertion order. A late tick fires an interval
/// entry once and reschedules from now, so a stalled loop does not produce a
/// burst of catch-up events.
pub struct EventScheduler {
    queue: Arc<EventQueue>,
    scheduled: Vec<ScheduledEvent>,
}

impl EventScheduler {
    pub fn new(queue: Arc<EventQueue>) -> Self {
        EventScheduler {
            queue,
            scheduled: Vec::new(),
        }
    }

    /// Schedules a single emission of `name` after `delay`.
    pub fn schedule_once(&mut self, name: impl Into<String>, delay: Duration, data: EventData) {
        self.scheduled.push(ScheduledEvent {
            name: name.into(),
            data,
            fire_at: Instant::now() + delay,
            interval: None,
        });
    }

    /// Schedules `name` to fire every `every`, starting one interval from
    /// now.
    pub fn schedule_interval(&mut self, name: impl Into<String>, every: Duration, data: EventData) {
        self.scheduled.push(ScheduledEvent {
            name: name.into(),
            data,
            fire_at: Instant::now() + every,
            interval: Some(every),
        });
    }

    /// Fires every due entry into the queue. Returns how many fired.
    pub fn tick(&mut self) -> usize {
        let now = Instant::now();
        let mut fired = 0;
        let mut i = 0;
        while i < self.scheduled.len() {
            if now >= self.scheduled[i].fire_at {
                let entry = &mut self.scheduled[i];
                self.queue.emit(entry.name.clone(), entry.data.clone());
                fired += 1;
                match entry.interval {
                    Some(every) => {
                        entry.fire_at = now + every;
                        i += 1;
                    }
                    None => {
                        self.scheduled.remove(i);
                    }
                }
            } else {
                i += 1;
            }
        }
        fired
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduled.len()
    }

    pub fn clear(&mut self) {
        self.scheduled.clear();
    }
}

//! The persistent runtime.
//!
//! [`AuraRuntime`] owns every subsystem and wires them together:
//!
//! ```text
//! Program ─→ executor ─→ StateManager ─→ StateIntegrity (snapshots)
//!                │                             │
//!                └──→ OutputBuffer             └──→ TimeEngine (steps)
//!
//! EventScheduler ─→ EventQueue ─→ handlers        (loop thread)
//! ```
//!
//! The loop started by [`AuraRuntime::start`] does one thing per pass: tick
//! the scheduler, drain the event queue, idle briefly. Statement execution is
//! not on the loop; callers drive it through [`AuraRuntime::execute_once`],
//! which records a time-engine step per statement.
//!
//! All public methods take `&self`. Subsystems carry their own locks, and
//! lock scopes stay inside a single method, so the runtime can be shared
//! behind an `Arc` between the loop thread and a UI without a wrapper.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::exec::{ExecEnv, OutputBuffer, StatementExecutor};
use crate::program::{FunctionDef, Program, Stmt, StmtKind};
use crate::runtime::errors::AuraError;
use crate::runtime::events::{Event, EventData, EventQueue, EventScheduler};
use crate::runtime::governor::{ResourceLimits, ResourceTracker, ResourceUsage};
use crate::runtime::integrity::{StateIntegrity, StateSnapshot};
use crate::runtime::recorder::{
    ExecutionRecorder, EVENT_EMIT, EVENT_ERROR, EVENT_EXECUTION_END, EVENT_EXECUTION_START,
    EVENT_STATEMENT_EXECUTE, EVENT_STATE_CHANGE,
};
use crate::runtime::state::StateManager;
use crate::runtime::time_engine::{ExecutionStep, TimeEngine, TimeStats};
use crate::value::Value;

/// Idle time per loop pass once scheduler and queue have been serviced.
const TICK_IDLE: Duration = Duration::from_millis(10);
/// How long [`AuraRuntime::stop`] waits for the loop thread before detaching.
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Point-in-time view of the runtime, cheap to copy out for display.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeStatus {
    pub running: bool,
    pub paused: bool,
    pub uptime: Duration,
    pub loop_iterations: u64,
    pub pending_events: usize,
    pub processed_events: u64,
    pub variable_count: usize,
    pub function_count: usize,
}

/// Owned copy of inspectable state; holding one never blocks the engine.
#[derive(Debug, Clone)]
pub struct StateDump {
    pub variables: FxHashMap<String, Value>,
    pub functions: Vec<String>,
    pub call_stack: Vec<String>,
    pub handlers: Vec<String>,
}

/// One row of the timeline prepared for display.
#[derive(Debug, Clone)]
pub struct TimelineEntry {
    pub index: usize,
    pub step_number: usize,
    pub node_type: String,
    pub summary: String,
    pub line_number: Option<usize>,
    pub variables_changed: Vec<String>,
    pub is_cursor: bool,
    /// Checkpoint name anchored at this step, if any.
    pub checkpoint: Option<String>,
}

/// Flags shared with the loop thread.
struct LoopControl {
    running: AtomicBool,
    paused: Mutex<bool>,
    resumed: Condvar,
    fair_drain: AtomicBool,
    iterations: AtomicU64,
}

impl LoopControl {
    fn new() -> Self {
        LoopControl {
            running: AtomicBool::new(false),
            paused: Mutex::new(false),
            resumed: Condvar::new(),
            fair_drain: AtomicBool::new(false),
            iterations: AtomicU64::new(0),
        }
    }
}

/// One pass per iteration: tick the scheduler, drain the queue, idle.
/// While paused the loop parks on the condvar until resume or stop.
fn run_loop(ctl: &LoopControl, scheduler: &Mutex<EventScheduler>, events: &EventQueue) {
    debug!("runtime loop entered");
    while ctl.running.load(Ordering::SeqCst) {
        {
            let mut paused = ctl.paused.lock();
            while *paused && ctl.running.load(Ordering::SeqCst) {
                ctl.resumed.wait(&mut paused);
            }
        }
        if !ctl.running.load(Ordering::SeqCst) {
            break;
        }
        scheduler.lock().tick();
        if ctl.fair_drain.load(Ordering::Relaxed) {
            events.process_generation();
        } else {
            events.process_all();
        }
        ctl.iterations.fetch_add(1, Ordering::Relaxed);
        thread::sleep(TICK_IDLE);
    }
    debug!("runtime loop exited");
}

/// The engine: program storage, state, events, history, and the loop.
pub struct AuraRuntime {
    program: Mutex<Option<Program>>,
    state: RwLock<StateManager>,
    integrity: Mutex<StateIntegrity>,
    events: Arc<EventQueue>,
    scheduler: Arc<Mutex<EventScheduler>>,
    tracker: ResourceTracker,
    time_engine: RwLock<TimeEngine>,
    recorder: ExecutionRecorder,
    output: Mutex<OutputBuffer>,
    ctl: Arc<LoopControl>,
    worker: Mutex<Option<JoinHandle<()>>>,
    started_at: Mutex<Option<Instant>>,
    safe_mode: AtomicBool,
    last_error: Mutex<Option<AuraError>>,
}

impl AuraRuntime {
    pub fn new() -> Self {
        AuraRuntime::with_limits(ResourceLimits::default())
    }

    pub fn with_limits(limits: ResourceLimits) -> Self {
        let events = Arc::new(EventQueue::new());
        let scheduler = Arc::new(Mutex::new(EventScheduler::new(Arc::clone(&events))));
        AuraRuntime {
            program: Mutex::new(None),
            state: RwLock::new(StateManager::new()),
            integrity: Mutex::new(StateIntegrity::new()),
            events,
            scheduler,
            tracker: ResourceTracker::new(limits),
            time_engine: RwLock::new(TimeEngine::new()),
            recorder: ExecutionRecorder::new(),
            output: Mutex::new(OutputBuffer::new()),
            ctl: Arc::new(LoopControl::new()),
            worker: Mutex::new(None),
            started_at: Mutex::new(None),
            safe_mode: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    // ========== Program lifecycle ==========

    /// Stores `program` and registers its top-level function definitions.
    /// Fails when registration would cross the function ceiling.
    pub fn load_program(&self, program: Program) -> Result<(), AuraError> {
        {
            let mut state = self.state.write();
            for stmt in &program.statements {
                if let StmtKind::FunctionDef { name, body } = &stmt.kind {
                    if !state.has_function(name) {
                        self.tracker.check_functions(state.function_count() + 1)?;
                    }
                    state.register_function(FunctionDef {
                        name: name.clone(),
                        body: body.clone(),
                    });
                }
            }
        }
        info!("program loaded ({} statements)", program.statements.len());
        *self.program.lock() = Some(program);
        Ok(())
    }

    /// Hot reload: swaps in `program` while preserving every live variable.
    /// Functions are refreshed from the new program; old ones are gone.
    pub fn reload(&self, program: Program) -> Result<(), AuraError> {
        let preserved = {
            let mut state = self.state.write();
            let vars = state.get_all_vars();
            state.clear();
            for (name, value) in &vars {
                state.set_var(name.clone(), value.clone());
            }
            vars.len()
        };
        self.load_program(program)?;
        info!("hot reload complete ({} variables preserved)", preserved);
        self.record_state_change("reload", "variables_preserved", preserved as f64);
        Ok(())
    }

    pub fn has_program(&self) -> bool {
        self.program.lock().is_some()
    }

    // ========== Loop control ==========

    /// Starts the scheduler/event loop. With `blocking` the call runs the
    /// loop on the current thread until [`AuraRuntime::stop`] is called from
    /// elsewhere; otherwise a worker thread is spawned. A second `start`
    /// while running is a logged no-op.
    pub fn start(&self, blocking: bool) {
        if self.ctl.running.swap(true, Ordering::SeqCst) {
            warn!("start() called while already running");
            return;
        }
        *self.started_at.lock() = Some(Instant::now());
        self.tracker.start();
        info!("runtime started");
        if blocking {
            run_loop(&self.ctl, &self.scheduler, &self.events);
        } else {
            let ctl = Arc::clone(&self.ctl);
            let scheduler = Arc::clone(&self.scheduler);
            let events = Arc::clone(&self.events);
            let handle = thread::spawn(move || run_loop(&ctl, &scheduler, &events));
            *self.worker.lock() = Some(handle);
        }
    }

    /// Stops the loop and waits up to [`STOP_JOIN_TIMEOUT`] for the worker.
    /// Idempotent; a stuck worker is detached with a warning rather than
    /// blocking the caller forever.
    pub fn stop(&self) {
        if !self.ctl.running.swap(false, Ordering::SeqCst) {
            return;
        }
        // Wake the loop if it is parked on the pause condvar.
        self.ctl.resumed.notify_all();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let deadline = Instant::now() + STOP_JOIN_TIMEOUT;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    warn!("runtime loop thread panicked");
                }
            } else {
                warn!("runtime loop did not exit within {:?}, detaching", STOP_JOIN_TIMEOUT);
            }
        }
        info!("runtime stopped");
    }

    pub fn is_running(&self) -> bool {
        self.ctl.running.load(Ordering::SeqCst)
    }

    /// Parks the loop before its next pass. Events emitted while paused stay
    /// queued. Also flags the time engine as paused for display.
    pub fn pause(&self) {
        *self.ctl.paused.lock() = true;
        self.time_engine.write().pause();
        info!("runtime paused");
    }

    /// Unparks the loop and clears step mode.
    pub fn resume(&self) {
        {
            let mut paused = self.ctl.paused.lock();
            *paused = false;
        }
        self.ctl.resumed.notify_all();
        self.time_engine.write().resume();
        info!("runtime resumed");
    }

    pub fn is_paused(&self) -> bool {
        *self.ctl.paused.lock()
    }

    /// With fair drain on, each loop pass processes only the events that
    /// were pending when the pass began; cascades wait for the next pass.
    pub fn set_fair_drain(&self, enabled: bool) {
        self.ctl.fair_drain.store(enabled, Ordering::Relaxed);
    }

    pub fn fair_drain(&self) -> bool {
        self.ctl.fair_drain.load(Ordering::Relaxed)
    }

    /// In safe mode a failing statement is logged and skipped instead of
    /// aborting the run. The error is still stored as [`AuraRuntime::last_error`].
    pub fn set_safe_mode(&self, enabled: bool) {
        self.safe_mode.store(enabled, Ordering::Relaxed);
    }

    pub fn safe_mode(&self) -> bool {
        self.safe_mode.load(Ordering::Relaxed)
    }

    // ========== Execution ==========

    /// Runs the loaded program once, top to bottom, with `executor`.
    ///
    /// Per statement: snapshot, execute, snapshot, record a time-engine step.
    /// On failure the error is recorded and stored; safe mode then moves on
    /// to the next statement, normal mode aborts with the error.
    pub fn execute_once(&self, executor: &mut dyn StatementExecutor) -> Result<(), AuraError> {
        let statements = {
            let program = self.program.lock();
            match program.as_ref() {
                Some(program) => program.statements.clone(),
                None => return Err(AuraError::runtime("No program loaded")),
            }
        };
        self.tracker.start();
        self.recorder
            .record_event(EVENT_EXECUTION_START, EventData::default());

        for stmt in &statements {
            let result = self
                .tracker
                .check_execution_time()
                .and_then(|()| self.execute_statement(executor, stmt));
            if let Err(error) = result {
                let mut data = EventData::default();
                data.insert("message".to_string(), Value::Str(error.to_string()));
                self.recorder.record_event(EVENT_ERROR, data);
                *self.last_error.lock() = Some(error.clone());
                if self.safe_mode() {
                    warn!("statement failed, continuing in safe mode: {}", error);
                    continue;
                }
                self.recorder
                    .record_event(EVENT_EXECUTION_END, EventData::default());
                return Err(error);
            }
        }

        self.recorder
            .record_event(EVENT_EXECUTION_END, EventData::default());
        Ok(())
    }

    /// Executes one statement between a before/after snapshot pair and
    /// records the step. The step is recorded even when execution fails, so
    /// the timeline shows the statement that broke.
    fn execute_statement(
        &self,
        executor: &mut dyn StatementExecutor,
        stmt: &Stmt,
    ) -> Result<(), AuraError> {
        let mut state = self.state.write();
        let before = self.integrity.lock().snapshot(&state);

        let result = {
            let mut output = self.output.lock();
            let mut env = ExecEnv {
                state: &mut state,
                tracker: &self.tracker,
                output: &mut output,
                events: &self.events,
                recorder: &self.recorder,
            };
            executor.execute(stmt, &mut env)
        };

        let after = self.integrity.lock().snapshot(&state);
        drop(state);

        self.time_engine
            .write()
            .record_step(stmt.kind_name(), &stmt.raw, stmt.line, before, after);

        let mut data = EventData::default();
        data.insert(
            "node_type".to_string(),
            Value::Str(stmt.kind_name().to_string()),
        );
        data.insert(
            "line".to_string(),
            stmt.line.map(|l| Value::Number(l as f64)).unwrap_or(Value::Null),
        );
        self.recorder.record_event(EVENT_STATEMENT_EXECUTE, data);

        result
    }

    fn record_state_change(&self, action: &str, key: &str, detail: f64) {
        let mut data = EventData::default();
        data.insert("action".to_string(), Value::Str(action.to_string()));
        data.insert(key.to_string(), Value::Number(detail));
        self.recorder.record_event(EVENT_STATE_CHANGE, data);
    }

    pub fn last_error(&self) -> Option<AuraError> {
        self.last_error.lock().clone()
    }

    // ========== Variables ==========

    /// Governed variable write, used by the debugger's inject path.
    pub fn set_variable(&self, name: &str, value: Value) -> Result<(), AuraError> {
        let mut state = self.state.write();
        if !state.current_vars().contains_key(name) {
            self.tracker.check_variables(state.var_count() + 1)?;
        }
        state.set_var(name.to_string(), value);
        Ok(())
    }

    pub fn get_variable(&self, name: &str) -> Result<Value, AuraError> {
        self.state.read().get_var(name)
    }

    // ========== Events ==========

    /// Registers a handler for events named `name`.
    pub fn on<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&Event) -> Result<(), AuraError> + Send + Sync + 'static,
    {
        self.events.on(name, handler);
    }

    /// Unregisters every handler for `name`.
    pub fn off(&self, name: &str) {
        self.events.off(name);
    }

    /// Governed emit: fails with a Memory error when the queue is at its
    /// ceiling.
    pub fn emit(&self, name: &str, data: EventData) -> Result<(), AuraError> {
        self.tracker.check_events(self.events.pending() + 1)?;
        let mut record = data.clone();
        record.insert("event".to_string(), Value::Str(name.to_string()));
        self.events.emit(name.to_string(), data);
        self.recorder.record_event(EVENT_EMIT, record);
        Ok(())
    }

    pub fn schedule_once(&self, name: impl Into<String>, delay: Duration, data: EventData) {
        self.scheduler.lock().schedule_once(name, delay, data);
    }

    pub fn schedule_interval(&self, name: impl Into<String>, every: Duration, data: EventData) {
        self.scheduler.lock().schedule_interval(name, every, data);
    }

    pub fn pending_events(&self) -> usize {
        self.events.pending()
    }

    /// Drains the queue now, on the caller's thread, honoring the fair-drain
    /// setting. Useful between [`AuraRuntime::execute_once`] calls when the
    /// loop is not running.
    pub fn drain_events(&self) -> usize {
        self.scheduler.lock().tick();
        if self.fair_drain() {
            self.events.process_generation()
        } else {
            self.events.process_all()
        }
    }

    // ========== Snapshots and transactions ==========

    /// Captures a snapshot of live state into the integrity ring.
    pub fn snapshot(&self) -> StateSnapshot {
        let state = self.state.read();
        self.integrity.lock().snapshot(&state)
    }

    /// Restores live state from `snapshot`. Functions are not touched.
    pub fn rollback(&self, snapshot: &StateSnapshot) {
        {
            let mut state = self.state.write();
            self.integrity.lock().rollback(&mut state, snapshot);
        }
        self.record_state_change("rollback", "snapshot_id", snapshot.snapshot_id as f64);
    }

    pub fn get_snapshot(&self, snapshot_id: u64) -> Option<StateSnapshot> {
        self.integrity.lock().get(snapshot_id).cloned()
    }

    /// Retained snapshots, oldest first.
    pub fn list_snapshots(&self) -> Vec<StateSnapshot> {
        self.integrity.lock().snapshots().to_vec()
    }

    /// Restores the most recent snapshot, failing when none exists.
    pub fn rollback_latest(&self) -> Result<u64, AuraError> {
        let snapshot_id = {
            let mut state = self.state.write();
            let integrity = self.integrity.lock();
            let snapshot = integrity
                .latest()
                .cloned()
                .ok_or_else(|| AuraError::runtime("No snapshots available"))?;
            integrity.rollback(&mut state, &snapshot);
            snapshot.snapshot_id
        };
        self.record_state_change("rollback", "snapshot_id", snapshot_id as f64);
        Ok(snapshot_id)
    }

    /// Runs `f` against live state with rollback-on-error semantics.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, AuraError>
    where
        F: FnOnce(&mut StateManager) -> Result<T, AuraError>,
    {
        let mut state = self.state.write();
        self.integrity.lock().transaction(&mut state, f)
    }

    // ========== Time travel ==========

    pub fn step_forward(&self) -> Option<ExecutionStep> {
        self.time_engine.write().step_forward().cloned()
    }

    pub fn step_backward(&self) -> Option<ExecutionStep> {
        self.time_engine.write().step_backward().cloned()
    }

    pub fn goto_step(&self, index: usize) -> Option<ExecutionStep> {
        self.time_engine.write().goto_step(index).cloned()
    }

    pub fn rewind(&self, steps: usize) -> Option<ExecutionStep> {
        self.time_engine.write().rewind(steps).cloned()
    }

    pub fn fast_forward(&self, steps: usize) -> Option<ExecutionStep> {
        self.time_engine.write().fast_forward(steps).cloned()
    }

    pub fn create_checkpoint(&self, name: impl Into<String>) -> Option<usize> {
        self.time_engine.write().create_checkpoint(name)
    }

    pub fn goto_checkpoint(&self, name: &str) -> Option<ExecutionStep> {
        self.time_engine.write().goto_checkpoint(name).cloned()
    }

    pub fn current_step(&self) -> Option<ExecutionStep> {
        self.time_engine.read().current_step().cloned()
    }

    pub fn variable_history(&self, name: &str) -> Vec<(usize, Value)> {
        self.time_engine.read().variable_history(name)
    }

    pub fn time_stats(&self) -> TimeStats {
        self.time_engine.read().stats()
    }

    pub fn format_timeline(&self, context: usize) -> String {
        self.time_engine.read().format_timeline(context)
    }

    /// Steps in a window of `context` entries either side of the cursor,
    /// shaped for display. With no cursor the window starts at step zero.
    pub fn timeline_entries(&self, context: usize) -> Vec<TimelineEntry> {
        let time_engine = self.time_engine.read();
        if time_engine.is_empty() {
            return Vec::new();
        }
        let cursor = time_engine.cursor();
        let center = cursor.unwrap_or(0);
        let start = center.saturating_sub(context);
        let end = (center + context + 1).min(time_engine.len());
        let checkpoints = time_engine.checkpoints();
        time_engine
            .timeline(start, Some(end))
            .into_iter()
            .enumerate()
            .map(|(offset, step)| {
                let index = start + offset;
                TimelineEntry {
                    index,
                    step_number: step.step_number,
                    node_type: step.node_type.clone(),
                    summary: step.summary.clone(),
                    line_number: step.line_number,
                    variables_changed: step.variables_changed.clone(),
                    is_cursor: cursor == Some(index),
                    checkpoint: checkpoints
                        .iter()
                        .find(|(_, at)| *at == index)
                        .map(|(name, _)| name.clone()),
                }
            })
            .collect()
    }

    /// Moves the cursor to `index` and restores live state from that step's
    /// after-snapshot. This is the "go back and change history" operation:
    /// the timeline cursor and live state agree afterwards.
    pub fn rollback_to_step(&self, index: usize) -> Result<(), AuraError> {
        let snapshot = {
            let mut time_engine = self.time_engine.write();
            match time_engine.goto_step(index) {
                Some(step) => step.state_after.clone(),
                None => {
                    return Err(AuraError::runtime(format!(
                        "No step {} in history",
                        index
                    )))
                }
            }
        };
        {
            let mut state = self.state.write();
            self.integrity.lock().rollback(&mut state, &snapshot);
        }
        info!("live state rolled back to step {}", index);
        self.record_state_change("rollback_to_step", "step", index as f64);
        Ok(())
    }

    // ========== Getter methods for UI ==========

    pub fn status(&self) -> RuntimeStatus {
        let state = self.state.read();
        RuntimeStatus {
            running: self.is_running(),
            paused: self.is_paused(),
            uptime: self
                .started_at
                .lock()
                .map(|started| started.elapsed())
                .unwrap_or_default(),
            loop_iterations: self.ctl.iterations.load(Ordering::Relaxed),
            pending_events: self.events.pending(),
            processed_events: self.events.processed(),
            variable_count: state.var_count(),
            function_count: state.function_count(),
        }
    }

    pub fn inspect_state(&self) -> StateDump {
        let state = self.state.read();
        StateDump {
            variables: state.get_all_vars(),
            functions: state.function_names(),
            call_stack: state.call_stack().to_vec(),
            handlers: self.events.handler_names(),
        }
    }

    pub fn output_lines(&self) -> Vec<String> {
        self.output.lock().text_lines()
    }

    pub fn recorder(&self) -> &ExecutionRecorder {
        &self.recorder
    }

    pub fn resource_usage(&self) -> ResourceUsage {
        self.tracker.usage()
    }

    /// Turns resource ceilings on or off. Off is the trusted path used when
    /// the debugger injects state.
    pub fn set_governor_enabled(&self, enabled: bool) {
        if enabled {
            self.tracker.enable();
        } else {
            self.tracker.disable();
        }
    }

    // ========== Lifecycle ==========

    /// Clears state, history, snapshots, the recorder log, captured output,
    /// and the stored error. The loaded program and event registrations
    /// survive.
    pub fn reset(&self) {
        self.state.write().clear();
        self.time_engine.write().clear_history();
        self.integrity.lock().clear();
        self.recorder.clear();
        self.output.lock().clear();
        *self.last_error.lock() = None;
        info!("runtime reset");
    }
}

impl Default for AuraRuntime {
    fn default() -> Self {
        AuraRuntime::new()
    }
}

impl Drop for AuraRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}

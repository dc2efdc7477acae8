//! Bounded execution history with cursor navigation and named checkpoints.
//!
//! Every executed statement is recorded as an [`ExecutionStep`] carrying the
//! state snapshot before and after it ran. History is a ring bounded by
//! `max_history`: past the bound the oldest step is dropped and every
//! checkpoint shifts down one physical index, so a surviving checkpoint keeps
//! pointing at the same logical step. A checkpoint whose index would go
//! negative refers to evicted history and is dropped.
//!
//! The cursor addresses physical history indices. Recording snaps it to the
//! newest step; navigation moves it without touching live program state.
//! Restoring live state from a step is the runtime's job, which feeds the
//! step's snapshot back through the integrity layer.

use std::collections::VecDeque;
use std::time::SystemTime;

use rustc_hash::FxHashMap;

use crate::runtime::integrity::StateSnapshot;
use crate::value::Value;

/// Default history bound: old steps beyond this are evicted.
pub const DEFAULT_MAX_HISTORY: usize = 1000;

/// One recorded statement execution.
#[derive(Debug, Clone)]
pub struct ExecutionStep {
    /// Logical step number, assigned at record time and never renumbered.
    /// After evictions this differs from the step's physical index.
    pub step_number: usize,
    pub timestamp: SystemTime,
    /// Statement kind tag (`set`, `print`, `call`, ...).
    pub node_type: String,
    /// Raw source text of the statement, when the front end provided it.
    pub summary: String,
    pub line_number: Option<usize>,
    pub state_before: StateSnapshot,
    pub state_after: StateSnapshot,
    /// Names bound, changed, or removed by this step, sorted.
    pub variables_changed: Vec<String>,
}

/// Counters reported by [`TimeEngine::stats`].
#[derive(Debug, Clone, PartialEq)]
pub struct TimeStats {
    pub total_steps: usize,
    pub cursor: Option<usize>,
    pub checkpoints: usize,
    pub paused: bool,
    pub step_mode: bool,
    pub max_history: usize,
}

/// Recorder and navigator for execution history.
pub struct TimeEngine {
    history: VecDeque<ExecutionStep>,
    /// Physical index of the cursor; `None` until the first step is recorded
    /// or after history is cleared.
    cursor: Option<usize>,
    max_history: usize,
    /// Checkpoint name → physical history index.
    checkpoints: FxHashMap<String, usize>,
    paused: bool,
    step_mode: bool,
}

impl TimeEngine {
    pub fn new() -> Self {
        TimeEngine::with_max_history(DEFAULT_MAX_HISTORY)
    }

    pub fn with_max_history(max_history: usize) -> Self {
        TimeEngine {
            history: VecDeque::new(),
            cursor: None,
            max_history: max_history.max(1),
            checkpoints: FxHashMap::default(),
            paused: false,
            step_mode: false,
        }
    }

    // ========== Recording ==========

    /// Records one executed statement and snaps the cursor to it. Returns
    /// the step's logical number.
    pub fn record_step(
        &mut self,
        node_type: &str,
        summary: &str,
        line_number: Option<usize>,
        state_before: StateSnapshot,
        state_after: StateSnapshot,
    ) -> usize {
        let variables_changed = Self::diff_vars(&state_before, &state_after);
        let step_number = self.next_step_number();
        self.history.push_back(ExecutionStep {
            step_number,
            timestamp: SystemTime::now(),
            node_type: node_type.to_string(),
            summary: summary.to_string(),
            line_number,
            state_before,
            state_after,
            variables_changed,
        });
        while self.history.len() > self.max_history {
            self.history.pop_front();
            // Shift checkpoints with the evicted slot; ones that would go
            // negative point at lost history and are dropped.
            self.checkpoints.retain(|_, index| {
                if *index == 0 {
                    false
                } else {
                    *index -= 1;
                    true
                }
            });
        }
        self.cursor = Some(self.history.len() - 1);
        step_number
    }

    /// Logical numbers keep counting across evictions: next = last + 1.
    fn next_step_number(&self) -> usize {
        match self.history.back() {
            Some(step) => step.step_number + 1,
            None => 0,
        }
    }

    /// Names whose binding differs between the two snapshots' merged
    /// variable views (globals overlaid with innermost bindings), including
    /// names that only exist on one side.
    fn diff_vars(before: &StateSnapshot, after: &StateSnapshot) -> Vec<String> {
        let before_vars = before.all_vars();
        let after_vars = after.all_vars();
        let mut changed = Vec::new();
        for (name, value) in &after_vars {
            if before_vars.get(name) != Some(value) {
                changed.push(name.clone());
            }
        }
        for name in before_vars.keys() {
            if !after_vars.contains_key(name) {
                changed.push(name.clone());
            }
        }
        changed.sort();
        changed
    }

    // ========== Navigation ==========

    /// Moves the cursor one step forward. `None` when already at the newest
    /// step or history is empty.
    pub fn step_forward(&mut self) -> Option<&ExecutionStep> {
        let next = match self.cursor {
            Some(index) if index + 1 < self.history.len() => index + 1,
            None if !self.history.is_empty() => 0,
            _ => return None,
        };
        self.cursor = Some(next);
        self.history.get(next)
    }

    /// Moves the cursor one step back. `None` when already at the oldest
    /// retained step.
    pub fn step_backward(&mut self) -> Option<&ExecutionStep> {
        let previous = match self.cursor {
            Some(index) if index > 0 => index - 1,
            _ => return None,
        };
        self.cursor = Some(previous);
        self.history.get(previous)
    }

    /// Jumps the cursor to a physical index. `None` when out of range; the
    /// cursor does not move.
    pub fn goto_step(&mut self, index: usize) -> Option<&ExecutionStep> {
        if index >= self.history.len() {
            return None;
        }
        self.cursor = Some(index);
        self.history.get(index)
    }

    /// Moves the cursor back `steps`, clamping at the oldest retained step.
    pub fn rewind(&mut self, steps: usize) -> Option<&ExecutionStep> {
        let current = self.cursor.map(|index| index as i64).unwrap_or(-1);
        let target = (current - steps as i64).max(0);
        self.goto_step(target as usize)
    }

    /// Moves the cursor forward `steps`, clamping at the newest step.
    pub fn fast_forward(&mut self, steps: usize) -> Option<&ExecutionStep> {
        if self.history.is_empty() {
            return None;
        }
        let current = self.cursor.map(|index| index as i64).unwrap_or(-1);
        let target = (current + steps as i64).min(self.history.len() as i64 - 1);
        if target < 0 {
            return None;
        }
        self.goto_step(target as usize)
    }

    pub fn current_step(&self) -> Option<&ExecutionStep> {
        self.history.get(self.cursor?)
    }

    /// Snapshot of state as it was after the step under the cursor.
    pub fn current_state(&self) -> Option<&StateSnapshot> {
        self.current_step().map(|step| &step.state_after)
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    // ========== Checkpoints ==========

    /// Names the current cursor position. Returns the checkpointed physical
    /// index, or `None` when there is no history to checkpoint.
    pub fn create_checkpoint(&mut self, name: impl Into<String>) -> Option<usize> {
        let index = self.cursor?;
        self.checkpoints.insert(name.into(), index);
        Some(index)
    }

    /// Jumps to a named checkpoint. `None` when the name is unknown (or its
    /// step was evicted, which removed the name).
    pub fn goto_checkpoint(&mut self, name: &str) -> Option<&ExecutionStep> {
        let index = self.checkpoints.get(name).copied()?;
        self.goto_step(index)
    }

    /// Checkpoints as (name, physical index) pairs, ordered by index.
    pub fn checkpoints(&self) -> Vec<(String, usize)> {
        let mut entries: Vec<(String, usize)> = self
            .checkpoints
            .iter()
            .map(|(name, index)| (name.clone(), *index))
            .collect();
        entries.sort_by_key(|(_, index)| *index);
        entries
    }

    // ========== Queries ==========

    /// Every (logical step, value) pair where `name` was bound after the
    /// step, oldest first.
    pub fn variable_history(&self, name: &str) -> Vec<(usize, Value)> {
        let mut values = Vec::new();
        for step in &self.history {
            let vars = step.state_after.all_vars();
            if let Some(value) = vars.get(name) {
                values.push((step.step_number, value.clone()));
            }
        }
        values
    }

    /// Retained steps in `[start, end)` physical order; `end: None` means
    /// through the newest.
    pub fn timeline(&self, start: usize, end: Option<usize>) -> Vec<&ExecutionStep> {
        let end = end.unwrap_or(self.history.len()).min(self.history.len());
        if start >= end {
            return Vec::new();
        }
        self.history.range(start..end).collect()
    }

    pub fn steps(&self) -> impl Iterator<Item = &ExecutionStep> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn stats(&self) -> TimeStats {
        TimeStats {
            total_steps: self.history.len(),
            cursor: self.cursor,
            checkpoints: self.checkpoints.len(),
            paused: self.paused,
            step_mode: self.step_mode,
            max_history: self.max_history,
        }
    }

    /// Plain-text window of `context` steps either side of the cursor, with
    /// a marker on the cursor line and changed-variable annotations.
    pub fn format_timeline(&self, context: usize) -> String {
        if self.history.is_empty() {
            return "No execution history".to_string();
        }
        let current = self.cursor.map(|index| index as i64).unwrap_or(-1);
        let start = (current - context as i64).max(0) as usize;
        let end = ((current + context as i64 + 1).max(0) as usize).min(self.history.len());
        let mut out = format!("Timeline ({} steps):\n", self.history.len());
        for (offset, step) in self.history.range(start..end).enumerate() {
            let index = start + offset;
            let marker = if Some(index) == self.cursor { "→" } else { " " };
            out.push_str(&format!("  {} {}: {}", marker, step.step_number, step.node_type));
            if !step.variables_changed.is_empty() {
                out.push_str(&format!(" [{}]", step.variables_changed.join(", ")));
            }
            out.push('\n');
        }
        out
    }

    // ========== Flags ==========

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Clears both the pause and step-mode flags.
    pub fn resume(&mut self) {
        self.paused = false;
        self.step_mode = false;
    }

    /// Step mode: the debugger advances execution one statement at a time.
    pub fn enable_step_mode(&mut self) {
        self.step_mode = true;
        self.paused = true;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_step_mode(&self) -> bool {
        self.step_mode
    }

    // ========== Lifecycle ==========

    /// Drops all history, checkpoints, and the cursor. Flags are kept.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.checkpoints.clear();
        self.cursor = None;
    }
}

impl Default for TimeEngine {
    fn default() -> Self {
        TimeEngine::new()
    }
}

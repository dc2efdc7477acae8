//! State snapshots, rollback, and transactional execution.
//!
//! A [`StateSnapshot`] is a deep copy of everything rollback may need to
//! restore: the innermost scope's bindings, the global scope's bindings, the
//! call stack, and the names of registered functions. Snapshots are plain
//! data; holding one never blocks the live state.
//!
//! Rollback restores variables and empties the call stack but leaves the
//! function registry alone: definitions are code, not data, and are only
//! replaced by a reload.

use std::time::SystemTime;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::runtime::errors::AuraError;
use crate::runtime::state::StateManager;
use crate::value::Value;

/// Ring size of retained snapshots; the oldest is dropped past this.
pub const MAX_SNAPSHOTS: usize = 10;

/// A point-in-time copy of program state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub snapshot_id: u64,
    pub timestamp: SystemTime,
    /// Bindings of the innermost scope at capture time.
    pub variables: FxHashMap<String, Value>,
    /// Bindings of the global scope at capture time.
    pub global_vars: FxHashMap<String, Value>,
    /// Names of registered functions, for inspection only; rollback never
    /// applies these.
    pub functions: Vec<String>,
    pub call_stack: Vec<String>,
}

impl StateSnapshot {
    /// Merged variable view: globals overlaid with innermost bindings.
    pub fn all_vars(&self) -> FxHashMap<String, Value> {
        let mut merged = self.global_vars.clone();
        for (name, value) in &self.variables {
            merged.insert(name.clone(), value.clone());
        }
        merged
    }
}

/// Snapshot store plus rollback and transaction entry points.
pub struct StateIntegrity {
    snapshots: Vec<StateSnapshot>,
    next_id: u64,
}

impl StateIntegrity {
    pub fn new() -> Self {
        StateIntegrity {
            snapshots: Vec::new(),
            next_id: 0,
        }
    }

    /// Captures the current state, retaining the copy in the ring and
    /// returning it to the caller.
    pub fn snapshot(&mut self, state: &StateManager) -> StateSnapshot {
        let snapshot = StateSnapshot {
            snapshot_id: self.next_id,
            timestamp: SystemTime::now(),
            variables: state.current_vars().clone(),
            global_vars: state.global_vars().clone(),
            functions: state.function_names(),
            call_stack: state.call_stack().to_vec(),
        };
        self.next_id += 1;
        self.snapshots.push(snapshot.clone());
        if self.snapshots.len() > MAX_SNAPSHOTS {
            self.snapshots.remove(0);
        }
        snapshot
    }

    /// Restores `state` to `snapshot`: variables replaced wholesale, call
    /// stack cleared, functions untouched.
    pub fn rollback(&self, state: &mut StateManager, snapshot: &StateSnapshot) {
        state.current_vars_mut().clear();
        state.global_vars_mut().clear();
        state.clear_call_stack();
        for (name, value) in &snapshot.variables {
            state.current_vars_mut().insert(name.clone(), value.clone());
        }
        for (name, value) in &snapshot.global_vars {
            state.global_vars_mut().insert(name.clone(), value.clone());
        }
        debug!("state rolled back to snapshot {}", snapshot.snapshot_id);
    }

    pub fn latest(&self) -> Option<&StateSnapshot> {
        self.snapshots.last()
    }

    pub fn get(&self, snapshot_id: u64) -> Option<&StateSnapshot> {
        self.snapshots
            .iter()
            .find(|snapshot| snapshot.snapshot_id == snapshot_id)
    }

    pub fn snapshots(&self) -> &[StateSnapshot] {
        &self.snapshots
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    /// Cheap structural sanity check used by tests and the debugger: every
    /// function and call-stack entry must have a non-empty name.
    pub fn verify_state(&self, state: &StateManager) -> bool {
        state.function_names().iter().all(|name| !name.is_empty())
            && state.call_stack().iter().all(|name| !name.is_empty())
    }

    /// Runs `f` against `state` with rollback-on-error semantics: when `f`
    /// fails, state is restored to the snapshot taken on entry and the
    /// original error propagates unchanged.
    pub fn transaction<T, F>(&mut self, state: &mut StateManager, f: F) -> Result<T, AuraError>
    where
        F: FnOnce(&mut StateManager) -> Result<T, AuraError>,
    {
        let snapshot = self.snapshot(state);
        match f(state) {
            Ok(value) => Ok(value),
            Err(error) => {
                self.rollback(state, &snapshot);
                Err(error)
            }
        }
    }
}

impl Default for StateIntegrity {
    fn default() -> Self {
        StateIntegrity::new()
    }
}

/// Guard form of [`StateIntegrity::transaction`] for callers that need to
/// interleave other work between mutations.
///
/// Dropping the guard without calling [`Transaction::commit`] rolls the state
/// back to the snapshot taken by [`Transaction::begin`].
pub struct Transaction<'a> {
    state: &'a mut StateManager,
    integrity: &'a mut StateIntegrity,
    snapshot: StateSnapshot,
    finished: bool,
}

impl<'a> Transaction<'a> {
    pub fn begin(state: &'a mut StateManager, integrity: &'a mut StateIntegrity) -> Self {
        let snapshot = integrity.snapshot(state);
        Transaction {
            state,
            integrity,
            snapshot,
            finished: false,
        }
    }

    /// The state under transaction. Mutations made through this reference are
    /// kept on commit and undone on drop.
    pub fn state(&mut self) -> &mut StateManager {
        self.state
    }

    /// Keeps all mutations made since [`Transaction::begin`].
    pub fn commit(mut self) {
        self.finished = true;
    }

    /// Rolls back immediately instead of waiting for drop.
    pub fn abort(mut self) {
        self.integrity.rollback(self.state, &self.snapshot);
        self.finished = true;
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.integrity.rollback(self.state, &self.snapshot);
        }
    }
}

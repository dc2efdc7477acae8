//! Resource ceilings for untrusted programs.
//!
//! Aura programs are written by beginners, so runaway loops and unbounded
//! recursion are the normal case, not the exception. The
//! [`ResourceTracker`] holds one counter set per runtime and a `check_*`
//! guard for each ceiling. Guards are called at the point where the resource
//! is about to grow (variable creation, function registration, call entry,
//! event enqueue, loop iteration) and fail with the matching [`AuraError`]
//! kind the first time a ceiling is crossed.
//!
//! A disabled tracker passes every check without counting, which is how
//! trusted paths (debugger injection, test fixtures) bypass the ceilings.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::runtime::errors::AuraError;

/// Hard ceilings applied while a program runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceLimits {
    pub max_variables: usize,
    pub max_functions: usize,
    pub max_recursion_depth: usize,
    pub max_events: usize,
    pub max_execution_time: Duration,
    pub max_iterations: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        ResourceLimits {
            max_variables: 1000,
            max_functions: 100,
            max_recursion_depth: 100,
            max_events: 500,
            max_execution_time: Duration::from_secs(60),
            max_iterations: 1_000_000,
        }
    }
}

/// Usage counters reported by [`ResourceTracker::usage`].
#[derive(Debug, Clone, Copy)]
pub struct ResourceUsage {
    pub execution_time: Duration,
    pub iterations: u64,
    pub limits: ResourceLimits,
}

/// Shared counter set guarding one runtime.
///
/// All methods take `&self`; the tracker is safe to consult from the loop
/// thread and the controlling thread at once.
pub struct ResourceTracker {
    limits: ResourceLimits,
    started: Mutex<Option<Instant>>,
    iterations: AtomicU64,
    enabled: AtomicBool,
}

impl ResourceTracker {
    pub fn new(limits: ResourceLimits) -> Self {
        ResourceTracker {
            limits,
            started: Mutex::new(None),
            iterations: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
        }
    }

    /// Starts (or restarts) the execution clock and zeroes the iteration
    /// counter. Called whenever a fresh run begins.
    pub fn start(&self) {
        *self.started.lock() = Some(Instant::now());
        self.iterations.store(0, Ordering::Relaxed);
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Fails with a Memory error when `count` variables would exceed the
    /// ceiling.
    pub fn check_variables(&self, count: usize) -> Result<(), AuraError> {
        if self.is_enabled() && count > self.limits.max_variables {
            return Err(AuraError::memory(format!(
                "Too many variables! Maximum allowed: {}",
                self.limits.max_variables
            )));
        }
        Ok(())
    }

    /// Fails with a Memory error when `count` functions would exceed the
    /// ceiling.
    pub fn check_functions(&self, count: usize) -> Result<(), AuraError> {
        if self.is_enabled() && count > self.limits.max_functions {
            return Err(AuraError::memory(format!(
                "Too many functions! Maximum allowed: {}",
                self.limits.max_functions
            )));
        }
        Ok(())
    }

    /// Fails with a Function error when a call would push the stack past the
    /// recursion ceiling.
    pub fn check_recursion(&self, depth: usize) -> Result<(), AuraError> {
        if self.is_enabled() && depth > self.limits.max_recursion_depth {
            return Err(AuraError::function(format!(
                "Too much recursion! Maximum depth: {}",
                self.limits.max_recursion_depth
            )));
        }
        Ok(())
    }

    /// Fails with a Memory error when `pending` queued events would exceed
    /// the ceiling.
    pub fn check_events(&self, pending: usize) -> Result<(), AuraError> {
        if self.is_enabled() && pending > self.limits.max_events {
            return Err(AuraError::memory(format!(
                "Too many pending events! Maximum allowed: {}",
                self.limits.max_events
            )));
        }
        Ok(())
    }

    /// Counts one loop iteration and fails with a Loop error past the
    /// ceiling. The counter is monotonic for the tracker's lifetime; only
    /// [`ResourceTracker::start`] resets it. A disabled tracker does not
    /// count.
    pub fn check_iterations(&self) -> Result<(), AuraError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let count = self.iterations.fetch_add(1, Ordering::Relaxed) + 1;
        if count > self.limits.max_iterations {
            return Err(AuraError::loop_error(format!(
                "Too many loop iterations! Maximum allowed: {}",
                self.limits.max_iterations
            )));
        }
        Ok(())
    }

    /// Fails with a Runtime error once wall-clock time since
    /// [`ResourceTracker::start`] passes the ceiling.
    pub fn check_execution_time(&self) -> Result<(), AuraError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let elapsed = match *self.started.lock() {
            Some(started) => started.elapsed(),
            None => return Ok(()),
        };
        if elapsed > self.limits.max_execution_time {
            return Err(AuraError::runtime(format!(
                "Program ran too long! Maximum time: {}s",
                self.limits.max_execution_time.as_secs()
            )));
        }
        Ok(())
    }

    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    pub fn usage(&self) -> ResourceUsage {
        let execution_time = self
            .started
            .lock()
            .map(|started| started.elapsed())
            .unwrap_or_default();
        ResourceUsage {
            execution_time,
            iterations: self.iterations(),
            limits: self.limits,
        }
    }
}

impl Default for ResourceTracker {
    fn default() -> Self {
        ResourceTracker::new(ResourceLimits::default())
    }
}

//! Formatted views over a live runtime.
//!
//! The inspector reads only through the runtime's public dump methods, so it
//! never holds a subsystem lock across formatting. Long values are truncated
//! to keep dumps readable in a terminal.

use crate::runtime::engine::AuraRuntime;
use crate::value::Value;

/// Values longer than this render truncated with a `...` tail.
const VALUE_PREVIEW_LEN: usize = 50;

/// Read-only formatter over a runtime.
pub struct RuntimeInspector<'a> {
    runtime: &'a AuraRuntime,
}

impl<'a> RuntimeInspector<'a> {
    pub fn new(runtime: &'a AuraRuntime) -> Self {
        RuntimeInspector { runtime }
    }

    /// Display form of one value, truncated past [`VALUE_PREVIEW_LEN`].
    pub fn value_preview(value: &Value) -> String {
        let rendered = value.to_string();
        if rendered.chars().count() > VALUE_PREVIEW_LEN {
            let head: String = rendered.chars().take(VALUE_PREVIEW_LEN - 3).collect();
            format!("{}...", head)
        } else {
            rendered
        }
    }

    pub fn format_variables(&self) -> String {
        let dump = self.runtime.inspect_state();
        let mut out = String::from("=== Variables ===\n");
        if dump.variables.is_empty() {
            out.push_str("  (no variables)\n");
            return out;
        }
        let mut names: Vec<&String> = dump.variables.keys().collect();
        names.sort();
        for name in names {
            let value = &dump.variables[name];
            out.push_str(&format!("  {} = {}\n", name, Self::value_preview(value)));
        }
        out
    }

    pub fn format_functions(&self) -> String {
        let dump = self.runtime.inspect_state();
        let mut out = String::from("=== Functions ===\n");
        if dump.functions.is_empty() {
            out.push_str("  (no functions)\n");
            return out;
        }
        for name in &dump.functions {
            out.push_str(&format!("  - {}()\n", name));
        }
        out
    }

    pub fn format_events(&self) -> String {
        let dump = self.runtime.inspect_state();
        let status = self.runtime.status();
        let mut out = String::from("=== Events ===\n");
        out.push_str(&format!(
            "  pending: {}  processed: {}\n",
            status.pending_events, status.processed_events
        ));
        if dump.handlers.is_empty() {
            out.push_str("  (no handlers)\n");
        } else {
            for name in &dump.handlers {
                out.push_str(&format!("  on {}\n", name));
            }
        }
        out
    }

    pub fn format_memory(&self) -> String {
        let status = self.runtime.status();
        let usage = self.runtime.resource_usage();
        let mut out = String::from("=== Resources ===\n");
        out.push_str(&format!(
            "  variables: {}/{}\n",
            status.variable_count, usage.limits.max_variables
        ));
        out.push_str(&format!(
            "  functions: {}/{}\n",
            status.function_count, usage.limits.max_functions
        ));
        out.push_str(&format!(
            "  events pending: {}/{}\n",
            status.pending_events, usage.limits.max_events
        ));
        out.push_str(&format!(
            "  iterations: {}/{}\n",
            usage.iterations, usage.limits.max_iterations
        ));
        out.push_str(&format!(
            "  execution time: {:.1}s/{}s\n",
            usage.execution_time.as_secs_f64(),
            usage.limits.max_execution_time.as_secs()
        ));
        out
    }

    pub fn format_status(&self) -> String {
        let status = self.runtime.status();
        let state = if !status.running {
            "stopped"
        } else if status.paused {
            "paused"
        } else {
            "running"
        };
        format!(
            "=== Runtime ===\n  state: {}\n  uptime: {:.1}s\n  loop iterations: {}\n",
            state,
            status.uptime.as_secs_f64(),
            status.loop_iterations
        )
    }

    /// Every section plus the timeline window, joined into one dump.
    pub fn format_full_state(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.format_status());
        out.push_str(&self.format_variables());
        out.push_str(&self.format_functions());
        out.push_str(&self.format_events());
        out.push_str(&self.format_memory());
        out.push_str(&self.runtime.format_timeline(5));
        out
    }
}

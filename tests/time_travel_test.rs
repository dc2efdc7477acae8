// Integration tests for execution history: recording, cursor navigation,
// checkpoints, eviction, and restoring live state from a past step.

use aura_engine::exec::AuraExecutor;
use aura_engine::program::{Expr, Program, Stmt, StmtKind};
use aura_engine::runtime::engine::AuraRuntime;
use aura_engine::runtime::errors::ErrorKind;
use aura_engine::runtime::integrity::StateIntegrity;
use aura_engine::runtime::state::StateManager;
use aura_engine::runtime::time_engine::TimeEngine;
use aura_engine::value::Value;

fn set_stmt(name: &str, n: f64, line: usize) -> Stmt {
    Stmt::new(
        StmtKind::Set {
            name: name.to_string(),
            expr: Expr::number(n),
        },
        Some(line),
        format!("set {} to {}", name, n),
    )
}

/// Builds a runtime, runs one `set` per entry, and leaves history behind.
fn run_sets(values: &[(&str, f64)]) -> AuraRuntime {
    let statements = values
        .iter()
        .enumerate()
        .map(|(i, (name, n))| set_stmt(name, *n, i + 1))
        .collect();
    let runtime = AuraRuntime::new();
    runtime.load_program(Program::new(statements)).expect("load");
    runtime
        .execute_once(&mut AuraExecutor::new())
        .expect("run");
    runtime
}

/// Records one variable write as a history step with real snapshots.
fn record_set(
    engine: &mut TimeEngine,
    integrity: &mut StateIntegrity,
    state: &mut StateManager,
    name: &str,
    value: f64,
) -> usize {
    let before = integrity.snapshot(state);
    state.set_var(name, Value::Number(value));
    let after = integrity.snapshot(state);
    engine.record_step(
        "set",
        &format!("set {} to {}", name, value),
        Some(1),
        before,
        after,
    )
}

// === RECORDING ===

#[test]
fn test_recording_numbers_steps_and_snaps_cursor() {
    let mut engine = TimeEngine::new();
    let mut integrity = StateIntegrity::new();
    let mut state = StateManager::new();

    assert_eq!(record_set(&mut engine, &mut integrity, &mut state, "x", 1.0), 0);
    assert_eq!(record_set(&mut engine, &mut integrity, &mut state, "x", 2.0), 1);
    assert_eq!(record_set(&mut engine, &mut integrity, &mut state, "y", 3.0), 2);

    assert_eq!(engine.len(), 3);
    assert_eq!(engine.cursor(), Some(2));
    let current = engine.current_step().expect("cursor on newest");
    assert_eq!(current.step_number, 2);
    assert_eq!(current.node_type, "set");
    assert_eq!(current.summary, "set y to 3");

    // The state at the cursor is the newest step's after-snapshot
    let at_cursor = engine.current_state().expect("state at cursor");
    assert_eq!(at_cursor.all_vars().get("y"), Some(&Value::Number(3.0)));
}

#[test]
fn test_step_captures_changed_variables() {
    let mut engine = TimeEngine::new();
    let mut integrity = StateIntegrity::new();
    let mut state = StateManager::new();
    state.set_var("x", Value::Number(1.0));
    state.set_var("y", Value::Number(2.0));

    // One step that rebinds y and introduces z
    let before = integrity.snapshot(&state);
    state.set_var("y", Value::Number(3.0));
    state.set_var("z", Value::Number(4.0));
    let after = integrity.snapshot(&state);
    engine.record_step("set", "set y and z", None, before, after);

    let step = engine.current_step().expect("step");
    assert_eq!(step.variables_changed, vec!["y".to_string(), "z".to_string()]);

    // A removed binding counts as changed too
    let before = integrity.snapshot(&state);
    state.current_vars_mut().remove("z");
    let after = integrity.snapshot(&state);
    engine.record_step("set", "unset z", None, before, after);

    let step = engine.current_step().expect("step");
    assert_eq!(step.variables_changed, vec!["z".to_string()]);
}

#[test]
fn test_scoped_snapshots_do_not_mark_untouched_globals() {
    let mut engine = TimeEngine::new();
    let mut integrity = StateIntegrity::new();
    let mut state = StateManager::new();
    state.set_var("g", Value::Number(7.0));

    // Step captured across a scope pop: the local vanishes, g never moves
    state.push_scope();
    state.set_var("local", Value::Number(1.0));
    let before = integrity.snapshot(&state);
    state.pop_scope();
    let after = integrity.snapshot(&state);
    engine.record_step("call", "leave helper", None, before, after);

    let step = engine.current_step().expect("step");
    assert_eq!(step.variables_changed, vec!["local".to_string()]);
}

#[test]
fn test_engine_records_one_step_per_statement() {
    let runtime = run_sets(&[("x", 1.0), ("x", 2.0), ("y", 9.0)]);
    let stats = runtime.time_stats();
    assert_eq!(stats.total_steps, 3);
    assert_eq!(stats.cursor, Some(2), "cursor lands on the newest step");

    let step = runtime.current_step().expect("current");
    assert_eq!(step.summary, "set y to 9");
    assert_eq!(step.line_number, Some(3));
}

// === NAVIGATION ===

#[test]
fn test_step_navigation_stops_at_both_ends() {
    let runtime = run_sets(&[("x", 1.0), ("x", 2.0), ("x", 3.0)]);

    let step = runtime.step_backward().expect("one back");
    assert_eq!(step.step_number, 1);
    let step = runtime.step_backward().expect("two back");
    assert_eq!(step.step_number, 0);
    assert!(runtime.step_backward().is_none(), "already at the oldest step");

    let step = runtime.step_forward().expect("one forward");
    assert_eq!(step.step_number, 1);
    let step = runtime.step_forward().expect("back at the newest");
    assert_eq!(step.step_number, 2);
    assert!(runtime.step_forward().is_none(), "already at the newest step");
}

#[test]
fn test_rewind_and_fast_forward_clamp() {
    let runtime = run_sets(&[("x", 1.0), ("x", 2.0), ("x", 3.0), ("x", 4.0), ("x", 5.0)]);

    let step = runtime.rewind(100).expect("clamped at the oldest");
    assert_eq!(step.step_number, 0);
    assert_eq!(runtime.time_stats().cursor, Some(0));

    let step = runtime.fast_forward(100).expect("clamped at the newest");
    assert_eq!(step.step_number, 4);

    let step = runtime.rewind(2).expect("two back");
    assert_eq!(step.step_number, 2);
    let step = runtime.fast_forward(1).expect("one forward");
    assert_eq!(step.step_number, 3);
}

#[test]
fn test_navigation_on_empty_history() {
    let mut engine = TimeEngine::new();
    assert!(engine.step_forward().is_none());
    assert!(engine.step_backward().is_none());
    assert!(engine.rewind(3).is_none());
    assert!(engine.fast_forward(3).is_none());
    assert!(engine.goto_step(0).is_none());
    assert!(engine.current_step().is_none());
}

#[test]
fn test_goto_step_rejects_out_of_range() {
    let runtime = run_sets(&[("x", 1.0), ("x", 2.0)]);
    assert!(runtime.goto_step(0).is_some());
    assert!(runtime.goto_step(5).is_none());
    // A rejected jump leaves the cursor where it was
    assert_eq!(runtime.time_stats().cursor, Some(0));
}

// === EVICTION ===

#[test]
fn test_bounded_history_keeps_logical_numbers() {
    let mut engine = TimeEngine::with_max_history(5);
    let mut integrity = StateIntegrity::new();
    let mut state = StateManager::new();

    for i in 0..8 {
        record_set(&mut engine, &mut integrity, &mut state, "x", i as f64);
    }

    assert_eq!(engine.len(), 5);
    let numbers: Vec<usize> = engine.steps().map(|step| step.step_number).collect();
    assert_eq!(numbers, vec![3, 4, 5, 6, 7], "oldest steps evicted, numbers kept");

    // Numbering continues from the last retained step
    let next = record_set(&mut engine, &mut integrity, &mut state, "x", 8.0);
    assert_eq!(next, 8);
}

#[test]
fn test_eviction_shifts_then_drops_checkpoints() {
    let mut engine = TimeEngine::with_max_history(3);
    let mut integrity = StateIntegrity::new();
    let mut state = StateManager::new();

    for i in 0..3 {
        record_set(&mut engine, &mut integrity, &mut state, "x", i as f64);
    }
    engine.goto_step(1).expect("jump");
    assert_eq!(engine.create_checkpoint("mid"), Some(1));

    // Evicting the oldest step shifts the checkpoint down one index
    record_set(&mut engine, &mut integrity, &mut state, "x", 3.0);
    assert_eq!(engine.checkpoints(), vec![("mid".to_string(), 0)]);
    let step = engine.goto_checkpoint("mid").expect("still reachable");
    assert_eq!(step.step_number, 1, "checkpoint follows its logical step");

    // The next eviction takes the checkpointed step with it
    record_set(&mut engine, &mut integrity, &mut state, "x", 4.0);
    assert!(engine.checkpoints().is_empty());
    assert!(engine.goto_checkpoint("mid").is_none());
}

// === CHECKPOINTS ===

#[test]
fn test_checkpoint_roundtrip() {
    let runtime = run_sets(&[("x", 1.0), ("x", 2.0), ("x", 3.0)]);

    assert_eq!(runtime.create_checkpoint("lesson"), Some(2));
    runtime.rewind(2).expect("rewind");
    assert_eq!(runtime.time_stats().cursor, Some(0));

    let step = runtime.goto_checkpoint("lesson").expect("jump");
    assert_eq!(step.step_number, 2);
    assert_eq!(runtime.time_stats().cursor, Some(2));

    assert!(runtime.goto_checkpoint("never-made").is_none());
}

#[test]
fn test_checkpoint_requires_history() {
    let mut engine = TimeEngine::new();
    assert_eq!(engine.create_checkpoint("too-early"), None);
}

// === LIVE STATE ROLLBACK ===

#[test]
fn test_rollback_to_step_restores_live_state() {
    let runtime = run_sets(&[("x", 1.0), ("x", 2.0), ("x", 3.0)]);
    assert_eq!(runtime.get_variable("x").expect("x"), Value::Number(3.0));

    runtime.rollback_to_step(0).expect("rollback");
    assert_eq!(
        runtime.get_variable("x").expect("x after rollback"),
        Value::Number(1.0)
    );
    // Cursor and live state agree afterwards
    assert_eq!(runtime.time_stats().cursor, Some(0));
}

#[test]
fn test_rollback_to_missing_step_fails() {
    let runtime = run_sets(&[("x", 1.0), ("x", 2.0), ("x", 3.0)]);

    let error = runtime.rollback_to_step(99).expect_err("no such step");
    assert_eq!(error.kind(), ErrorKind::Runtime);
    assert_eq!(error.message(), "No step 99 in history");
    // Nothing moved
    assert_eq!(runtime.time_stats().cursor, Some(2));
    assert_eq!(runtime.get_variable("x").expect("x"), Value::Number(3.0));
}

// === QUERIES ===

#[test]
fn test_variable_history_tracks_values_over_time() {
    let runtime = run_sets(&[("x", 1.0), ("x", 2.0), ("y", 9.0)]);

    assert_eq!(
        runtime.variable_history("x"),
        vec![
            (0, Value::Number(1.0)),
            (1, Value::Number(2.0)),
            (2, Value::Number(2.0)),
        ]
    );
    assert_eq!(runtime.variable_history("y"), vec![(2, Value::Number(9.0))]);
    assert!(runtime.variable_history("never").is_empty());
}

#[test]
fn test_timeline_entries_carry_cursor_and_checkpoint_flags() {
    let runtime = run_sets(&[("x", 1.0), ("x", 2.0), ("x", 3.0)]);
    runtime.create_checkpoint("here").expect("checkpoint");
    runtime.step_backward().expect("one back");

    let entries = runtime.timeline_entries(10);
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].summary, "set x to 1");
    assert_eq!(entries[0].node_type, "set");
    assert!(!entries[0].is_cursor);
    assert!(entries[1].is_cursor);
    assert_eq!(entries[2].checkpoint, Some("here".to_string()));
    assert_eq!(entries[2].step_number, 2);
    assert_eq!(entries[1].variables_changed, vec!["x".to_string()]);
}

#[test]
fn test_timeline_entries_empty_without_history() {
    let runtime = AuraRuntime::new();
    assert!(runtime.timeline_entries(10).is_empty());
}

#[test]
fn test_format_timeline_marks_the_cursor() {
    let mut engine = TimeEngine::new();
    assert_eq!(engine.format_timeline(5), "No execution history");

    let mut integrity = StateIntegrity::new();
    let mut state = StateManager::new();
    record_set(&mut engine, &mut integrity, &mut state, "x", 1.0);
    record_set(&mut engine, &mut integrity, &mut state, "x", 2.0);
    engine.step_backward().expect("one back");

    let formatted = engine.format_timeline(5);
    println!("{}", formatted);
    assert!(formatted.starts_with("Timeline (2 steps):"));
    assert!(formatted.contains("→ 0: set"));
    assert!(formatted.contains("[x]"), "changed variables are annotated");
    assert!(!formatted.contains("→ 1:"), "only the cursor line is marked");
}

// === FLAGS AND LIFECYCLE ===

#[test]
fn test_pause_resume_and_step_mode_flags() {
    let mut engine = TimeEngine::new();
    assert!(!engine.is_paused());
    assert!(!engine.is_step_mode());

    engine.pause();
    assert!(engine.is_paused());

    engine.enable_step_mode();
    assert!(engine.is_step_mode());
    assert!(engine.is_paused(), "step mode implies paused");

    engine.resume();
    assert!(!engine.is_paused());
    assert!(!engine.is_step_mode(), "resume clears step mode");
}

#[test]
fn test_clear_history_drops_steps_keeps_flags() {
    let mut engine = TimeEngine::new();
    let mut integrity = StateIntegrity::new();
    let mut state = StateManager::new();
    record_set(&mut engine, &mut integrity, &mut state, "x", 1.0);
    engine.create_checkpoint("gone").expect("checkpoint");
    engine.pause();

    engine.clear_history();

    assert!(engine.is_empty());
    let stats = engine.stats();
    assert_eq!(stats.total_steps, 0);
    assert_eq!(stats.cursor, None);
    assert_eq!(stats.checkpoints, 0);
    assert!(stats.paused, "flags survive a history clear");
}

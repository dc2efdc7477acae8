//! # Introduction
//!
//! Aura Engine runs programs in the Aura learning language inside a
//! persistent runtime: state survives across executions, every statement is
//! recorded into a navigable history, and a background loop services timers
//! and events until told to stop. The history is explored forward and
//! backward through a terminal UI built with
//! [ratatui](https://docs.rs/ratatui).
//!
//! ## Execution pipeline
//!
//! ```text
//! Program (AST) → Executor → State Manager → Snapshots → Time Engine → TUI
//!                     ↑
//!              Scheduler → Event Queue → Handlers
//! ```
//!
//! 1. [`program`]: the statement/expression tree a front end hands to the
//!    engine; the engine itself never parses source text.
//! 2. [`exec`]: the [`exec::StatementExecutor`] seam and the built-in tree
//!    walker, plus captured `print` output.
//! 3. [`runtime`]: the persistent core with state, events, resource
//!    governor, snapshots, time engine, recorder, and the
//!    [`runtime::AuraRuntime`] orchestrator.
//! 4. [`value`]: the dynamically typed [`value::Value`] carried everywhere.
//! 5. [`ui`]: ratatui-based debugger TUI; not part of the stable library
//!    API.
//!
//! ## Supported statement forms
//!
//! `set`, `print`, `if/else`, `repeat N times`, `define`, `call`. The set is
//! closed on purpose: executors match on it exhaustively.

pub mod exec;
pub mod program;
pub mod runtime;
pub mod ui;
pub mod value;

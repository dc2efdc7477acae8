//! Main TUI application state and logic

use crate::runtime::AuraRuntime;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    Frame, Terminal,
    backend::Backend,
    layout::{Constraint, Direction, Layout},
};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How many timeline rows to show either side of the cursor
const TIMELINE_CONTEXT: usize = 20;
/// How many recorded events the events pane shows
const RECENT_EVENTS: usize = 30;

/// Which pane is currently focused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusedPane {
    Variables,
    Timeline,
    Events,
    Output,
}

impl FocusedPane {
    /// Move focus to the next pane (clockwise: variables -> timeline -> output -> events)
    pub fn next(self) -> Self {
        match self {
            FocusedPane::Variables => FocusedPane::Timeline,
            FocusedPane::Timeline => FocusedPane::Output,
            FocusedPane::Output => FocusedPane::Events,
            FocusedPane::Events => FocusedPane::Variables,
        }
    }

    /// Move focus to the previous pane (counter-clockwise)
    pub fn prev(self) -> Self {
        match self {
            FocusedPane::Variables => FocusedPane::Events,
            FocusedPane::Timeline => FocusedPane::Variables,
            FocusedPane::Output => FocusedPane::Timeline,
            FocusedPane::Events => FocusedPane::Output,
        }
    }
}

/// The main application state
pub struct App {
    /// The runtime being debugged; the loop thread shares this Arc
    pub runtime: Arc<AuraRuntime>,

    /// Currently focused pane
    pub focused_pane: FocusedPane,

    /// Per-pane scroll offsets
    pub variables_scroll: usize,
    pub events_scroll: usize,
    pub output_scroll: usize,

    /// Whether the app should quit
    pub should_quit: bool,

    /// Status message to display
    pub status_message: String,

    /// Counter for auto-named checkpoints
    pub checkpoint_counter: usize,

    /// Last time space was pressed (for debouncing)
    pub last_space_press: Instant,
}

impl App {
    /// Create a new app attached to the given runtime
    pub fn new(runtime: Arc<AuraRuntime>) -> Self {
        App {
            runtime,
            focused_pane: FocusedPane::Timeline,
            variables_scroll: 0,
            events_scroll: 0,
            output_scroll: 0,
            should_quit: false,
            status_message: String::from("Ready!"),
            checkpoint_counter: 0,
            last_space_press: Instant::now()
                .checked_sub(Duration::from_secs(1))
                .unwrap_or(Instant::now()),
        }
    }

    /// Run the TUI application
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;

            if self.should_quit {
                break;
            }

            // Poll with a timeout so loop-thread activity shows up promptly
            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key_event(key);
                    }
                }
            }
        }

        Ok(())
    }

    /// Render the UI
    fn render(&mut self, frame: &mut Frame) {
        let size = frame.area();

        // Pull this frame's data out of the runtime up front
        let status = self.runtime.status();
        let dump = self.runtime.inspect_state();
        let stats = self.runtime.time_stats();
        let entries = self.runtime.timeline_entries(TIMELINE_CONTEXT);
        let output = self.runtime.output_lines();
        let recent = self.runtime.recorder().recent(RECENT_EVENTS);

        let mut variables: Vec<_> = dump.variables.clone().into_iter().collect();
        variables.sort_by(|(a, _), (b, _)| a.cmp(b));

        // Create layout: 4 panes in 2 columns, plus status bar at bottom
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(size);

        let pane_area = main_chunks[0];
        let status_area = main_chunks[1];

        // Split into 2 columns
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(pane_area);

        // Left column: Variables (top) | Events (bottom)
        let left_rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(columns[0]);

        // Right column: Timeline (top) | Output (bottom)
        let right_rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(columns[1]);

        super::panes::render_variables_pane(
            frame,
            left_rows[0],
            &variables,
            self.focused_pane == FocusedPane::Variables,
            &mut self.variables_scroll,
        );

        super::panes::render_events_pane(
            frame,
            left_rows[1],
            &dump.handlers,
            &recent,
            &status,
            self.focused_pane == FocusedPane::Events,
            &mut self.events_scroll,
        );

        super::panes::render_timeline_pane(
            frame,
            right_rows[0],
            &entries,
            &stats,
            self.focused_pane == FocusedPane::Timeline,
        );

        super::panes::render_output_pane(
            frame,
            right_rows[1],
            &output,
            self.focused_pane == FocusedPane::Output,
            &mut self.output_scroll,
        );

        super::panes::render_status_bar(frame, status_area, &status, &stats, &self.status_message);
    }

    /// Handle keyboard events
    fn handle_key_event(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.runtime.stop();
                self.should_quit = true;
            }
            // Number keys step forward N times directly
            KeyCode::Char(c @ '1'..='9') => {
                let n = c.to_digit(10).unwrap() as usize;
                match self.runtime.fast_forward(n) {
                    Some(step) => {
                        self.status_message = format!("Jumped to step {}", step.step_number);
                    }
                    None => {
                        self.status_message = "No execution history".to_string();
                    }
                }
            }
            KeyCode::Tab => {
                self.focused_pane = self.focused_pane.next();
            }
            KeyCode::BackTab => {
                self.focused_pane = self.focused_pane.prev();
            }
            KeyCode::Left => {
                self.step_backward();
            }
            KeyCode::Right => {
                self.step_forward();
            }
            KeyCode::PageUp => {
                if let Some(step) = self.runtime.rewind(5) {
                    self.status_message = format!("Rewound to step {}", step.step_number);
                }
            }
            KeyCode::PageDown => {
                if let Some(step) = self.runtime.fast_forward(5) {
                    self.status_message = format!("Forwarded to step {}", step.step_number);
                }
            }
            KeyCode::Backspace | KeyCode::Home => {
                // Jump to start of execution
                if self.runtime.goto_step(0).is_some() {
                    self.status_message = "Jumped to start".to_string();
                }
            }
            KeyCode::Enter | KeyCode::End => {
                // Jump to end of execution
                let total = self.runtime.time_stats().total_steps;
                if total > 0 && self.runtime.goto_step(total - 1).is_some() {
                    self.status_message = "Jumped to end".to_string();
                    self.output_scroll = usize::MAX;
                }
            }
            KeyCode::Up => match self.focused_pane {
                FocusedPane::Variables => {
                    self.variables_scroll = self.variables_scroll.saturating_sub(1);
                }
                FocusedPane::Timeline => {
                    self.step_backward();
                }
                FocusedPane::Events => {
                    self.events_scroll = self.events_scroll.saturating_sub(1);
                }
                FocusedPane::Output => {
                    self.output_scroll = self.output_scroll.saturating_sub(1);
                }
            },
            KeyCode::Down => match self.focused_pane {
                FocusedPane::Variables => {
                    self.variables_scroll = self.variables_scroll.saturating_add(1);
                }
                FocusedPane::Timeline => {
                    self.step_forward();
                }
                FocusedPane::Events => {
                    self.events_scroll = self.events_scroll.saturating_add(1);
                }
                FocusedPane::Output => {
                    self.output_scroll = self.output_scroll.saturating_add(1);
                }
            },
            KeyCode::Char(' ') => {
                // Toggle pause (with 200ms debounce to prevent key repeat spam)
                if self.last_space_press.elapsed() >= Duration::from_millis(200) {
                    self.last_space_press = Instant::now();
                    if self.runtime.is_paused() {
                        self.runtime.resume();
                        self.status_message = "Resumed".to_string();
                    } else {
                        self.runtime.pause();
                        self.status_message = "Paused".to_string();
                    }
                }
            }
            KeyCode::Char('c') => {
                self.checkpoint_counter += 1;
                let name = format!("cp-{}", self.checkpoint_counter);
                match self.runtime.create_checkpoint(name.clone()) {
                    Some(index) => {
                        self.status_message = format!("Checkpoint '{}' at step {}", name, index);
                    }
                    None => {
                        self.checkpoint_counter -= 1;
                        self.status_message = "Nothing to checkpoint yet".to_string();
                    }
                }
            }
            KeyCode::Char('b') => {
                // Roll live state back to the step under the cursor
                match self.runtime.time_stats().cursor {
                    Some(cursor) => match self.runtime.rollback_to_step(cursor) {
                        Ok(()) => {
                            self.status_message =
                                format!("Live state rolled back to step {}", cursor);
                        }
                        Err(e) => {
                            self.status_message = format!("Rollback failed: {}", e.message());
                        }
                    },
                    None => {
                        self.status_message = "No step to roll back to".to_string();
                    }
                }
            }
            _ => {}
        }
    }

    /// Move the timeline cursor one step forward
    fn step_forward(&mut self) {
        match self.runtime.step_forward() {
            Some(step) => {
                self.status_message = format!("Step {}: {}", step.step_number, step.summary);
                self.output_scroll = usize::MAX;
            }
            None => {
                self.status_message = "Already at the latest step".to_string();
            }
        }
    }

    /// Move the timeline cursor one step backward
    fn step_backward(&mut self) {
        match self.runtime.step_backward() {
            Some(step) => {
                self.status_message = format!("Step {}: {}", step.step_number, step.summary);
            }
            None => {
                self.status_message = "Already at the first step".to_string();
            }
        }
    }
}

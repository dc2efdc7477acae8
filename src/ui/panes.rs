//! Rendering logic for each TUI pane
//!
//! Panes draw from data the [`App`](super::app::App) pulled out of the
//! runtime for this frame, so rendering never holds an engine lock.

use crate::runtime::engine::{RuntimeStatus, TimelineEntry};
use crate::runtime::recorder::RecordedEvent;
use crate::runtime::time_engine::TimeStats;
use crate::ui::theme::DEFAULT_THEME;
use crate::value::Value;

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Padding, Paragraph},
};

fn border_style(is_focused: bool) -> Style {
    if is_focused {
        Style::default()
            .fg(DEFAULT_THEME.border_focused)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(DEFAULT_THEME.border_normal)
    }
}

/// Clamp `scroll_offset` to the valid range and return the rows to draw.
fn visible_slice<T: Clone>(items: &[T], area: Rect, scroll_offset: &mut usize) -> Vec<T> {
    let visible_height = area.height.saturating_sub(2).max(1) as usize; // Account for borders (2), min 1
    if items.len() > visible_height {
        let max_scroll = items.len() - visible_height;
        *scroll_offset = (*scroll_offset).min(max_scroll);
    } else {
        *scroll_offset = 0;
    }
    items
        .iter()
        .skip(*scroll_offset)
        .take(visible_height)
        .cloned()
        .collect()
}

fn value_style(value: &Value) -> Style {
    match value {
        Value::Number(_) => Style::default().fg(DEFAULT_THEME.number),
        Value::Str(_) => Style::default().fg(DEFAULT_THEME.string),
        Value::Bool(_) => Style::default().fg(DEFAULT_THEME.primary),
        Value::List(_) => Style::default().fg(DEFAULT_THEME.fg),
        Value::Null => Style::default().fg(DEFAULT_THEME.comment),
    }
}

/// Render the variables pane (names sorted, values colored by type)
pub fn render_variables_pane(
    frame: &mut Frame,
    area: Rect,
    variables: &[(String, Value)],
    is_focused: bool,
    scroll_offset: &mut usize,
) {
    let block = Block::default()
        .title(" Variables ")
        .borders(Borders::ALL)
        .border_style(border_style(is_focused));

    if variables.is_empty() {
        let paragraph = Paragraph::new("(no variables)")
            .block(block)
            .style(Style::default().fg(DEFAULT_THEME.comment));
        frame.render_widget(paragraph, area);
        return;
    }

    let block = block.padding(Padding::new(1, 0, 0, 0));
    let rows = visible_slice(variables, area, scroll_offset);
    let items: Vec<ListItem> = rows
        .iter()
        .map(|(name, value)| {
            let spans = vec![
                Span::styled(name.clone(), Style::default().fg(DEFAULT_THEME.fg)),
                Span::styled(" = ", Style::default().fg(DEFAULT_THEME.comment)),
                Span::styled(value.to_string(), value_style(value)),
            ];
            ListItem::new(Line::from(spans))
        })
        .collect();
    frame.render_widget(List::new(items).block(block), area);
}

/// Render the timeline pane: a window of recorded steps around the cursor
pub fn render_timeline_pane(
    frame: &mut Frame,
    area: Rect,
    entries: &[TimelineEntry],
    stats: &TimeStats,
    is_focused: bool,
) {
    let title = format!(" Timeline ({} steps) ", stats.total_steps);
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style(is_focused));

    if entries.is_empty() {
        let paragraph = Paragraph::new("(no execution history)")
            .block(block)
            .style(Style::default().fg(DEFAULT_THEME.comment));
        frame.render_widget(paragraph, area);
        return;
    }

    let block = block.padding(Padding::new(1, 0, 0, 0));
    let items: Vec<ListItem> = entries
        .iter()
        .map(|entry| {
            let marker = if entry.is_cursor { "→ " } else { "  " };
            let mut spans = vec![
                Span::styled(marker, Style::default().fg(DEFAULT_THEME.marker)),
                Span::styled(
                    format!("{:>4} ", entry.step_number),
                    Style::default().fg(DEFAULT_THEME.comment),
                ),
                Span::styled(
                    format!("{:<7}", entry.node_type),
                    Style::default().fg(DEFAULT_THEME.primary),
                ),
                Span::styled(entry.summary.clone(), Style::default().fg(DEFAULT_THEME.fg)),
            ];
            if !entry.variables_changed.is_empty() {
                spans.push(Span::styled(
                    format!(" [{}]", entry.variables_changed.join(", ")),
                    Style::default().fg(DEFAULT_THEME.secondary),
                ));
            }
            if let Some(checkpoint) = &entry.checkpoint {
                spans.push(Span::styled(
                    format!(" ⚑ {}", checkpoint),
                    Style::default().fg(DEFAULT_THEME.success),
                ));
            }
            let item = ListItem::new(Line::from(spans));
            if entry.is_cursor {
                item.style(Style::default().bg(DEFAULT_THEME.current_line_bg))
            } else {
                item
            }
        })
        .collect();
    frame.render_widget(List::new(items).block(block), area);
}

/// Render the events pane: registered handlers, then recent recorded activity
pub fn render_events_pane(
    frame: &mut Frame,
    area: Rect,
    handlers: &[String],
    recent: &[RecordedEvent],
    status: &RuntimeStatus,
    is_focused: bool,
    scroll_offset: &mut usize,
) {
    let title = format!(
        " Events ({} pending / {} processed) ",
        status.pending_events, status.processed_events
    );
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style(is_focused));

    let mut lines: Vec<Line> = Vec::new();
    for name in handlers {
        lines.push(Line::from(vec![
            Span::styled("on ", Style::default().fg(DEFAULT_THEME.comment)),
            Span::styled(name.clone(), Style::default().fg(DEFAULT_THEME.function)),
        ]));
    }
    if !handlers.is_empty() && !recent.is_empty() {
        lines.push(Line::from(Span::styled(
            "─".repeat(area.width.saturating_sub(4) as usize),
            Style::default().fg(DEFAULT_THEME.border_normal),
        )));
    }
    for event in recent {
        let mut spans = vec![Span::styled(
            event.event_type.clone(),
            Style::default().fg(DEFAULT_THEME.secondary),
        )];
        if !event.data.is_empty() {
            let mut parts: Vec<String> = event
                .data
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect();
            parts.sort();
            spans.push(Span::styled(
                format!(" {}", parts.join(" ")),
                Style::default().fg(DEFAULT_THEME.comment),
            ));
        }
        lines.push(Line::from(spans));
    }

    if lines.is_empty() {
        let paragraph = Paragraph::new("(no event activity)")
            .block(block)
            .style(Style::default().fg(DEFAULT_THEME.comment));
        frame.render_widget(paragraph, area);
        return;
    }

    let block = block.padding(Padding::new(1, 0, 0, 0));
    let rows = visible_slice(&lines, area, scroll_offset);
    let items: Vec<ListItem> = rows.into_iter().map(ListItem::new).collect();
    frame.render_widget(List::new(items).block(block), area);
}

/// Render the program output pane (captured `print` lines)
pub fn render_output_pane(
    frame: &mut Frame,
    area: Rect,
    lines: &[String],
    is_focused: bool,
    scroll_offset: &mut usize,
) {
    let block = Block::default()
        .title(" Output ")
        .borders(Borders::ALL)
        .border_style(border_style(is_focused));

    if lines.is_empty() {
        let paragraph = Paragraph::new("(no output)")
            .block(block)
            .style(Style::default().fg(DEFAULT_THEME.comment));
        frame.render_widget(paragraph, area);
        return;
    }

    let block = block.padding(Padding::new(1, 0, 0, 0));
    let rows = visible_slice(lines, area, scroll_offset);
    let items: Vec<ListItem> = rows
        .iter()
        .map(|line| ListItem::new(line.as_str()).style(Style::default().fg(DEFAULT_THEME.fg)))
        .collect();
    frame.render_widget(List::new(items).block(block), area);
}

/// Render the status bar: runtime state and step position on the left,
/// keybinds on the right
pub fn render_status_bar(
    frame: &mut Frame,
    area: Rect,
    status: &RuntimeStatus,
    stats: &TimeStats,
    message: &str,
) {
    let layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);

    let (state_text, state_bg) = if !status.running {
        (" STOPPED ", DEFAULT_THEME.error)
    } else if status.paused {
        (" PAUSED ", DEFAULT_THEME.secondary)
    } else {
        (" RUNNING ", DEFAULT_THEME.success)
    };

    let step_text = match stats.cursor {
        Some(cursor) => format!(" Step {}/{} ", cursor + 1, stats.total_steps),
        None => " Step -/- ".to_string(),
    };

    let left_spans = vec![
        Span::styled(
            state_text,
            Style::default()
                .bg(state_bg)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            step_text,
            Style::default()
                .bg(DEFAULT_THEME.primary)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {} ", message),
            Style::default()
                .bg(DEFAULT_THEME.current_line_bg)
                .fg(DEFAULT_THEME.fg),
        ),
    ];
    let left_paragraph = Paragraph::new(Line::from(left_spans))
        .style(Style::default().bg(DEFAULT_THEME.current_line_bg))
        .alignment(Alignment::Left);
    frame.render_widget(left_paragraph, layout[0]);

    let key_style = Style::default().bg(DEFAULT_THEME.comment).fg(Color::Black);
    let desc_style = Style::default()
        .bg(DEFAULT_THEME.current_line_bg)
        .fg(DEFAULT_THEME.fg);
    let sep_style = Style::default()
        .bg(DEFAULT_THEME.current_line_bg)
        .fg(DEFAULT_THEME.comment);

    let right_spans = vec![
        Span::styled(" ←/→ ", key_style),
        Span::styled(" step ", desc_style),
        Span::styled("│", sep_style),
        Span::styled(" space ", key_style),
        Span::styled(" pause ", desc_style),
        Span::styled("│", sep_style),
        Span::styled(" c ", key_style),
        Span::styled(" checkpoint ", desc_style),
        Span::styled("│", sep_style),
        Span::styled(" b ", key_style),
        Span::styled(" rollback ", desc_style),
        Span::styled("│", sep_style),
        Span::styled(" tab ", key_style),
        Span::styled(" focus ", desc_style),
        Span::styled("│", sep_style),
        Span::styled(" q ", key_style),
        Span::styled(" quit ", desc_style),
    ];
    let right_paragraph = Paragraph::new(Line::from(right_spans))
        .style(Style::default().bg(DEFAULT_THEME.current_line_bg))
        .alignment(Alignment::Right);
    frame.render_widget(right_paragraph, layout[1]);
}

use std::rc::Rc;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table};

use crate::shared::{CueRow, DisplayState};

const BAR_WIDTH: usize = 20;

fn sections(area: Rect) -> Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // title + transport state
            Constraint::Min(5),    // cue list
            Constraint::Length(3), // pads
            Constraint::Length(3), // master fader
            Constraint::Length(1), // status line
        ])
        .split(area)
}

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let sections = sections(area);

    draw_header(frame, sections[0], state);
    draw_cues(frame, sections[1], state);
    draw_pads(frame, sections[2], state);
    draw_master(frame, sections[3], state);
    draw_status(frame, sections[4], state);
}

fn draw_header(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let mut spans = vec![Span::styled(
        state.show_title.clone(),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if state.paused {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            "PAUSED",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        ));
    }
    let latency = match state.latency_ms {
        Some(ms) => format!("  latency {ms:.0} ms"),
        None => "  latency --".to_string(),
    };
    spans.push(Span::styled(latency, Style::default().fg(Color::DarkGray)));
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_cues(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let rows = state.cues.iter().map(cue_row);
    let widths = [
        Constraint::Length(4),
        Constraint::Min(20),
        Constraint::Length(14),
        Constraint::Length(9),
        Constraint::Length(BAR_WIDTH as u16 + 2),
    ];
    let table =
        Table::new(rows, widths).block(Block::default().borders(Borders::ALL).title("Cues"));
    frame.render_widget(table, area);
}

fn cue_row(row: &CueRow) -> Row<'static> {
    let marker = if row.selected { ">" } else { " " };
    let mut title = row.title.clone();
    if let Some(sub) = &row.subtitle {
        title.push_str(" - ");
        title.push_str(sub);
    }
    let style = match (row.selected, row.stop_target) {
        (true, _) => Style::default().fg(Color::Black).bg(Color::Cyan),
        (false, true) => Style::default().fg(Color::LightRed),
        _ => Style::default(),
    };
    Row::new(vec![
        Cell::from(format!("{marker}{:>3}", row.number)),
        Cell::from(title),
        Cell::from(row.source_label.clone()),
        Cell::from(match (&row.duration_label, row.decoding) {
            (Some(label), _) => label.clone(),
            (None, true) => "loading".to_string(),
            (None, false) => String::new(),
        }),
        Cell::from(progress_bar(row.progress)),
    ])
    .style(style)
}

fn progress_bar(progress: Option<f64>) -> String {
    let Some(p) = progress else {
        return String::new();
    };
    let filled = ((p.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

fn draw_pads(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let text = if state.pads.is_empty() {
        "no pads".to_string()
    } else {
        state
            .pads
            .iter()
            .take(9)
            .enumerate()
            .map(|(i, label)| format!("{} {label}", i + 1))
            .collect::<Vec<_>>()
            .join("  ")
    };
    let block = Block::default().borders(Borders::ALL).title("Pads");
    frame.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_master(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let title = if state.dimmed { "Master (DIM)" } else { "Master" };
    let color = if state.dimmed { Color::Yellow } else { Color::Green };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .gauge_style(Style::default().fg(color))
        .ratio(state.master_level.clamp(0.0, 1.0) as f64)
        .label(format!("{:.0}%", state.master_level * 100.0));
    frame.render_widget(gauge, area);
}

/// Where a pointer at (`column`, `row`) lands on the master gauge, as
/// `(cells from its left end, track length)`. `None` off the gauge's rows.
pub fn fader_hit(area: Rect, column: u16, row: u16) -> Option<(f32, f32)> {
    let gauge = sections(area)[3];
    if gauge.width < 2 || row < gauge.y || row >= gauge.y + gauge.height {
        return None;
    }
    let pos = column as f32 - gauge.x as f32;
    Some((pos, (gauge.width - 1) as f32))
}

fn draw_status(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let help = "space GO  s stop  esc stop all  p pause  -/= fader  d dim  r reload  q quit";
    let line = Line::from(vec![
        Span::raw(state.status.clone()),
        Span::raw("   "),
        Span::styled(help, Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

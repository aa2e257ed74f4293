//! Full-screen layout and rendering.
//!
//! Mirrors the original layout: a title row with the audio buffer readout,
//! the content area beside a log panel, and the input row beside the
//! generation status panel.

pub mod transcript;
mod wrap;

pub use transcript::Transcript;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Text};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::messages::{BlockKind, GenStatus};
use crate::util::{elapsed_string, truncate_string};

/// Width of the right-hand panels (log, status readouts).
const SIDE_PANEL_WIDTH: u16 = 50;
const INPUT_PROMPT: &str = "> ";

/// Borrowed view of everything the renderer needs for one frame.
pub struct UiState<'a> {
    pub title: &'a str,
    pub audio_buffer_seconds: f32,
    pub content: &'a Transcript,
    pub log: &'a Transcript,
    pub gen_status: &'a GenStatus,
    pub input: &'a str,
}

pub fn draw(frame: &mut Frame, state: &UiState<'_>) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(3),
        ])
        .split(frame.size());

    let top = split_main_and_panel(rows[0]);
    frame.render_widget(
        Paragraph::new(state.title.to_string()).style(style_for(BlockKind::Info)),
        top.0,
    );
    frame.render_widget(audio_status_paragraph(state.audio_buffer_seconds), top.1);

    frame.render_widget(separator(rows[1]), rows[1]);

    let main = split_main_and_panel(rows[2]);
    render_transcript(frame, main.0, state.content, false);
    render_transcript(frame, main.1, state.log, true);

    frame.render_widget(separator(rows[3]), rows[3]);

    let bottom = split_main_and_panel(rows[4]);
    render_input(frame, bottom.0, state.input);
    frame.render_widget(gen_status_paragraph(state.gen_status), bottom.1);
}

fn split_main_and_panel(area: Rect) -> (Rect, Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(SIDE_PANEL_WIDTH)])
        .split(area);
    (columns[0], columns[1])
}

fn separator(area: Rect) -> Paragraph<'static> {
    Paragraph::new("─".repeat(area.width as usize)).style(Style::default().fg(Color::DarkGray))
}

fn style_for(kind: BlockKind) -> Style {
    match kind {
        BlockKind::User => Style::default().fg(Color::Cyan),
        BlockKind::Assistant => Style::default().fg(Color::White),
        BlockKind::Feedback => Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::ITALIC),
        BlockKind::Pending => Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
        BlockKind::Stroke => Style::default().fg(Color::DarkGray),
        BlockKind::Info => Style::default().fg(Color::DarkGray),
        BlockKind::Warning => Style::default().fg(Color::Yellow),
        BlockKind::Error => Style::default().fg(Color::Red),
    }
}

/// Flattens a transcript into wrapped, styled rows.
fn transcript_lines(transcript: &Transcript, width: usize) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    for block in transcript.blocks() {
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        if block.kind == BlockKind::Stroke {
            lines.push(Line::styled(
                "─".repeat(width.min(40)),
                style_for(BlockKind::Stroke),
            ));
            continue;
        }
        let style = style_for(block.kind);
        for raw_line in block.text.split('\n') {
            for row in wrap::wrap_line(raw_line, width) {
                lines.push(Line::styled(row, style));
            }
        }
    }
    lines
}

/// Content scrolls so the newest lines stay visible; the log additionally
/// bottom-aligns when it hasn't filled its area yet.
fn render_transcript(frame: &mut Frame, area: Rect, transcript: &Transcript, bottom_aligned: bool) {
    let block = if bottom_aligned {
        Block::default()
            .borders(Borders::LEFT)
            .border_style(Style::default().fg(Color::DarkGray))
    } else {
        Block::default()
    };
    let inner = block.inner(area);
    let width = inner.width as usize;
    let height = inner.height as usize;
    if width == 0 || height == 0 {
        frame.render_widget(block, area);
        return;
    }

    let mut lines = transcript_lines(transcript, width);
    if lines.len() > height {
        lines.drain(..lines.len() - height);
    } else if bottom_aligned {
        let padding = height - lines.len();
        for _ in 0..padding {
            lines.insert(0, Line::default());
        }
    }

    frame.render_widget(block, area);
    frame.render_widget(Paragraph::new(Text::from(lines)), inner);
}

fn audio_status_paragraph(seconds: f32) -> Paragraph<'static> {
    let (text, style) = if seconds > 0.0 {
        (
            format!("buffer: {seconds:.1}s"),
            Style::default().fg(Color::White),
        )
    } else {
        ("buffer: 0s".to_string(), Style::default().fg(Color::DarkGray))
    };
    Paragraph::new(text).style(style).block(
        Block::default()
            .borders(Borders::LEFT)
            .border_style(Style::default().fg(Color::DarkGray)),
    )
}

fn gen_status_paragraph(status: &GenStatus) -> Paragraph<'static> {
    let lines = if status.elapsed == 0.0 {
        Vec::new()
    } else {
        let multiplier = if status.elapsed > 0.0 {
            format!("({:.1}x)", status.audio_seconds / status.elapsed)
        } else {
            String::new()
        };
        vec![
            Line::styled("Generating", style_for(BlockKind::Pending)),
            Line::styled(
                truncate_string(&status.text, SIDE_PANEL_WIDTH as usize - 2, true),
                style_for(BlockKind::Assistant),
            ),
            Line::styled(
                format!(
                    "length: {:.2}s elapsed: {} {multiplier}",
                    status.audio_seconds,
                    elapsed_string(status.elapsed)
                ),
                style_for(BlockKind::Info),
            ),
        ]
    };
    Paragraph::new(Text::from(lines)).block(
        Block::default()
            .borders(Borders::LEFT)
            .border_style(Style::default().fg(Color::DarkGray)),
    )
}

fn render_input(frame: &mut Frame, area: Rect, input: &str) {
    let width = area.width as usize;
    let visible = visible_input_tail(input, width.saturating_sub(INPUT_PROMPT.len() + 1));
    let text = format!("{INPUT_PROMPT}{visible}");
    frame.render_widget(
        Paragraph::new(text.clone()).style(Style::default().fg(Color::Cyan)),
        area,
    );
    let cursor_x = area.x + unicode_width::UnicodeWidthStr::width(text.as_str()) as u16;
    frame.set_cursor(cursor_x.min(area.x + area.width.saturating_sub(1)), area.y);
}

/// Shows the tail of an input longer than the row.
fn visible_input_tail(input: &str, max_width: usize) -> String {
    use unicode_width::UnicodeWidthStr;
    if input.width() <= max_width {
        return input.to_string();
    }
    let mut tail: Vec<char> = Vec::new();
    let mut width = 0;
    for c in input.chars().rev() {
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        if width + w > max_width {
            break;
        }
        width += w;
        tail.push(c);
    }
    tail.iter().rev().collect()
}

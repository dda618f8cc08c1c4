/// Ratatui draw entry-point for Courser.
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::course::Selection;
use super::{AppState, Screen};

pub const SPINNER_GLYPHS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

// ── Logo ──────────────────────────────────────────────────────────────────────

const LOGO: &str = r#"
   ██████╗ ██████╗ ██╗   ██╗██████╗ ███████╗███████╗██████╗
  ██╔════╝██╔═══██╗██║   ██║██╔══██╗██╔════╝██╔════╝██╔══██╗
  ██║     ██║   ██║██║   ██║██████╔╝███████╗█████╗  ██████╔╝
  ██║     ██║   ██║██║   ██║██╔══██╗╚════██║██╔══╝  ██╔══██╗
  ╚██████╗╚██████╔╝╚██████╔╝██║  ██║███████║███████╗██║  ██║
   ╚═════╝ ╚═════╝  ╚═════╝ ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝  ╚═╝
"#;

// ── Main draw entry point ─────────────────────────────────────────────────────

pub fn draw(f: &mut Frame, state: &AppState) {
    match state.screen() {
        Screen::Prompt => draw_prompt(f, state),
        Screen::Loading => draw_loading(f, state),
        Screen::Course => draw_course(f, state),
    }
}

// ── Prompt screen ─────────────────────────────────────────────────────────────

fn draw_prompt(f: &mut Frame, state: &AppState) {
    let area = f.area();

    let logo_lines: Vec<Line> = LOGO
        .lines()
        .enumerate()
        .map(|(i, line)| {
            let color = match i % 6 {
                0 => Color::DarkGray,
                1 | 5 => Color::Cyan,
                2 | 4 => Color::Rgb(0, 220, 220),
                _ => Color::White,
            };
            Line::from(Span::styled(
                line.to_string(),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ))
        })
        .collect();
    let logo_height = logo_lines.len() as u16;

    let has_error = state.session.error().is_some();
    let error_height = if has_error { 2 } else { 0 };
    let block_height = logo_height + 2 + error_height + 3 + 2;
    let top = area.height.saturating_sub(block_height) / 2;

    let mut y = area.y + top;
    let logo_area = Rect { x: area.x, y, width: area.width, height: logo_height };
    y += logo_height;

    let subtitle_area = Rect { x: area.x, y, width: area.width, height: 1 };
    y += 2;

    f.render_widget(Paragraph::new(logo_lines).alignment(Alignment::Center), logo_area);
    f.render_widget(
        Paragraph::new(Line::from(Span::styled(
            "what do you want to learn about?",
            Style::default().fg(Color::DarkGray),
        )))
        .alignment(Alignment::Center),
        subtitle_area,
    );

    if let Some(msg) = state.session.error() {
        let error_area = Rect { x: area.x, y, width: area.width, height: 1 };
        y += error_height;
        f.render_widget(
            Paragraph::new(Line::from(Span::styled(
                format!("✗ {msg}"),
                Style::default().fg(Color::Red),
            )))
            .alignment(Alignment::Center),
            error_area,
        );
    }

    // Centered input box
    let input_width = (area.width.saturating_sub(8)).min(70).max(20);
    let input_area = Rect {
        x: area.x + (area.width.saturating_sub(input_width)) / 2,
        y,
        width: input_width,
        height: 3,
    };
    y += 3;

    draw_input_box(f, state, input_area);

    let hint_area = Rect { x: area.x, y: y + 1, width: area.width, height: 1 };
    let hint = if state.entering_topic {
        "Enter to generate  ·  Esc back to course  ·  Ctrl+C quit"
    } else {
        "Enter to generate  ·  Ctrl+C quit"
    };
    f.render_widget(
        Paragraph::new(Line::from(Span::styled(
            hint,
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM),
        )))
        .alignment(Alignment::Center),
        hint_area,
    );
}

fn draw_input_box(f: &mut Frame, state: &AppState, area: Rect) {
    use unicode_width::UnicodeWidthStr;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let prompt = Span::styled(" ❯ ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    f.render_widget(
        Paragraph::new(Line::from(vec![prompt, Span::raw(state.input.clone())])),
        inner,
    );

    // Cursor position from display width of the text before the cursor
    let before = &state.input[..state.cursor];
    let x = inner.x + 3 + before.width() as u16;
    if x < inner.x + inner.width {
        f.set_cursor_position((x, inner.y));
    }
}

// ── Loading screen ────────────────────────────────────────────────────────────

fn draw_loading(f: &mut Frame, state: &AppState) {
    let area = f.area();
    let glyph = SPINNER_GLYPHS[state.spinner_tick as usize % SPINNER_GLYPHS.len()];

    let y = area.height / 2;
    let spinner_area = Rect { x: area.x, y, width: area.width, height: 1 };
    let hint_area = Rect { x: area.x, y: y + 2, width: area.width, height: 1 };

    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(glyph, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::styled("  generating course…", Style::default().fg(Color::DarkGray)),
        ]))
        .alignment(Alignment::Center),
        spinner_area,
    );

    let hint = if state.session.can_go_back() {
        "b to go back  ·  Ctrl+C quit"
    } else {
        "Ctrl+C quit"
    };
    f.render_widget(
        Paragraph::new(Line::from(Span::styled(
            hint,
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM),
        )))
        .alignment(Alignment::Center),
        hint_area,
    );
}

// ── Course view ───────────────────────────────────────────────────────────────

fn draw_course(f: &mut Frame, state: &AppState) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // title + rule
            Constraint::Min(0),    // course body
            Constraint::Length(1), // status bar
            Constraint::Length(2), // choices footer
        ])
        .split(area);

    draw_title(f, state, chunks[0]);
    draw_body(f, state, chunks[1]);
    draw_status_bar(f, state, chunks[2]);
    draw_footer(f, state, chunks[3]);
}

fn draw_title(f: &mut Frame, state: &AppState, area: Rect) {
    let Some(course) = state.session.current_course() else { return };
    let title = Line::from(vec![
        Span::raw("  "),
        Span::styled(
            course.course_title.clone(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("   · depth {}", state.session.depth()),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    f.render_widget(
        Paragraph::new(title).block(Block::default().borders(Borders::BOTTOM)),
        area,
    );
}

fn draw_body(f: &mut Frame, state: &AppState, area: Rect) {
    let Some(course) = state.session.current_course() else { return };

    let mut lines: Vec<Line> = Vec::new();
    for section in &course.sections {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  {}", section.heading),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
        for para in &section.paragraphs {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::raw(format!("  {para}"))));
        }
    }

    f.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .scroll((state.scroll, 0)),
        area,
    );
}

fn draw_status_bar(f: &mut Frame, state: &AppState, area: Rect) {
    let line = if let Some(msg) = state.session.error() {
        // Branch/deepen failure: the course stays put, the error overlays here
        Line::from(Span::styled(
            format!("  ✗ {msg}"),
            Style::default().fg(Color::Red),
        ))
    } else {
        Line::from(Span::styled(
            format!(
                "  {} · {} · {} cached topic{}",
                state.profile,
                state.endpoint,
                state.session.cache().len(),
                if state.session.cache().len() == 1 { "" } else { "s" },
            ),
            Style::default().fg(Color::DarkGray),
        ))
    };
    f.render_widget(Paragraph::new(line), area);
}

fn draw_footer(f: &mut Frame, state: &AppState, area: Rect) {
    let Some(course) = state.session.current_course() else { return };
    let selected = state.session.top_selection();

    let mut spans: Vec<Span> = vec![Span::raw("  ")];
    for choice in &course.choices {
        let taken = selected.map(|s| s.is_branch(&choice.key)).unwrap_or(false);
        spans.push(action_span(
            format!("[{}] {}", choice.key, choice.text),
            taken,
        ));
        spans.push(Span::raw("   "));
    }
    spans.push(action_span(
        "[d] go deeper".to_string(),
        matches!(selected, Some(Selection::Deeper)),
    ));

    let mut hints = String::new();
    if state.session.can_go_back() {
        hints.push_str("   [b] back");
    }
    hints.push_str("   [n] new topic   [q] quit   ↑/↓ scroll");
    spans.push(Span::styled(hints, Style::default().fg(Color::DarkGray)));

    f.render_widget(
        Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::TOP)),
        area,
    );
}

/// A footer action, highlighted when it was the action previously taken
/// from this node (so returning via back shows where you went).
fn action_span(label: String, taken: bool) -> Span<'static> {
    if taken {
        Span::styled(
            label,
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(label, Style::default().fg(Color::Cyan))
    }
}

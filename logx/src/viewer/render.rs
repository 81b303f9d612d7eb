//! Drawing the viewer with ratatui.

use super::state::{find_ignore_case, Message, Mode, ViewerState};
use crate::theme::Theme;
use ratatui::{
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

/// Rows taken by the title, the two spacers, the status bar and the help bar.
pub const CHROME_ROWS: u16 = 5;

pub const HELP_TEXT: &str = "↑↓: Navigate | /: Search | n/N: Next/Prev | s: Save | q: Quit";

const GUTTER_WIDTH: usize = 6;

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub line_numbers: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { line_numbers: true }
    }
}

/// Lines that fit in a terminal of `area_height` rows.
pub fn viewport_height(area_height: u16) -> usize {
    usize::from(area_height.saturating_sub(CHROME_ROWS)).max(1)
}

pub fn draw(frame: &mut Frame, area: Rect, state: &ViewerState, theme: &Theme, opts: RenderOptions) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title
            Constraint::Length(1),
            Constraint::Min(1), // Lines
            Constraint::Length(1),
            Constraint::Length(1), // Status
            Constraint::Length(1), // Help, message or search prompt
        ])
        .split(area);

    let title = format!(" {} - {} ", state.server(), state.file_name());
    frame.render_widget(Paragraph::new(title).style(theme.title), chunks[0]);

    let rows: Vec<Line> = state
        .visible_range()
        .map(|idx| content_line(state, idx, theme, opts))
        .collect();
    frame.render_widget(Paragraph::new(rows).style(theme.content), chunks[2]);

    let status = format!(" {} ", state.status_line());
    frame.render_widget(Paragraph::new(status).style(theme.status), chunks[4]);

    let bottom = chunks[5];
    match state.mode() {
        Mode::SearchEntry => {
            let prompt = format!("Search: {}", state.input());
            let cursor_x = bottom.x + prompt.chars().count() as u16;
            frame.render_widget(Paragraph::new(prompt).style(theme.message), bottom);
            frame.set_cursor_position(Position::new(cursor_x.min(bottom.right().saturating_sub(1)), bottom.y));
        }
        Mode::Browsing => {
            let widget = match state.message() {
                Some(Message::Info(text)) => Paragraph::new(text.as_str()).style(theme.message),
                Some(Message::Error(text)) => Paragraph::new(text.as_str()).style(theme.error),
                None => Paragraph::new(HELP_TEXT).style(theme.help),
            };
            frame.render_widget(widget, bottom);
        }
    }
}

/// One content row: gutter plus the line, with the cursor line and any
/// search hit styled.
fn content_line<'a>(state: &'a ViewerState, idx: usize, theme: &Theme, opts: RenderOptions) -> Line<'a> {
    let text = state.lines()[idx].as_str();
    let is_cursor = state.cursor() == Some(idx);
    let is_match = !state.query().is_empty() && state.is_match(idx);

    let base = if is_cursor {
        theme.cursor_line
    } else if is_match {
        theme.match_line
    } else {
        theme.content
    };

    let mut spans = Vec::with_capacity(4);
    if opts.line_numbers {
        spans.push(Span::styled(
            format!("{:>width$} ", idx + 1, width = GUTTER_WIDTH),
            theme.line_number,
        ));
    }

    match is_match.then(|| find_ignore_case(text, state.query())).flatten() {
        Some(hit) => {
            spans.push(segment(&text[..hit.start], base));
            spans.push(segment(&text[hit.clone()], base.patch(theme.search_hit)));
            spans.push(segment(&text[hit.end..], base));
        }
        None => spans.push(segment(text, base)),
    }

    let line = Line::from(spans);
    if is_cursor {
        line.style(theme.cursor_line)
    } else {
        line
    }
}

/// Tabs expanded so the terminal column count matches what is drawn.
fn segment(text: &str, style: Style) -> Span<'_> {
    if text.contains('\t') {
        Span::styled(text.replace('\t', "    "), style)
    } else {
        Span::styled(text, style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, buffer::Buffer, style::Color, Terminal};

    fn render(state: &ViewerState, width: u16, height: u16) -> Buffer {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        let theme = Theme::default();
        terminal
            .draw(|f| {
                let area = f.area();
                draw(f, area, state, &theme, RenderOptions::default())
            })
            .unwrap();
        terminal.backend().buffer().clone()
    }

    fn row(buffer: &Buffer, y: u16) -> String {
        (0..buffer.area.width)
            .map(|x| buffer[(x, y)].symbol())
            .collect::<String>()
    }

    fn numbered(count: usize, height: usize) -> ViewerState {
        let lines = (0..count).map(|i| format!("line {}", i)).collect();
        ViewerState::new(lines, "web1", "app.log", height)
    }

    #[test]
    fn test_viewport_height() {
        assert_eq!(viewport_height(24), 19);
        assert_eq!(viewport_height(3), 1);
    }

    #[test]
    fn test_layout_rows() {
        let state = numbered(100, viewport_height(12));
        let buffer = render(&state, 50, 12);

        assert!(row(&buffer, 0).contains("web1 - app.log"));
        assert!(row(&buffer, 2).starts_with("     1 line 0"));
        assert!(row(&buffer, 8).starts_with("     7 line 6"));
        assert!(row(&buffer, 9).trim().is_empty());
        assert!(row(&buffer, 10).contains("Line 1/100"));
        assert!(row(&buffer, 11).contains("n/N: Next/Prev"));
    }

    #[test]
    fn test_only_visible_range_drawn() {
        let mut state = numbered(100, viewport_height(12));
        state.go_bottom();
        let buffer = render(&state, 50, 12);
        assert!(row(&buffer, 2).contains("line 93"));
        assert!(row(&buffer, 8).contains("line 99"));
        assert!(row(&buffer, 10).contains("Line 100/100"));
    }

    #[test]
    fn test_cursor_line_is_highlighted() {
        let mut state = numbered(10, viewport_height(12));
        state.move_down();
        let buffer = render(&state, 40, 12);
        let theme = Theme::default();
        assert_eq!(buffer[(8, 3)].bg, theme.cursor_line.bg.unwrap());
        assert_ne!(buffer[(8, 2)].bg, theme.cursor_line.bg.unwrap());
    }

    #[test]
    fn test_search_hit_is_marked() {
        let mut state = numbered(10, viewport_height(12));
        state.search("NE");
        let buffer = render(&state, 40, 12);
        // Row 3 is "     2 line 1": gutter is 7 cells, "ne" sits at 9..11.
        assert_eq!(buffer[(9, 3)].bg, Color::Yellow);
        assert_eq!(buffer[(10, 3)].bg, Color::Yellow);
        assert_ne!(buffer[(7, 3)].bg, Color::Yellow);
        assert_ne!(buffer[(11, 3)].bg, Color::Yellow);
        assert!(row(&buffer, 11).contains("Found 10 matches"));
        assert!(row(&buffer, 10).contains("Match 1/10"));
    }

    #[test]
    fn test_search_prompt_shown() {
        let mut state = numbered(10, viewport_height(12));
        state.begin_search();
        state.push_search_char('e');
        state.push_search_char('r');
        let buffer = render(&state, 40, 12);
        assert!(row(&buffer, 11).starts_with("Search: er"));
    }

    #[test]
    fn test_empty_content_renders() {
        let state = numbered(0, viewport_height(12));
        let buffer = render(&state, 40, 12);
        assert!(row(&buffer, 10).contains("Line 0/0"));
    }
}

//! Colours and text styles for the terminal UI.
//!
//! A [`Theme`] is built once by the caller and passed by reference into every
//! draw function; there is no process-wide style state.

use ratatui::style::{Color, Modifier, Style};

const ACCENT: Color = Color::Rgb(0x7D, 0x56, 0xF4);
const MUTED: Color = Color::Rgb(0x66, 0x66, 0x66);
const BAR_BG: Color = Color::Rgb(0x1A, 0x1A, 0x1A);
const CURSOR_BG: Color = Color::Rgb(0x2A, 0x2A, 0x2A);
const SUCCESS: Color = Color::Rgb(0x04, 0xB5, 0x75);
const SERVER_TAG: Color = Color::Rgb(0xFF, 0xA5, 0x00);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// Viewer title bar and selection banner.
    pub title: Style,
    pub line_number: Style,
    pub content: Style,
    /// Line under the cursor.
    pub cursor_line: Style,
    /// A line present in the match list.
    pub match_line: Style,
    /// The query text inside a matching line.
    pub search_hit: Style,
    pub status: Style,
    pub help: Style,
    /// Transient messages (search result counts, save results, errors).
    pub message: Style,
    pub error: Style,
    pub border: Style,
    /// Focused item in a selection list.
    pub focused: Style,
    pub blurred: Style,
    pub server_tag: Style,
    pub success: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            title: Style::default()
                .fg(ACCENT)
                .bg(BAR_BG)
                .add_modifier(Modifier::BOLD),
            line_number: Style::default().fg(MUTED),
            content: Style::default().fg(Color::White),
            cursor_line: Style::default().fg(Color::White).bg(CURSOR_BG),
            match_line: Style::default().fg(Color::White).bg(BAR_BG),
            search_hit: Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
            status: Style::default().fg(ACCENT).bg(BAR_BG),
            help: Style::default().fg(MUTED).add_modifier(Modifier::ITALIC),
            message: Style::default().fg(MUTED),
            error: Style::default().fg(Color::Red),
            border: Style::default().fg(ACCENT),
            focused: Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
            blurred: Style::default().fg(MUTED),
            server_tag: Style::default().fg(SERVER_TAG),
            success: Style::default().fg(SUCCESS),
        }
    }
}

impl Theme {
    /// Unstyled theme for terminals without colour (`NO_COLOR`); the cursor
    /// and search hits stay distinguishable through modifiers.
    pub fn monochrome() -> Self {
        let plain = Style::default();
        Self {
            title: plain.add_modifier(Modifier::BOLD),
            line_number: plain,
            content: plain,
            cursor_line: plain.add_modifier(Modifier::REVERSED),
            match_line: plain.add_modifier(Modifier::UNDERLINED),
            search_hit: plain.add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            status: plain.add_modifier(Modifier::BOLD),
            help: plain,
            message: plain,
            error: plain.add_modifier(Modifier::BOLD),
            border: plain,
            focused: plain.add_modifier(Modifier::REVERSED),
            blurred: plain,
            server_tag: plain,
            success: plain,
        }
    }

    /// [`Theme::monochrome`] when `NO_COLOR` is set, the default otherwise.
    pub fn from_env() -> Self {
        match std::env::var_os("NO_COLOR") {
            Some(v) if !v.is_empty() => Self::monochrome(),
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_and_hits_are_distinct() {
        for theme in [Theme::default(), Theme::monochrome()] {
            assert_ne!(theme.cursor_line, theme.content);
            assert_ne!(theme.search_hit, theme.content);
            assert_ne!(theme.match_line, theme.content);
        }
    }
}

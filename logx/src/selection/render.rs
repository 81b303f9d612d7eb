//! Drawing the selection flow.

use super::flow::{SelectionFlow, Stage, ALL_SERVERS};
use crate::theme::Theme;
use crate::viewer::Message;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Wrap},
    Frame,
};

const LIST_HELP: &str = "↑/↓: Navigate • Enter: Select • Esc: Back";
const DATE_HELP: &str = "Type date (YYYY-MM-DD, empty for current log) • Enter: View • Esc: Back";
const LOADING_HELP: &str = "Ctrl+C: Quit";

pub fn draw(frame: &mut Frame, area: Rect, flow: &SelectionFlow, theme: &Theme) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Banner
            Constraint::Min(3),    // Stage body
            Constraint::Length(2), // Message
            Constraint::Length(1), // Help
        ])
        .split(area);

    frame.render_widget(Paragraph::new(" Log Viewer ").style(theme.title), chunks[0]);

    let body = match flow.stage() {
        Stage::SelectApplication => app_list(flow, theme),
        Stage::SelectServer => server_list(flow, theme),
        Stage::EnterDate => date_entry(flow, theme),
        Stage::Loading => vec![Line::styled("Loading logs...", theme.success)],
        Stage::PickResult => result_list(flow, theme),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme.border);
    frame.render_widget(Paragraph::new(body).block(block), chunks[1]);

    if let Some(message) = flow.message() {
        let style = match message {
            Message::Info(_) => theme.message,
            Message::Error(_) => theme.error,
        };
        frame.render_widget(
            Paragraph::new(message.text()).style(style).wrap(Wrap { trim: true }),
            chunks[2],
        );
    }

    let help = match flow.stage() {
        Stage::EnterDate => DATE_HELP,
        Stage::Loading => LOADING_HELP,
        _ => LIST_HELP,
    };
    frame.render_widget(Paragraph::new(help).style(theme.help), chunks[3]);
}

/// Cursor marker plus focused or blurred text.
fn item<'a>(text: String, focused: bool, theme: &Theme) -> Line<'a> {
    if focused {
        Line::from(vec![
            Span::styled("▶ ", theme.focused),
            Span::styled(text, theme.focused),
        ])
    } else {
        Line::from(vec![Span::raw("  "), Span::styled(text, theme.blurred)])
    }
}

fn app_list<'a>(flow: &SelectionFlow, theme: &Theme) -> Vec<Line<'a>> {
    if flow.apps().is_empty() {
        return vec![Line::styled(
            "No apps configured. Add one with `logx app add`.",
            theme.error,
        )];
    }
    let mut lines = vec![Line::raw("Select an application:"), Line::raw("")];
    lines.extend(flow.apps().iter().enumerate().map(|(idx, app)| {
        item(
            format!("{} ({} servers)", app.name, app.servers.len()),
            idx == flow.cursor(),
            theme,
        )
    }));
    lines
}

fn server_list<'a>(flow: &SelectionFlow, theme: &Theme) -> Vec<Line<'a>> {
    let name = flow.selected_app().map(|a| a.name.clone()).unwrap_or_default();
    let mut lines = vec![
        Line::from(vec![
            Span::raw("Select server for "),
            Span::styled(name, theme.focused),
            Span::raw(":"),
        ]),
        Line::raw(""),
    ];
    lines.extend(
        flow.server_options()
            .into_iter()
            .enumerate()
            .map(|(idx, server)| item(server, idx == flow.cursor(), theme)),
    );
    lines
}

fn date_entry<'a>(flow: &SelectionFlow, theme: &Theme) -> Vec<Line<'a>> {
    let name = flow.selected_app().map(|a| a.name.clone()).unwrap_or_default();
    let server = flow.selected_server().unwrap_or(ALL_SERVERS).to_string();
    vec![
        Line::from(vec![
            Span::raw("Viewing logs for: "),
            Span::styled(name, theme.focused),
        ]),
        Line::from(vec![
            Span::raw("Server: "),
            Span::styled(server, theme.server_tag),
        ]),
        Line::raw(""),
        Line::raw("Enter date (YYYY-MM-DD):"),
        Line::styled(format!("{}█", flow.date_input()), theme.focused),
    ]
}

fn result_list<'a>(flow: &SelectionFlow, theme: &Theme) -> Vec<Line<'a>> {
    let mut lines = vec![
        Line::raw(format!("Found on {} servers, pick one:", flow.results().len())),
        Line::raw(""),
    ];
    lines.extend(
        flow.results()
            .iter()
            .enumerate()
            .map(|(idx, log)| item(log.label(), idx == flow.cursor(), theme)),
    );
    lines
}

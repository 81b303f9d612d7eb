//! Key bindings for the viewer

use super::state::Mode;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Viewer actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerAction {
    /// Leave the program
    Quit,
    /// Leave the viewer, back to the menu
    Back,
    Up,
    Down,
    PageUp,
    PageDown,
    Top,
    Bottom,
    /// Start typing a search query
    BeginSearch,
    NextMatch,
    PrevMatch,
    /// Save all lines to a local file
    Save,
    SearchChar(char),
    SearchBackspace,
    SearchCancel,
    SearchCommit,
}

/// Map a key press to an action for the given mode.
pub fn map_key(mode: Mode, key: KeyEvent) -> Option<ViewerAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('c') {
        return Some(ViewerAction::Quit);
    }

    match mode {
        Mode::SearchEntry => match key.code {
            KeyCode::Esc => Some(ViewerAction::SearchCancel),
            KeyCode::Enter => Some(ViewerAction::SearchCommit),
            KeyCode::Backspace => Some(ViewerAction::SearchBackspace),
            KeyCode::Char(c) if !ctrl => Some(ViewerAction::SearchChar(c)),
            _ => None,
        },
        Mode::Browsing => match key.code {
            KeyCode::Char('u') if ctrl => Some(ViewerAction::PageUp),
            KeyCode::Char('d') if ctrl => Some(ViewerAction::PageDown),
            _ if ctrl => None,
            KeyCode::Char('q') => Some(ViewerAction::Quit),
            KeyCode::Esc => Some(ViewerAction::Back),
            KeyCode::Up | KeyCode::Char('k') => Some(ViewerAction::Up),
            KeyCode::Down | KeyCode::Char('j') => Some(ViewerAction::Down),
            KeyCode::PageUp => Some(ViewerAction::PageUp),
            KeyCode::PageDown => Some(ViewerAction::PageDown),
            KeyCode::Home | KeyCode::Char('g') => Some(ViewerAction::Top),
            KeyCode::End | KeyCode::Char('G') => Some(ViewerAction::Bottom),
            KeyCode::Char('/') => Some(ViewerAction::BeginSearch),
            KeyCode::Char('n') => Some(ViewerAction::NextMatch),
            KeyCode::Char('N') => Some(ViewerAction::PrevMatch),
            KeyCode::Char('s') => Some(ViewerAction::Save),
            _ => None,
        },
    }
}

//! Interactive log viewer.
//!
//! [`ViewerState`] holds the lines, cursor, viewport and search results;
//! [`run_viewer`] drives it from terminal input one event at a time.

pub mod input;
pub mod render;
pub mod state;

pub use input::{map_key, ViewerAction};
pub use render::{viewport_height, RenderOptions};
pub use state::{Message, Mode, SaveError, ViewerExit, ViewerState};

use crate::config::Config;
use crate::retrieval::FetchedLog;
use crate::terminal::{CrosstermEvents, EventSource, TerminalError, TerminalSession, POLL_INTERVAL};
use crate::theme::Theme;
use crossterm::event::{Event, KeyEventKind};
use ratatui::{backend::Backend, Terminal};
use std::path::PathBuf;
use tracing::debug;

/// Presentation settings for a viewing session.
#[derive(Debug, Clone)]
pub struct ViewerOptions {
    pub theme: Theme,
    pub render: RenderOptions,
    /// Where `s` writes the saved copy.
    pub save_dir: PathBuf,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            render: RenderOptions::default(),
            save_dir: PathBuf::from("."),
        }
    }
}

impl ViewerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            theme: Theme::from_env(),
            render: RenderOptions {
                line_numbers: config.viewer.line_numbers,
            },
            save_dir: config
                .viewer
                .save_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

impl ViewerState {
    /// Read a staged file into a fresh viewing session.
    pub fn from_fetched(fetched: &FetchedLog, height: usize) -> std::io::Result<Self> {
        let lines = fetched.read_lines()?;
        Ok(Self::new(lines, &fetched.server, &fetched.file_name, height))
    }
}

/// Process input until the user quits or goes back.
///
/// The viewport height follows the terminal size on every frame.
pub fn run_viewer<B: Backend, E: EventSource>(
    terminal: &mut Terminal<B>,
    events: &mut E,
    state: &mut ViewerState,
    options: &ViewerOptions,
) -> Result<ViewerExit, TerminalError> {
    loop {
        let size = terminal.size()?;
        state.set_height(viewport_height(size.height));
        terminal.draw(|f| {
            let area = f.area();
            render::draw(f, area, state, &options.theme, options.render)
        })?;

        if let Some(Event::Key(key)) = events.next(POLL_INTERVAL)? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if let Some(action) = map_key(state.mode(), key) {
                if let Some(exit) = state.apply(action, &options.save_dir) {
                    debug!(?exit, "viewer closed");
                    return Ok(exit);
                }
            }
        }
    }
}

/// Take over the terminal and view `state` until the user leaves.
pub fn view(state: &mut ViewerState, options: &ViewerOptions) -> Result<ViewerExit, TerminalError> {
    let mut session = TerminalSession::new()?;
    run_viewer(session.terminal(), &mut CrosstermEvents, state, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::ScriptedEvents;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::backend::TestBackend;

    fn press(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn typed(text: &str) -> Vec<Event> {
        text.chars().map(|c| press(KeyCode::Char(c))).collect()
    }

    #[test]
    fn test_search_then_quit() {
        let lines = (0..50).map(|i| format!("entry {}", i)).collect();
        let mut state = ViewerState::new(lines, "h1", "a.log", 1);
        let mut terminal = Terminal::new(TestBackend::new(60, 15)).unwrap();

        let mut script = vec![press(KeyCode::Char('/'))];
        script.extend(typed("ENTRY 4"));
        script.push(press(KeyCode::Enter));
        script.push(press(KeyCode::Char('n')));
        script.push(press(KeyCode::Char('q')));
        let mut events = ScriptedEvents::new(script);

        let exit = run_viewer(&mut terminal, &mut events, &mut state, &ViewerOptions::default()).unwrap();
        assert_eq!(exit, ViewerExit::Quit);
        assert_eq!(state.height(), 10);
        // entry 4, entry 40..=49
        assert_eq!(state.matches().len(), 11);
        assert_eq!(state.cursor(), Some(40));
    }

    #[test]
    fn test_escape_in_search_does_not_leave() {
        let lines = vec!["a".to_string(), "b".to_string()];
        let mut state = ViewerState::new(lines, "h1", "a.log", 1);
        let mut terminal = Terminal::new(TestBackend::new(30, 10)).unwrap();
        let mut events = ScriptedEvents::new([
            press(KeyCode::Char('/')),
            press(KeyCode::Esc),
            press(KeyCode::Down),
            press(KeyCode::Esc),
        ]);

        let exit = run_viewer(&mut terminal, &mut events, &mut state, &ViewerOptions::default()).unwrap();
        assert_eq!(exit, ViewerExit::Back);
        assert_eq!(state.cursor(), Some(1));
    }

    #[test]
    fn test_save_key_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let options = ViewerOptions {
            save_dir: dir.path().to_path_buf(),
            ..ViewerOptions::default()
        };
        let mut state = ViewerState::new(vec!["x".into()], "h1", "a.log", 1);
        let mut terminal = Terminal::new(TestBackend::new(30, 10)).unwrap();
        let mut events = ScriptedEvents::new([press(KeyCode::Char('s')), press(KeyCode::Char('q'))]);

        run_viewer(&mut terminal, &mut events, &mut state, &options).unwrap();
        assert!(dir.path().join("h1_a.log.log").exists());
    }
}

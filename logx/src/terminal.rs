//! Terminal session management with automatic cleanup

use crossterm::{
    cursor,
    event::{self, Event},
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{backend::CrosstermBackend, Terminal};
#[cfg(any(test, feature = "test-util"))]
use std::collections::VecDeque;
use std::io::{self, stdout, Stdout};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use std::time::Duration;
use thiserror::Error;

/// Full-screen terminal driven through crossterm.
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// How long the event loops wait for input before redrawing.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum TerminalError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
}

static PANIC_HOOK: Once = Once::new();
/// Set while raw mode and the alternate screen are active.
static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// RAII guard for the full-screen terminal.
/// Raw mode and the alternate screen are undone on drop and on panic.
pub struct TerminalSession {
    terminal: Tui,
}

impl TerminalSession {
    pub fn new() -> Result<Self, TerminalError> {
        PANIC_HOOK.call_once(|| {
            let original_hook = panic::take_hook();
            panic::set_hook(Box::new(move |panic_info| {
                // Restore the terminal so the panic message is readable
                Self::restore_after_panic();
                original_hook(panic_info);
            }));
        });

        terminal::enable_raw_mode()?;
        SESSION_ACTIVE.store(true, Ordering::SeqCst);
        match Self::enter() {
            Ok(terminal) => Ok(Self { terminal }),
            Err(e) => {
                Self::release();
                Err(e.into())
            }
        }
    }

    fn enter() -> io::Result<Tui> {
        stdout()
            .execute(EnterAlternateScreen)?
            .execute(cursor::Hide)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
        terminal.clear()?;
        Ok(terminal)
    }

    pub fn terminal(&mut self) -> &mut Tui {
        &mut self.terminal
    }

    /// Undo the session's terminal changes once; returns whether it did.
    fn release() -> bool {
        if !SESSION_ACTIVE.swap(false, Ordering::SeqCst) {
            return false;
        }
        // Best effort cleanup
        let _ = Self::cleanup();
        true
    }

    /// Panics outside a live session leave the terminal alone.
    fn restore_after_panic() -> bool {
        Self::release()
    }

    fn cleanup() -> io::Result<()> {
        stdout()
            .execute(cursor::Show)?
            .execute(LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        Self::release();
    }
}

/// Source of terminal input events.
pub trait EventSource {
    /// Wait up to `timeout` for the next event.
    fn next(&mut self, timeout: Duration) -> io::Result<Option<Event>>;
}

/// Reads events from the real terminal.
#[derive(Debug, Default)]
pub struct CrosstermEvents;

impl EventSource for CrosstermEvents {
    fn next(&mut self, timeout: Duration) -> io::Result<Option<Event>> {
        if event::poll(timeout)? {
            event::read().map(Some)
        } else {
            Ok(None)
        }
    }
}

/// Replays a fixed list of events, then reports end of input.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
pub struct ScriptedEvents {
    events: VecDeque<Event>,
}

#[cfg(any(test, feature = "test-util"))]
impl ScriptedEvents {
    pub fn new(events: impl IntoIterator<Item = Event>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
impl EventSource for ScriptedEvents {
    fn next(&mut self, _timeout: Duration) -> io::Result<Option<Event>> {
        self.events
            .pop_front()
            .map(Some)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "event script exhausted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    #[test]
    fn test_scripted_events_drain_then_fail() {
        let key = Event::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE));
        let mut events = ScriptedEvents::new([key.clone()]);
        assert_eq!(events.next(POLL_INTERVAL).unwrap(), Some(key));
        let err = events.next(POLL_INTERVAL).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_panic_restores_terminal_only_during_a_session() {
        // Nothing else touches the flag; no test opens a real session.
        assert!(!TerminalSession::restore_after_panic());

        // Cleanup writes escape sequences only; harmless without a tty.
        SESSION_ACTIVE.store(true, Ordering::SeqCst);
        assert!(TerminalSession::restore_after_panic());
        assert!(!TerminalSession::release());
        assert!(!SESSION_ACTIVE.load(Ordering::SeqCst));
    }
}

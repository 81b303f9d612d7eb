//! Interactive browse: pick an application, a server and a date, fetch in the
//! background, then hand the result to the viewer.

pub mod flow;
pub mod render;

pub use flow::{FlowAction, FlowEvent, SelectionFlow, Stage, ALL_SERVERS};

use crate::remote::Connector;
use crate::retrieval::{RetrievalError, RetrievalOutcome, RetrievalRequest, Retriever};
use crate::secrets::SecretStore;
use crate::terminal::{CrosstermEvents, EventSource, TerminalError, TerminalSession, POLL_INTERVAL};
use crate::viewer::{self, ViewerOptions, ViewerState};
use chrono::Local;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use crossterm::event::{Event, KeyEventKind};
use ratatui::{backend::Backend, Terminal};
use std::thread;
use tracing::{error, warn};

type RetrievalResult = Result<RetrievalOutcome, RetrievalError>;

/// Run one retrieval on its own thread; the result arrives on the channel.
pub fn spawn_retrieval<C, S>(
    retriever: Retriever<C, S>,
    request: RetrievalRequest,
) -> Receiver<RetrievalResult>
where
    C: Connector + 'static,
    S: SecretStore + ?Sized + 'static,
{
    let (sender, receiver) = bounded(1);
    thread::spawn(move || {
        let result = retriever.retrieve(&request);
        if sender.send(result).is_err() {
            warn!(app = %request.app, "retrieval finished after the browser closed");
        }
    });
    receiver
}

/// Drive `flow` until the user leaves.
pub fn run_browse<B, E, C, S>(
    terminal: &mut Terminal<B>,
    events: &mut E,
    flow: &mut SelectionFlow,
    retriever: &Retriever<C, S>,
    options: &ViewerOptions,
) -> Result<(), TerminalError>
where
    B: Backend,
    E: EventSource,
    C: Connector + 'static,
    S: SecretStore + ?Sized + 'static,
{
    let mut pending: Option<Receiver<RetrievalResult>> = None;

    loop {
        terminal.draw(|f| {
            let area = f.area();
            render::draw(f, area, flow, &options.theme)
        })?;

        let mut next = FlowEvent::None;
        if let Some(receiver) = &pending {
            match receiver.recv_timeout(POLL_INTERVAL) {
                Ok(result) => {
                    pending = None;
                    next = flow.finish_loading(result);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    error!("retrieval thread ended without a result");
                    pending = None;
                    flow.retrieval_lost();
                }
            }
        }

        if next == FlowEvent::None {
            if let Some(Event::Key(key)) = events.next(POLL_INTERVAL)? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = flow::map_key(flow.stage(), key) {
                        next = flow.handle(action);
                    }
                }
            }
        }

        match next {
            FlowEvent::None => {}
            FlowEvent::Exit => return Ok(()),
            FlowEvent::Fetch(request) => {
                pending = Some(spawn_retrieval(retriever.clone(), request));
            }
            FlowEvent::View(idx) => {
                if view_result(terminal, events, flow, idx, options)? == FlowEvent::Exit {
                    return Ok(());
                }
            }
        }
    }
}

fn view_result<B: Backend, E: EventSource>(
    terminal: &mut Terminal<B>,
    events: &mut E,
    flow: &mut SelectionFlow,
    idx: usize,
    options: &ViewerOptions,
) -> Result<FlowEvent, TerminalError> {
    let height = viewer::viewport_height(terminal.size()?.height);
    let loaded = match flow.result(idx) {
        Some(fetched) => ViewerState::from_fetched(fetched, height)
            .map_err(|e| format!("Error: failed to read file: {}", e)),
        None => Err("Error: no such result".to_string()),
    };

    match loaded {
        Ok(mut state) => {
            let exit = viewer::run_viewer(terminal, events, &mut state, options)?;
            terminal.clear()?;
            Ok(flow.viewer_closed(exit))
        }
        Err(reason) => {
            flow.view_failed(reason);
            Ok(FlowEvent::None)
        }
    }
}

/// Take over the terminal and run the browse flow over `retriever`'s config.
pub fn browse<C, S>(retriever: &Retriever<C, S>, options: &ViewerOptions) -> Result<(), TerminalError>
where
    C: Connector + 'static,
    S: SecretStore + ?Sized + 'static,
{
    let mut flow = SelectionFlow::new(&retriever.config().apps, Local::now().date_naive());
    let mut session = TerminalSession::new()?;
    run_browse(session.terminal(), &mut CrosstermEvents, &mut flow, retriever, options)
}

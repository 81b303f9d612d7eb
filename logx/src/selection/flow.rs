//! Application → server → date picker feeding the retrieval orchestrator.

use crate::config::ApplicationDescriptor;
use crate::retrieval::naming::REQUEST_DATE_FORMAT;
use crate::retrieval::{FetchedLog, HostReport, RetrievalError, RetrievalOutcome, RetrievalRequest};
use crate::viewer::{Message, ViewerExit};
use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::info;

/// Label of the fan-out entry at the top of the server list.
pub const ALL_SERVERS: &str = "All Servers";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SelectApplication,
    SelectServer,
    EnterDate,
    /// Retrieval running off the input thread.
    Loading,
    /// More than one host served the file; choose which to view.
    PickResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAction {
    Up,
    Down,
    Enter,
    Back,
    Backspace,
    Char(char),
    Quit,
}

/// What the driver has to do after an action.
#[derive(Debug, PartialEq, Eq)]
pub enum FlowEvent {
    None,
    /// Leave the flow.
    Exit,
    /// Start this retrieval in the background.
    Fetch(RetrievalRequest),
    /// Open the result at this index in the viewer.
    View(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppChoice {
    pub name: String,
    pub servers: Vec<String>,
}

impl From<&ApplicationDescriptor> for AppChoice {
    fn from(app: &ApplicationDescriptor) -> Self {
        Self {
            name: app.name.clone(),
            servers: app.servers.clone(),
        }
    }
}

pub struct SelectionFlow {
    apps: Vec<AppChoice>,
    stage: Stage,
    cursor: usize,
    app: Option<usize>,
    /// `None` for all servers.
    server: Option<String>,
    date_input: String,
    today: NaiveDate,
    results: Vec<FetchedLog>,
    message: Option<Message>,
}

impl SelectionFlow {
    pub fn new(apps: &[ApplicationDescriptor], today: NaiveDate) -> Self {
        Self {
            apps: apps.iter().map(AppChoice::from).collect(),
            stage: Stage::SelectApplication,
            cursor: 0,
            app: None,
            server: None,
            date_input: String::new(),
            today,
            results: Vec::new(),
            message: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn apps(&self) -> &[AppChoice] {
        &self.apps
    }

    pub fn selected_app(&self) -> Option<&AppChoice> {
        self.app.and_then(|idx| self.apps.get(idx))
    }

    /// Selected server, `None` meaning all of them.
    pub fn selected_server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    pub fn date_input(&self) -> &str {
        &self.date_input
    }

    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    pub fn results(&self) -> &[FetchedLog] {
        &self.results
    }

    pub fn result(&self, idx: usize) -> Option<&FetchedLog> {
        self.results.get(idx)
    }

    /// Entries of the server stage: [`ALL_SERVERS`] then the app's servers.
    pub fn server_options(&self) -> Vec<String> {
        let mut options = vec![ALL_SERVERS.to_string()];
        if let Some(app) = self.selected_app() {
            options.extend(app.servers.iter().cloned());
        }
        options
    }

    fn list_len(&self) -> usize {
        match self.stage {
            Stage::SelectApplication => self.apps.len(),
            Stage::SelectServer => self.server_options().len(),
            Stage::PickResult => self.results.len(),
            Stage::EnterDate | Stage::Loading => 0,
        }
    }

    pub fn handle(&mut self, action: FlowAction) -> FlowEvent {
        if action == FlowAction::Quit {
            return FlowEvent::Exit;
        }
        if self.stage == Stage::Loading {
            return FlowEvent::None;
        }

        match action {
            FlowAction::Up => {
                self.cursor = self.cursor.saturating_sub(1);
                FlowEvent::None
            }
            FlowAction::Down => {
                if self.cursor + 1 < self.list_len() {
                    self.cursor += 1;
                }
                FlowEvent::None
            }
            FlowAction::Char(c) => {
                if self.stage == Stage::EnterDate && (c.is_ascii_digit() || c == '-') {
                    self.date_input.push(c);
                }
                FlowEvent::None
            }
            FlowAction::Backspace => {
                if self.stage == Stage::EnterDate {
                    self.date_input.pop();
                }
                FlowEvent::None
            }
            FlowAction::Back => self.back(),
            FlowAction::Enter => self.enter(),
            FlowAction::Quit => FlowEvent::Exit,
        }
    }

    fn back(&mut self) -> FlowEvent {
        self.message = None;
        match self.stage {
            Stage::SelectApplication => return FlowEvent::Exit,
            Stage::SelectServer => {
                self.stage = Stage::SelectApplication;
                self.cursor = self.app.unwrap_or(0);
            }
            Stage::EnterDate => {
                self.stage = Stage::SelectServer;
                self.cursor = self.server_cursor();
            }
            Stage::PickResult => {
                self.results.clear();
                self.stage = Stage::EnterDate;
                self.cursor = 0;
            }
            Stage::Loading => {}
        }
        FlowEvent::None
    }

    fn enter(&mut self) -> FlowEvent {
        match self.stage {
            Stage::SelectApplication => {
                if self.cursor < self.apps.len() {
                    self.message = None;
                    self.app = Some(self.cursor);
                    self.stage = Stage::SelectServer;
                    self.cursor = 0;
                }
                FlowEvent::None
            }
            Stage::SelectServer => {
                self.server = match self.cursor {
                    0 => None,
                    idx => self.server_options().get(idx).cloned(),
                };
                self.date_input = self.today.format(REQUEST_DATE_FORMAT).to_string();
                self.stage = Stage::EnterDate;
                self.cursor = 0;
                FlowEvent::None
            }
            Stage::EnterDate => {
                let Some(app) = self.selected_app() else {
                    self.stage = Stage::SelectApplication;
                    return FlowEvent::None;
                };
                let request = RetrievalRequest::new(app.name.clone(), self.date_input.clone())
                    .with_server(self.server.clone());
                info!(app = %request.app, date = %request.date, server = ?request.server, "fetch requested");
                self.message = None;
                self.stage = Stage::Loading;
                FlowEvent::Fetch(request)
            }
            Stage::PickResult => {
                if self.cursor < self.results.len() {
                    FlowEvent::View(self.cursor)
                } else {
                    FlowEvent::None
                }
            }
            Stage::Loading => FlowEvent::None,
        }
    }

    fn server_cursor(&self) -> usize {
        match &self.server {
            None => 0,
            Some(server) => self
                .server_options()
                .iter()
                .position(|s| s == server)
                .unwrap_or(0),
        }
    }

    /// Feed the retrieval result back in.
    pub fn finish_loading(
        &mut self,
        result: Result<RetrievalOutcome, RetrievalError>,
    ) -> FlowEvent {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.fail(format!("Error: {}", e));
                return FlowEvent::None;
            }
        };

        let (fetched, failures) = outcome.into_parts();
        self.message = failure_notice(&failures);
        self.results = fetched;
        self.cursor = 0;

        match self.results.len() {
            0 => {
                self.fail("Error: no logs retrieved".to_string());
                FlowEvent::None
            }
            1 => FlowEvent::View(0),
            _ => {
                self.stage = Stage::PickResult;
                FlowEvent::None
            }
        }
    }

    /// The background retrieval went away without reporting.
    pub fn retrieval_lost(&mut self) {
        self.fail("Error: retrieval stopped unexpectedly".to_string());
    }

    /// A viewed file could not be loaded.
    pub fn view_failed(&mut self, reason: String) {
        if self.results.len() > 1 {
            self.stage = Stage::PickResult;
            self.message = Some(Message::Error(reason));
        } else {
            self.fail(reason);
        }
    }

    /// The viewer for a result closed.
    pub fn viewer_closed(&mut self, exit: ViewerExit) -> FlowEvent {
        if exit == ViewerExit::Quit {
            return FlowEvent::Exit;
        }
        if self.results.len() > 1 {
            self.stage = Stage::PickResult;
        } else {
            self.results.clear();
            self.stage = Stage::SelectApplication;
            self.cursor = self.app.unwrap_or(0);
        }
        FlowEvent::None
    }

    fn fail(&mut self, reason: String) {
        self.results.clear();
        self.stage = Stage::SelectApplication;
        self.cursor = self.app.unwrap_or(0);
        self.message = Some(Message::Error(reason));
    }
}

/// One line naming every host that did not serve the file.
fn failure_notice(failures: &[HostReport]) -> Option<Message> {
    if failures.is_empty() {
        return None;
    }
    let hosts: Vec<String> = failures
        .iter()
        .map(|r| format!("{} ({})", r.server, r.outcome.detail().unwrap_or_default()))
        .collect();
    Some(Message::Info(format!("Skipped: {}", hosts.join(", "))))
}

/// Map a key press to a flow action for the given stage.
pub fn map_key(stage: Stage, key: KeyEvent) -> Option<FlowAction> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return (key.code == KeyCode::Char('c')).then_some(FlowAction::Quit);
    }
    match key.code {
        KeyCode::Esc => Some(FlowAction::Back),
        KeyCode::Enter => Some(FlowAction::Enter),
        KeyCode::Up => Some(FlowAction::Up),
        KeyCode::Down => Some(FlowAction::Down),
        KeyCode::Backspace => Some(FlowAction::Backspace),
        KeyCode::Char(c) if stage == Stage::EnterDate => Some(FlowAction::Char(c)),
        KeyCode::Char('k') => Some(FlowAction::Up),
        KeyCode::Char('j') => Some(FlowAction::Down),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::StagedFile;
    use crate::retrieval::{HostOutcome, ResolvedTarget};

    fn apps() -> Vec<ApplicationDescriptor> {
        vec![
            ApplicationDescriptor {
                name: "billing".into(),
                user_ref: "u-1".into(),
                log_path: "/logs/billing.log".into(),
                log_pattern: "billing-{date}.log".into(),
                date_format: "%Y-%m-%d".into(),
                servers: vec!["h1".into(), "h2".into()],
            },
            ApplicationDescriptor {
                name: "auth".into(),
                user_ref: "u-1".into(),
                log_path: "/logs/auth.log".into(),
                log_pattern: String::new(),
                date_format: "%Y-%m-%d".into(),
                servers: vec!["h3".into()],
            },
        ]
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 10).unwrap()
    }

    fn flow() -> SelectionFlow {
        SelectionFlow::new(&apps(), today())
    }

    fn outcome(hosts: &[(&str, bool)]) -> RetrievalOutcome {
        RetrievalOutcome {
            app: "billing".into(),
            target: ResolvedTarget {
                file_name: "billing-2025-09-10.log".into(),
                remote_path: "/logs/billing-2025-09-10.log".into(),
            },
            reports: hosts
                .iter()
                .map(|(server, ok)| HostReport {
                    server: server.to_string(),
                    outcome: if *ok {
                        let tmp = tempfile::NamedTempFile::new().unwrap();
                        HostOutcome::Fetched(StagedFile::new(tmp.into_temp_path(), 0))
                    } else {
                        HostOutcome::NotFound
                    },
                })
                .collect(),
        }
    }

    fn to_date_stage(flow: &mut SelectionFlow, server_idx: usize) {
        flow.handle(FlowAction::Enter);
        for _ in 0..server_idx {
            flow.handle(FlowAction::Down);
        }
        flow.handle(FlowAction::Enter);
    }

    #[test]
    fn test_forward_path_builds_request() {
        let mut flow = flow();
        to_date_stage(&mut flow, 2);
        assert_eq!(flow.stage(), Stage::EnterDate);
        assert_eq!(flow.selected_server(), Some("h2"));
        assert_eq!(flow.date_input(), "2025-09-10");

        let event = flow.handle(FlowAction::Enter);
        assert_eq!(
            event,
            FlowEvent::Fetch(RetrievalRequest::new("billing", "2025-09-10").with_server(Some("h2".into())))
        );
        assert_eq!(flow.stage(), Stage::Loading);
    }

    #[test]
    fn test_all_servers_fans_out() {
        let mut flow = flow();
        to_date_stage(&mut flow, 0);
        assert_eq!(flow.server_options(), vec![ALL_SERVERS, "h1", "h2"]);
        assert_eq!(flow.selected_server(), None);
        match flow.handle(FlowAction::Enter) {
            FlowEvent::Fetch(request) => assert_eq!(request.server, None),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_back_returns_one_stage() {
        let mut flow = flow();
        flow.handle(FlowAction::Down);
        to_date_stage(&mut flow, 1);
        assert_eq!(flow.handle(FlowAction::Back), FlowEvent::None);
        assert_eq!(flow.stage(), Stage::SelectServer);
        assert_eq!(flow.cursor(), 1);
        flow.handle(FlowAction::Back);
        assert_eq!(flow.stage(), Stage::SelectApplication);
        assert_eq!(flow.cursor(), 1);
        assert_eq!(flow.handle(FlowAction::Back), FlowEvent::Exit);
    }

    #[test]
    fn test_date_input_accepts_digits_and_dash() {
        let mut flow = flow();
        to_date_stage(&mut flow, 1);
        for _ in 0..10 {
            flow.handle(FlowAction::Backspace);
        }
        for c in "2025-a09/-01x".chars() {
            flow.handle(FlowAction::Char(c));
        }
        assert_eq!(flow.date_input(), "2025-09-01");
    }

    #[test]
    fn test_cursor_clamped_to_list() {
        let mut flow = flow();
        for _ in 0..5 {
            flow.handle(FlowAction::Down);
        }
        assert_eq!(flow.cursor(), 1);
        flow.handle(FlowAction::Up);
        flow.handle(FlowAction::Up);
        assert_eq!(flow.cursor(), 0);
    }

    #[test]
    fn test_loading_ignores_input() {
        let mut flow = flow();
        to_date_stage(&mut flow, 1);
        flow.handle(FlowAction::Enter);
        assert_eq!(flow.handle(FlowAction::Back), FlowEvent::None);
        assert_eq!(flow.handle(FlowAction::Enter), FlowEvent::None);
        assert_eq!(flow.stage(), Stage::Loading);
        assert_eq!(flow.handle(FlowAction::Quit), FlowEvent::Exit);
    }

    #[test]
    fn test_failure_returns_to_first_stage() {
        let mut flow = flow();
        to_date_stage(&mut flow, 1);
        flow.handle(FlowAction::Enter);
        let event = flow.finish_loading(Err(RetrievalError::DateFormat { input: "2025-99".into() }));
        assert_eq!(event, FlowEvent::None);
        assert_eq!(flow.stage(), Stage::SelectApplication);
        assert!(matches!(flow.message(), Some(Message::Error(m)) if m.contains("invalid date")));
    }

    #[test]
    fn test_single_success_goes_straight_to_viewer() {
        let mut flow = flow();
        to_date_stage(&mut flow, 1);
        flow.handle(FlowAction::Enter);
        let event = flow.finish_loading(Ok(outcome(&[("h1", true)])));
        assert_eq!(event, FlowEvent::View(0));
        assert_eq!(flow.viewer_closed(ViewerExit::Back), FlowEvent::None);
        assert_eq!(flow.stage(), Stage::SelectApplication);
        assert!(flow.results().is_empty());
    }

    #[test]
    fn test_multiple_successes_offer_picker() {
        let mut flow = flow();
        to_date_stage(&mut flow, 0);
        flow.handle(FlowAction::Enter);
        let event = flow.finish_loading(Ok(outcome(&[("h1", true), ("h2", false), ("h3", true)])));
        assert_eq!(event, FlowEvent::None);
        assert_eq!(flow.stage(), Stage::PickResult);
        assert_eq!(flow.results().len(), 2);
        assert!(matches!(flow.message(), Some(Message::Info(m)) if m.contains("h2")));

        flow.handle(FlowAction::Down);
        assert_eq!(flow.handle(FlowAction::Enter), FlowEvent::View(1));
        assert_eq!(flow.result(1).unwrap().server, "h3");

        flow.viewer_closed(ViewerExit::Back);
        assert_eq!(flow.stage(), Stage::PickResult);
        assert_eq!(flow.viewer_closed(ViewerExit::Quit), FlowEvent::Exit);

        flow.handle(FlowAction::Back);
        assert_eq!(flow.stage(), Stage::EnterDate);
        assert!(flow.results().is_empty());
    }

    #[test]
    fn test_key_mapping_by_stage() {
        let key = |c| KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
        assert_eq!(map_key(Stage::SelectApplication, key('j')), Some(FlowAction::Down));
        assert_eq!(map_key(Stage::EnterDate, key('j')), Some(FlowAction::Char('j')));
        assert_eq!(map_key(Stage::EnterDate, key('5')), Some(FlowAction::Char('5')));
        assert_eq!(
            map_key(Stage::Loading, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(FlowAction::Quit)
        );
        assert_eq!(map_key(Stage::SelectServer, key('x')), None);
    }
}

//! Retrieval orchestrator.
//!
//! Turns a [`RetrievalRequest`] into one [`HostReport`] per attempted server.
//! Per-host failures are recorded as data and never abort the batch; only
//! pre-flight problems (unknown app, missing credentials, bad date) and the
//! all-hosts-failed case surface as [`RetrievalError`].

pub mod handoff;
pub mod naming;

pub use handoff::{open_in_editor, EditorHandoff, FetchedLog};
pub use naming::{parse_request_date, render_date, resolve_target, ResolvedTarget, TargetDate};

use crate::config::{ApplicationDescriptor, Config};
use crate::remote::{Connector, RemoteSession, StagedFile};
use crate::secrets::{Credentials, SecretError, SecretStore};
use crossbeam_channel::unbounded;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Request-level failures.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("app not found: {0}")]
    UnknownApplication(String),
    #[error("app '{app}' references unknown user '{owner}'")]
    UnknownOwner { app: String, owner: String },
    #[error("failed to get credentials for user {owner}: {source}")]
    Credential {
        owner: String,
        #[source]
        source: SecretError,
    },
    #[error("invalid date '{input}'. Use YYYY-MM-DD")]
    DateFormat { input: String },
    #[error("app '{0}' has no servers configured")]
    NoServers(String),
    #[error("no log files found at {} on any of {} server(s)", .target.remote_path, .reports.len())]
    NoLogsFound {
        target: ResolvedTarget,
        reports: Vec<HostReport>,
    },
}

/// One user action's worth of retrieval parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    pub app: String,
    /// `YYYY-MM-DD`, `today`, or empty for the current (non-dated) file.
    pub date: String,
    /// Restrict the fetch to this host instead of every configured server.
    pub server: Option<String>,
}

impl RetrievalRequest {
    pub fn new(app: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            date: date.into(),
            server: None,
        }
    }

    /// Request for the live, non-dated file.
    pub fn current(app: impl Into<String>) -> Self {
        Self::new(app, "")
    }

    pub fn with_server(mut self, server: Option<String>) -> Self {
        self.server = server.filter(|s| !s.trim().is_empty());
        self
    }
}

/// What happened on one host.
#[derive(Debug)]
pub enum HostOutcome {
    Fetched(StagedFile),
    ConnectFailed(String),
    NotFound,
    DownloadFailed(String),
}

impl HostOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, HostOutcome::Fetched(_))
    }

    /// Short status tag.
    pub fn status(&self) -> &'static str {
        match self {
            HostOutcome::Fetched(_) => "fetched",
            HostOutcome::ConnectFailed(_) => "connect-failed",
            HostOutcome::NotFound => "not-found",
            HostOutcome::DownloadFailed(_) => "download-failed",
        }
    }

    /// Human readable cause for failures.
    pub fn detail(&self) -> Option<String> {
        match self {
            HostOutcome::Fetched(_) => None,
            HostOutcome::ConnectFailed(reason) => Some(format!("failed to connect: {}", reason)),
            HostOutcome::NotFound => Some("log file not found".to_string()),
            HostOutcome::DownloadFailed(reason) => Some(format!("failed to download: {}", reason)),
        }
    }
}

/// Outcome for one server, in input order.
#[derive(Debug)]
pub struct HostReport {
    pub server: String,
    pub outcome: HostOutcome,
}

/// Serialisable view of a [`HostReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostSummary {
    pub server: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
}

impl HostReport {
    pub fn summary(&self) -> HostSummary {
        HostSummary {
            server: self.server.clone(),
            status: self.outcome.status(),
            detail: self.outcome.detail(),
            local_path: match &self.outcome {
                HostOutcome::Fetched(staged) => Some(staged.path().to_path_buf()),
                _ => None,
            },
        }
    }
}

/// Every host's outcome; at least one of them is a success.
#[derive(Debug)]
pub struct RetrievalOutcome {
    pub app: String,
    pub target: ResolvedTarget,
    pub reports: Vec<HostReport>,
}

impl RetrievalOutcome {
    pub fn success_count(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.reports.len() - self.success_count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &HostReport> {
        self.reports.iter().filter(|r| !r.outcome.is_success())
    }

    pub fn summaries(&self) -> Vec<HostSummary> {
        self.reports.iter().map(HostReport::summary).collect()
    }

    /// Split into the fetched files (input order) and the failure reports.
    pub fn into_parts(self) -> (Vec<FetchedLog>, Vec<HostReport>) {
        let mut fetched = Vec::new();
        let mut failures = Vec::new();
        for report in self.reports {
            match report.outcome {
                HostOutcome::Fetched(staged) => fetched.push(FetchedLog {
                    server: report.server,
                    file_name: self.target.file_name.clone(),
                    staged,
                }),
                outcome => failures.push(HostReport {
                    server: report.server,
                    outcome,
                }),
            }
        }
        (fetched, failures)
    }
}

/// Coordinates per-host fetches for configured applications.
pub struct Retriever<C, S: ?Sized> {
    config: Arc<Config>,
    secrets: Arc<S>,
    connector: Arc<C>,
    timeout: Duration,
    parallelism: usize,
}

impl<C, S: ?Sized> Clone for Retriever<C, S> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            secrets: Arc::clone(&self.secrets),
            connector: Arc::clone(&self.connector),
            timeout: self.timeout,
            parallelism: self.parallelism,
        }
    }
}

impl<C, S> Retriever<C, S>
where
    C: Connector,
    S: SecretStore + ?Sized,
{
    pub fn new(config: Arc<Config>, secrets: Arc<S>, connector: Arc<C>) -> Self {
        let timeout = config.retrieval.connect_timeout();
        let parallelism = config.retrieval.parallelism.max(1);
        Self {
            config,
            secrets,
            connector,
            timeout,
            parallelism,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Hosts fetched concurrently; 1 keeps the fetch sequential.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch the requested file from every selected server.
    pub fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalOutcome, RetrievalError> {
        let app = self.application(&request.app)?;
        let credentials = self.credentials(app)?;

        let date = TargetDate::parse(&request.date)
            .map_err(|input| RetrievalError::DateFormat { input })?;
        let target = resolve_target(app, date.resolve());
        info!(app = %app.name, date = %date, path = %target.remote_path, "looking for logs");

        let servers = self.servers(app, request.server.as_deref())?;
        let reports = if self.parallelism > 1 && servers.len() > 1 {
            self.fetch_parallel(&servers, &credentials, &target.remote_path)
        } else {
            servers
                .iter()
                .map(|server| HostReport {
                    server: server.clone(),
                    outcome: self.fetch_one(server, &credentials, &target.remote_path),
                })
                .collect()
        };
        drop(credentials);

        if !reports.iter().any(|r| r.outcome.is_success()) {
            warn!(app = %app.name, path = %target.remote_path, hosts = reports.len(), "no logs found");
            return Err(RetrievalError::NoLogsFound { target, reports });
        }

        Ok(RetrievalOutcome {
            app: app.name.clone(),
            target,
            reports,
        })
    }

    /// List the app's log directory on each selected server, filtered by the
    /// literal prefix of its pattern. Per-host problems yield empty lists.
    pub fn list_remote(
        &self,
        app_name: &str,
        server: Option<&str>,
    ) -> Result<Vec<(String, Vec<String>)>, RetrievalError> {
        let app = self.application(app_name)?;
        let credentials = self.credentials(app)?;
        let current = resolve_target(app, None);
        let dir = current.directory().unwrap_or(".").to_string();
        let filter = if app.log_pattern.is_empty() {
            current.file_name.clone()
        } else {
            naming::pattern_prefix(&app.log_pattern).to_string()
        };

        let mut listings = Vec::new();
        for server in self.servers(app, server)? {
            let files = match self.connector.connect(&server, &credentials, self.timeout) {
                Ok(mut session) => {
                    let files = session.list_files(&dir, &filter);
                    session.close();
                    files
                }
                Err(e) => {
                    warn!(server = %server, error = %e, "listing skipped");
                    Vec::new()
                }
            };
            listings.push((server, files));
        }
        Ok(listings)
    }

    fn application(&self, name: &str) -> Result<&ApplicationDescriptor, RetrievalError> {
        self.config
            .find_app(name)
            .ok_or_else(|| RetrievalError::UnknownApplication(name.to_string()))
    }

    fn credentials(&self, app: &ApplicationDescriptor) -> Result<Credentials, RetrievalError> {
        let owner = self
            .config
            .find_user(&app.user_ref)
            .ok_or_else(|| RetrievalError::UnknownOwner {
                app: app.name.clone(),
                owner: app.user_ref.clone(),
            })?;
        self.secrets
            .get(&owner.id)
            .map_err(|source| RetrievalError::Credential {
                owner: owner.name.clone(),
                source,
            })
    }

    fn servers(
        &self,
        app: &ApplicationDescriptor,
        only: Option<&str>,
    ) -> Result<Vec<String>, RetrievalError> {
        let servers: Vec<String> = match only {
            Some(server) => vec![server.to_string()],
            None => app
                .servers
                .iter()
                .filter(|s| !s.trim().is_empty())
                .cloned()
                .collect(),
        };
        if servers.is_empty() {
            return Err(RetrievalError::NoServers(app.name.clone()));
        }
        Ok(servers)
    }

    /// Connect, probe, download, close. The session is closed on every path;
    /// dropping it covers unwinding.
    fn fetch_one(&self, server: &str, credentials: &Credentials, path: &str) -> HostOutcome {
        let mut session = match self.connector.connect(server, credentials, self.timeout) {
            Ok(session) => session,
            Err(e) => {
                warn!(server, error = %e, "connect failed");
                return HostOutcome::ConnectFailed(e.to_string());
            }
        };

        let outcome = if !session.file_exists(path) {
            debug!(server, path, "log file not found");
            HostOutcome::NotFound
        } else {
            match session.download_file(path) {
                Ok(staged) => {
                    info!(server, path, bytes = staged.len(), "downloaded");
                    HostOutcome::Fetched(staged)
                }
                Err(e) => {
                    warn!(server, path, error = %e, "download failed");
                    HostOutcome::DownloadFailed(e.to_string())
                }
            }
        };

        session.close();
        outcome
    }

    /// Bounded worker pool over the server list; results are slotted back
    /// into input order.
    fn fetch_parallel(
        &self,
        servers: &[String],
        credentials: &Credentials,
        path: &str,
    ) -> Vec<HostReport> {
        let (job_tx, job_rx) = unbounded::<usize>();
        let (done_tx, done_rx) = unbounded::<(usize, HostOutcome)>();
        for idx in 0..servers.len() {
            let _ = job_tx.send(idx);
        }
        drop(job_tx);

        let workers = self.parallelism.min(servers.len());
        thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                scope.spawn(move || {
                    for idx in job_rx.iter() {
                        let outcome = self.fetch_one(&servers[idx], credentials, path);
                        if done_tx.send((idx, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(done_tx);

        let mut slots: Vec<Option<HostOutcome>> = servers.iter().map(|_| None).collect();
        for (idx, outcome) in done_rx.iter() {
            slots[idx] = Some(outcome);
        }

        servers
            .iter()
            .zip(slots)
            .map(|(server, outcome)| HostReport {
                server: server.clone(),
                outcome: outcome.unwrap_or_else(|| {
                    HostOutcome::DownloadFailed("retrieval task did not report".to_string())
                }),
            })
            .collect()
    }
}

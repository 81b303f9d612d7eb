//! Commands that reach out to the servers.

use anyhow::{bail, Context, Result};
use logx::retrieval::{open_in_editor, HostOutcome, HostReport, HostSummary};
use logx::viewer::{self, ViewerOptions, ViewerState};
use logx::{
    selection, Config, EditorLauncher, KeyringStore, RetrievalError, RetrievalRequest, Retriever,
    SshConnector,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

type SshRetriever = Retriever<SshConnector, KeyringStore>;

pub fn load_config(path: &Path) -> Result<Config> {
    Config::load_from(path).with_context(|| format!("failed to load {}", path.display()))
}

fn retriever(config: Config) -> SshRetriever {
    Retriever::new(
        Arc::new(config),
        Arc::new(KeyringStore::default()),
        Arc::new(SshConnector::new()),
    )
}

/// Machine-readable result of `logx view --json`.
#[derive(Serialize)]
struct ViewReport {
    app: String,
    remote_path: String,
    fetched: usize,
    failed: usize,
    hosts: Vec<HostSummary>,
}

impl ViewReport {
    fn new(app: &str, remote_path: &str, reports: &[HostReport]) -> Self {
        let hosts: Vec<HostSummary> = reports.iter().map(HostReport::summary).collect();
        let fetched = reports.iter().filter(|r| r.outcome.is_success()).count();
        Self {
            app: app.to_string(),
            remote_path: remote_path.to_string(),
            fetched,
            failed: hosts.len() - fetched,
            hosts,
        }
    }
}

fn print_report(report: &HostReport) {
    match &report.outcome {
        HostOutcome::Fetched(staged) => println!("✓ {}: {} bytes", report.server, staged.len()),
        outcome => eprintln!(
            "✗ {}: {}",
            report.server,
            outcome.detail().unwrap_or_default()
        ),
    }
}

pub fn view(
    config_path: &Path,
    app: &str,
    date: Option<String>,
    server: Option<String>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let launcher = EditorLauncher::from_config(&config);
    let retriever = retriever(config);
    let request = RetrievalRequest::new(app, date.unwrap_or_default()).with_server(server);

    let outcome = match retriever.retrieve(&request) {
        Ok(outcome) => outcome,
        Err(RetrievalError::NoLogsFound { target, reports }) => {
            if json {
                let report = ViewReport::new(app, &target.remote_path, &reports);
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                reports.iter().for_each(print_report);
            }
            bail!("no log files found at {} on any server", target.remote_path);
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        let report = ViewReport::new(&outcome.app, &outcome.target.remote_path, &outcome.reports);
        let (fetched, _) = outcome.into_parts();
        for log in fetched {
            log.staged
                .keep()
                .with_context(|| format!("failed to keep the file fetched from {}", log.server))?;
        }
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    outcome.reports.iter().for_each(print_report);
    let (fetched, _) = outcome.into_parts();
    let handoffs = open_in_editor(fetched, &launcher);

    let mut opened = 0;
    for handoff in &handoffs {
        match &handoff.result {
            Ok(path) => {
                opened += 1;
                println!("Opened {} ({})", handoff.server, path.display());
            }
            Err(e) => eprintln!("✗ {}: {}", handoff.server, e),
        }
    }
    if opened == 0 {
        bail!("could not open any of the fetched logs in an editor");
    }
    Ok(())
}

pub fn open(config_path: &Path, app: &str, date: Option<String>, server: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let options = ViewerOptions::from_config(&config);
    let retriever = retriever(config);
    let request = RetrievalRequest::new(app, date.unwrap_or_default()).with_server(server);

    let (fetched, failures) = retriever.retrieve(&request)?.into_parts();
    let Some(first) = fetched.first() else {
        bail!("no log files were fetched");
    };
    info!(server = %first.server, file = %first.file_name, "opening viewer");

    // The viewport is sized from the terminal on the first frame.
    let mut state = ViewerState::from_fetched(first, 1)
        .with_context(|| format!("failed to read the file fetched from {}", first.server))?;
    viewer::view(&mut state, &options)?;

    failures.iter().for_each(print_report);
    if fetched.len() > 1 {
        eprintln!(
            "Also found on {} other server(s); use `logx browse` to pick one.",
            fetched.len() - 1
        );
    }
    Ok(())
}

pub fn browse(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    if config.apps.is_empty() {
        bail!("no apps configured. Add one with: logx app add");
    }
    let options = ViewerOptions::from_config(&config);
    selection::browse(&retriever(config), &options)?;
    Ok(())
}

pub fn files(config_path: &Path, app: &str, server: Option<String>) -> Result<()> {
    let retriever = retriever(load_config(config_path)?);
    for (server, files) in retriever.list_remote(app, server.as_deref())? {
        println!("{}:", server);
        if files.is_empty() {
            println!("  (no matching files)");
        }
        for file in files {
            println!("  {}", file);
        }
    }
    Ok(())
}

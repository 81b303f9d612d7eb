//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins when set; otherwise the verbosity count picks the level.
//! Full-screen commands log to a file so output never lands on the UI.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("failed to open log file {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("tracing subscriber already installed: {0}")]
    Init(String),
}

/// Where log records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Filter directive for a `-v` count.
pub fn level_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// `<state dir>/logx/logx.log`, falling back to the cache dir on platforms
/// without a state dir.
pub fn default_log_file() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::cache_dir)
        .map(|dir| dir.join("logx").join("logx.log"))
}

pub fn init_tracing(verbosity: u8, target: LogTarget) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(verbosity)));

    let result = match target {
        LogTarget::Stderr => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .try_init(),
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| LoggingError::File {
                    path: path.clone(),
                    source,
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| LoggingError::File {
                    path: path.clone(),
                    source,
                })?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
        }
    };

    result.map_err(|e| LoggingError::Init(e.to_string()))
}

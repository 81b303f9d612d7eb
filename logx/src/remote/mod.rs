//! Remote access layer.
//!
//! A [`Connector`] opens one authenticated connection to a host and hands back
//! a [`RemoteSession`]. Each session operation runs on a fresh remote
//! execution channel; nothing is pooled across calls or hosts.

pub mod ssh;

pub use ssh::{SshConnector, SshSession};

use crate::secrets::Credentials;
use std::path::Path;
use std::time::Duration;
use tempfile::TempPath;
use thiserror::Error;

/// Port appended to hosts that don't name one.
pub const DEFAULT_PORT: u16 = 22;

/// Dial timeout used when no other is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure to reach or authenticate against a host.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("failed to connect to {host}: {reason}")]
    Network { host: String, reason: String },
    #[error("timed out connecting to {host}")]
    Timeout { host: String },
    #[error("ssh handshake with {host} failed: {reason}")]
    Handshake { host: String, reason: String },
    #[error("authentication as '{username}' on {host} was rejected")]
    Auth { host: String, username: String },
}

/// Failure to copy a remote file into a local staging artifact.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("could not open remote channel: {0}")]
    Channel(String),
    #[error("remote read of {path} exited with status {status}{}", stderr_suffix(.stderr))]
    RemoteExit {
        path: String,
        status: i32,
        stderr: String,
    },
    #[error("copy to staging file failed: {0}")]
    Copy(#[from] std::io::Error),
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

/// Local copy of a remote file, held in a uniquely named temporary file.
///
/// The file is removed when the value is dropped unless it is [`kept`](Self::keep).
#[derive(Debug)]
pub struct StagedFile {
    path: TempPath,
    bytes: u64,
}

impl StagedFile {
    pub fn new(path: TempPath, bytes: u64) -> Self {
        Self { path, bytes }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the copied content.
    pub fn len(&self) -> u64 {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    /// Read the staged content and split it into lines.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; `\r\n` endings are
    /// stripped along with `\n`.
    pub fn read_lines(&self) -> std::io::Result<Vec<String>> {
        let bytes = std::fs::read(&self.path)?;
        Ok(split_lines(&bytes))
    }

    /// Detach the file from its temporary lifetime so an external program
    /// can open it after this process moves on.
    pub fn keep(self) -> std::io::Result<std::path::PathBuf> {
        self.path.keep().map_err(|e| e.error)
    }
}

/// Split a fetched byte buffer on line boundaries.
pub fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_string)
        .collect()
}

/// An open, authenticated connection to a single host.
///
/// Implementations must make [`close`](Self::close) idempotent and also close
/// on drop, so every exit path releases the connection.
pub trait RemoteSession {
    /// Host identity as configured.
    fn host(&self) -> &str;

    /// Probe whether a regular file exists. Probe failures read as `false`.
    fn file_exists(&mut self, path: &str) -> bool;

    /// Copy the file into a local staging artifact.
    fn download_file(&mut self, path: &str) -> Result<StagedFile, DownloadError>;

    /// Entries of `dir` whose name contains `pattern`, joined onto `dir`.
    /// Best-effort: errors produce an empty list.
    fn list_files(&mut self, dir: &str, pattern: &str) -> Vec<String>;

    fn close(&mut self);
}

/// Opens [`RemoteSession`]s.
///
/// Shared by reference across retrieval tasks; each opened session belongs to
/// the task that opened it.
pub trait Connector: Send + Sync {
    type Session: RemoteSession;

    fn connect(
        &self,
        host: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self::Session, ConnectError>;
}

/// Append [`DEFAULT_PORT`] when the host string carries none.
///
/// Bracketed IPv6 literals keep their brackets; bare IPv6 literals are
/// bracketed before the port is added.
pub fn with_default_port(host: &str) -> String {
    let host = host.trim();
    if let Some(rest) = host.strip_prefix('[') {
        if rest.contains("]:") {
            return host.to_string();
        }
        return format!("{}:{}", host, DEFAULT_PORT);
    }
    match host.matches(':').count() {
        0 => format!("{}:{}", host, DEFAULT_PORT),
        1 => host.to_string(),
        _ => format!("[{}]:{}", host, DEFAULT_PORT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_port_appended() {
        assert_eq!(with_default_port("10.0.0.1"), "10.0.0.1:22");
        assert_eq!(with_default_port("logs.internal"), "logs.internal:22");
        assert_eq!(with_default_port(" host "), "host:22");
    }

    #[test]
    fn test_explicit_port_kept() {
        assert_eq!(with_default_port("10.0.0.1:2222"), "10.0.0.1:2222");
        assert_eq!(with_default_port("[::1]:2200"), "[::1]:2200");
    }

    #[test]
    fn test_ipv6_literals() {
        assert_eq!(with_default_port("::1"), "[::1]:22");
        assert_eq!(with_default_port("[fe80::1]"), "[fe80::1]:22");
    }

    #[test]
    fn test_split_lines_handles_crlf_and_trailing_newline() {
        assert_eq!(split_lines(b"a\r\nb\nc\n"), vec!["a", "b", "c"]);
        assert!(split_lines(b"").is_empty());
        assert_eq!(split_lines(b"\n\n"), vec!["", ""]);
    }

    #[test]
    fn test_split_lines_replaces_invalid_utf8() {
        let lines = split_lines(b"ok\n\xff\xfe bad\n");
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with(" bad"));
    }

    #[test]
    fn test_staged_file_removed_on_drop_unless_kept() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "one\ntwo\n").unwrap();
        let staged = StagedFile::new(tmp.into_temp_path(), 8);
        let path = staged.path().to_path_buf();
        assert_eq!(staged.read_lines().unwrap(), vec!["one", "two"]);
        drop(staged);
        assert!(!path.exists());

        let tmp = tempfile::NamedTempFile::new().unwrap();
        let kept = StagedFile::new(tmp.into_temp_path(), 0).keep().unwrap();
        assert!(kept.exists());
        std::fs::remove_file(kept).unwrap();
    }

    #[test]
    fn test_download_error_messages() {
        let err = DownloadError::RemoteExit {
            path: "/var/log/a.log".into(),
            status: 1,
            stderr: "cat: /var/log/a.log: Permission denied\n".into(),
        };
        assert_eq!(
            err.to_string(),
            "remote read of /var/log/a.log exited with status 1: cat: /var/log/a.log: Permission denied"
        );
    }
}

//! SSH implementation of the remote access layer (libssh2 via `ssh2`).

use super::{
    with_default_port, ConnectError, Connector, DownloadError, RemoteSession, StagedFile,
};
use crate::secrets::Credentials;
use ssh2::{Channel, ExtendedData, Session};
use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, warn};

/// Opens password-authenticated SSH sessions.
#[derive(Debug, Clone, Default)]
pub struct SshConnector;

impl SshConnector {
    pub fn new() -> Self {
        Self
    }

    fn dial(address: &str, timeout: Duration) -> Result<TcpStream, ConnectError> {
        let addrs: Vec<SocketAddr> = address
            .to_socket_addrs()
            .map_err(|e| ConnectError::Network {
                host: address.to_string(),
                reason: e.to_string(),
            })?
            .collect();

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }

        Err(match last_error {
            Some(e) if e.kind() == io::ErrorKind::TimedOut => ConnectError::Timeout {
                host: address.to_string(),
            },
            Some(e) => ConnectError::Network {
                host: address.to_string(),
                reason: e.to_string(),
            },
            None => ConnectError::Network {
                host: address.to_string(),
                reason: "no addresses resolved".to_string(),
            },
        })
    }
}

impl Connector for SshConnector {
    type Session = SshSession;

    fn connect(
        &self,
        host: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<SshSession, ConnectError> {
        let address = with_default_port(host);
        debug!(host = %address, username = %credentials.username, "connecting");

        let tcp = Self::dial(&address, timeout)?;

        let mut session = Session::new().map_err(|e| ConnectError::Handshake {
            host: address.clone(),
            reason: e.to_string(),
        })?;
        session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| ConnectError::Handshake {
            host: address.clone(),
            reason: e.to_string(),
        })?;

        // Host keys are not pinned; the configured hosts are trusted as given.
        if session
            .userauth_password(&credentials.username, &credentials.password)
            .is_err()
            || !session.authenticated()
        {
            return Err(ConnectError::Auth {
                host: address,
                username: credentials.username.clone(),
            });
        }

        // Per-command reads may run far longer than the dial.
        session.set_timeout(0);
        debug!(host = %address, "connected");

        Ok(SshSession {
            host: host.to_string(),
            session: Some(session),
        })
    }
}

/// One authenticated SSH connection.
pub struct SshSession {
    host: String,
    session: Option<Session>,
}

impl SshSession {
    fn channel(&self) -> Result<Channel, DownloadError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| DownloadError::Channel("session already closed".to_string()))?;
        let mut channel = session
            .channel_session()
            .map_err(|e| DownloadError::Channel(e.to_string()))?;
        // Unread stderr holds the shared window and stalls stdout.
        channel
            .handle_extended_data(ExtendedData::Ignore)
            .map_err(|e| DownloadError::Channel(e.to_string()))?;
        Ok(channel)
    }

    /// Run `command` and collect stdout and the exit status.
    fn run(&self, command: &str) -> Result<(String, i32), DownloadError> {
        let mut channel = self.channel()?;
        channel
            .exec(command)
            .map_err(|e| DownloadError::Channel(e.to_string()))?;

        let mut stdout = String::new();
        channel.read_to_string(&mut stdout)?;
        let status = finish(&mut channel);
        Ok((stdout, status))
    }
}

/// Close the channel and read the remote exit status.
fn finish(channel: &mut Channel) -> i32 {
    let _ = channel.send_eof();
    if let Err(e) = channel.wait_close() {
        warn!(error = %e, "remote channel did not close cleanly");
        return -1;
    }
    channel.exit_status().unwrap_or(-1)
}

/// Quote a path for the remote shell, leaving a leading `~` or `$HOME`
/// outside the quotes so the shell still expands it.
fn quote(path: &str) -> String {
    if path == "~" {
        return "~".to_string();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return format!("~/{}", shell_words::quote(rest));
    }
    if let Some(rest) = path.strip_prefix("$HOME/") {
        return format!("\"$HOME\"/{}", shell_words::quote(rest));
    }
    shell_words::quote(path).into_owned()
}

/// `test -f` probe printing a marker only on success.
pub(crate) fn probe_command(path: &str) -> String {
    format!("test -f {} && echo exists", quote(path))
}

pub(crate) fn read_command(path: &str) -> String {
    format!("cat {}", quote(path))
}

/// Re-run a failed read keeping only the first KiB of its stderr.
pub(crate) fn diagnose_command(path: &str) -> String {
    format!("cat {} 2>&1 >/dev/null | head -c 1024", quote(path))
}

/// Never fails: a missing dir or no match yields empty output.
pub(crate) fn list_command(dir: &str, pattern: &str) -> String {
    format!(
        "ls -1 {} 2>/dev/null | grep -F -- {} || true",
        quote(dir),
        quote(pattern)
    )
}

/// Join a listed entry onto its directory using remote (`/`) separators.
pub(crate) fn join_remote(dir: &str, entry: &str) -> String {
    if dir.is_empty() {
        entry.to_string()
    } else if dir.ends_with('/') {
        format!("{}{}", dir, entry)
    } else {
        format!("{}/{}", dir, entry)
    }
}

impl RemoteSession for SshSession {
    fn host(&self) -> &str {
        &self.host
    }

    fn file_exists(&mut self, path: &str) -> bool {
        match self.run(&probe_command(path)) {
            Ok((stdout, _)) => stdout.trim() == "exists",
            Err(e) => {
                debug!(host = %self.host, path, error = %e, "existence probe failed");
                false
            }
        }
    }

    fn download_file(&mut self, path: &str) -> Result<StagedFile, DownloadError> {
        let mut staging = tempfile::Builder::new()
            .prefix("logx-")
            .suffix(".log")
            .tempfile()?;

        let mut channel = self.channel()?;
        channel
            .exec(&read_command(path))
            .map_err(|e| DownloadError::Channel(e.to_string()))?;

        let bytes = io::copy(&mut channel, staging.as_file_mut())?;
        let status = finish(&mut channel);
        if status != 0 {
            let stderr = match self.run(&diagnose_command(path)) {
                Ok((message, _)) => message.trim_end().to_string(),
                Err(e) => {
                    debug!(host = %self.host, path, error = %e, "could not read the failure message");
                    String::new()
                }
            };
            return Err(DownloadError::RemoteExit {
                path: path.to_string(),
                status,
                stderr,
            });
        }

        debug!(host = %self.host, path, bytes, "downloaded");
        Ok(StagedFile::new(staging.into_temp_path(), bytes))
    }

    fn list_files(&mut self, dir: &str, pattern: &str) -> Vec<String> {
        match self.run(&list_command(dir, pattern)) {
            Ok((stdout, _)) => stdout
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|entry| join_remote(dir, entry))
                .collect(),
            Err(e) => {
                debug!(host = %self.host, dir, error = %e, "listing failed");
                Vec::new()
            }
        }
    }

    fn close(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.disconnect(None, "closing", None) {
                debug!(host = %self.host, error = %e, "disconnect failed");
            }
        }
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_quote_paths() {
        assert_eq!(probe_command("/var/log/app.log"), "test -f /var/log/app.log && echo exists");
        assert_eq!(read_command("/logs/my app.log"), "cat '/logs/my app.log'");
        assert_eq!(
            list_command("/logs", "app-"),
            "ls -1 /logs 2>/dev/null | grep -F -- app- || true"
        );
    }

    #[test]
    fn test_home_relative_paths_stay_expandable() {
        assert_eq!(read_command("~/logs/app.log"), "cat ~/logs/app.log");
        assert_eq!(
            probe_command("~/my logs/app.log"),
            "test -f ~/'my logs/app.log' && echo exists"
        );
        assert_eq!(read_command("$HOME/logs/app.log"), "cat \"$HOME\"/logs/app.log");
        assert_eq!(
            list_command("~/logs", "app-"),
            "ls -1 ~/logs 2>/dev/null | grep -F -- app- || true"
        );
        assert_eq!(list_command("~", "app-"), "ls -1 ~ 2>/dev/null | grep -F -- app- || true");
        // Only a leading tilde is special.
        assert_eq!(read_command("/logs/~/app.log"), "cat '/logs/~/app.log'");
        assert_eq!(read_command("~other/app.log"), "cat '~other/app.log'");
        assert_eq!(read_command("~/x; rm -rf /"), "cat ~/'x; rm -rf /'");
    }

    #[test]
    fn test_failed_read_is_diagnosed_with_bounded_stderr() {
        assert_eq!(
            diagnose_command("/logs/my app.log"),
            "cat '/logs/my app.log' 2>&1 >/dev/null | head -c 1024"
        );
        assert_eq!(
            diagnose_command("~/app.log"),
            "cat ~/app.log 2>&1 >/dev/null | head -c 1024"
        );
    }

    #[test]
    fn test_commands_neutralise_shell_metacharacters() {
        let cmd = read_command("/tmp/x; rm -rf ~");
        assert_eq!(cmd, "cat '/tmp/x; rm -rf ~'");
    }

    #[test]
    fn test_join_remote() {
        assert_eq!(join_remote("/logs", "a.log"), "/logs/a.log");
        assert_eq!(join_remote("/logs/", "a.log"), "/logs/a.log");
        assert_eq!(join_remote("", "a.log"), "a.log");
    }

    #[test]
    fn test_unreachable_host_is_connect_error() {
        // Port 9 on localhost is closed in any sane test environment.
        let err = SshConnector::new()
            .connect(
                "127.0.0.1:9",
                &Credentials::new("nobody", "nothing"),
                Duration::from_millis(500),
            )
            .err()
            .unwrap();
        assert!(matches!(err, ConnectError::Network { .. } | ConnectError::Timeout { .. }));
    }
}

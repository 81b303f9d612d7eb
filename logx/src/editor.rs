//! Launching an external text editor on a local file.

use crate::config::Config;
use std::env;
use std::io;
use std::path::Path;
use std::process::Command;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("no suitable editor found; set one with `logx editor set <command>`")]
    NoEditor,
    #[error("invalid editor command: {0}")]
    InvalidCommand(String),
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {status}")]
    Exit { program: String, status: String },
    #[error("could not keep staged file: {0}")]
    Io(#[from] io::Error),
}

/// Something that can show a local file to the user.
pub trait OpenFile {
    fn open(&self, path: &Path) -> Result<(), LaunchError>;
}

/// A resolved program plus leading arguments; the file path goes last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl EditorCommand {
    /// Split a command line with shell-word rules.
    pub fn parse(command: &str) -> Result<Self, LaunchError> {
        let parts = shell_words::split(command)
            .map_err(|e| LaunchError::InvalidCommand(format!("{}: {}", command, e)))?;
        let (program, args) = parts
            .split_first()
            .ok_or_else(|| LaunchError::InvalidCommand(command.to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn bare(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Run the command on `path` and wait for it to exit.
    pub fn run(&self, path: &Path) -> Result<(), LaunchError> {
        if path.as_os_str().to_string_lossy().starts_with('-') {
            return Err(LaunchError::InvalidCommand(
                "refusing to pass a path starting with '-'".to_string(),
            ));
        }
        debug!(program = %self.program, path = %path.display(), "launching editor");
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .status()
            .map_err(|source| LaunchError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(LaunchError::Exit {
                program: self.program.clone(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

/// Opens files with the configured editor, `$VISUAL`/`$EDITOR`, or the first
/// known editor for the platform.
#[derive(Debug, Clone, Default)]
pub struct EditorLauncher {
    custom: Option<String>,
}

impl EditorLauncher {
    pub fn new(custom: Option<String>) -> Self {
        Self {
            custom: custom.filter(|c| !c.trim().is_empty()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.editor.clone())
    }

    /// Open with an explicit command line instead of the resolved editor.
    pub fn open_with(&self, path: &Path, command: &str) -> Result<(), LaunchError> {
        EditorCommand::parse(command)?.run(path)
    }

    /// The command [`open`](OpenFile::open) would run.
    pub fn resolve(&self) -> Result<EditorCommand, LaunchError> {
        self.resolve_with(|key| env::var(key).ok(), |program| which::which(program).is_ok())
    }

    fn resolve_with(
        &self,
        var: impl Fn(&str) -> Option<String>,
        on_path: impl Fn(&str) -> bool,
    ) -> Result<EditorCommand, LaunchError> {
        if let Some(custom) = &self.custom {
            return EditorCommand::parse(custom);
        }
        for key in ["VISUAL", "EDITOR"] {
            if let Some(value) = var(key).filter(|v| !v.trim().is_empty()) {
                return EditorCommand::parse(&value);
            }
        }
        platform_candidates()
            .into_iter()
            .find(|candidate| on_path(&candidate.program))
            .or_else(platform_fallback)
            .ok_or(LaunchError::NoEditor)
    }
}

impl OpenFile for EditorLauncher {
    fn open(&self, path: &Path) -> Result<(), LaunchError> {
        self.resolve()?.run(path)
    }
}

#[cfg(target_os = "linux")]
fn platform_candidates() -> Vec<EditorCommand> {
    ["code", "gedit", "kate", "nano", "vim"]
        .into_iter()
        .map(EditorCommand::bare)
        .collect()
}

#[cfg(target_os = "macos")]
fn platform_candidates() -> Vec<EditorCommand> {
    vec![
        EditorCommand::bare("code"),
        EditorCommand::bare("subl"),
        EditorCommand {
            program: "open".to_string(),
            args: vec!["-e".to_string()],
        },
    ]
}

#[cfg(windows)]
fn platform_candidates() -> Vec<EditorCommand> {
    Vec::new()
}

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
fn platform_candidates() -> Vec<EditorCommand> {
    Vec::new()
}

/// Used when nothing from [`platform_candidates`] is on `PATH`.
#[cfg(target_os = "macos")]
fn platform_fallback() -> Option<EditorCommand> {
    Some(EditorCommand {
        program: "open".to_string(),
        args: vec!["-e".to_string()],
    })
}

#[cfg(windows)]
fn platform_fallback() -> Option<EditorCommand> {
    let installed = [
        r"C:\Program Files\Notepad++\notepad++.exe",
        r"C:\Program Files (x86)\Notepad++\notepad++.exe",
    ]
    .into_iter()
    .map(std::path::PathBuf::from)
    .find(|p| p.exists());
    Some(match installed {
        Some(path) => EditorCommand::bare(path.to_string_lossy()),
        None => EditorCommand::bare("notepad"),
    })
}

#[cfg(not(any(target_os = "macos", windows)))]
fn platform_fallback() -> Option<EditorCommand> {
    None
}

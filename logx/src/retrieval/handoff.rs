//! What happens to staged files once a retrieval succeeds.

use crate::editor::{LaunchError, OpenFile};
use crate::remote::StagedFile;
use std::path::PathBuf;
use tracing::warn;

/// A successfully staged file and the host it came from.
#[derive(Debug)]
pub struct FetchedLog {
    pub server: String,
    /// Base name of the remote file.
    pub file_name: String,
    pub staged: StagedFile,
}

impl FetchedLog {
    pub fn read_lines(&self) -> std::io::Result<Vec<String>> {
        self.staged.read_lines()
    }

    /// `server: file_name`, as shown in pickers and titles.
    pub fn label(&self) -> String {
        format!("{}: {}", self.server, self.file_name)
    }
}

/// Result of handing one file to the editor.
#[derive(Debug)]
pub struct EditorHandoff {
    pub server: String,
    pub result: Result<PathBuf, LaunchError>,
}

/// Open every fetched file with `editor`, one at a time.
///
/// Each file is detached from its temporary lifetime first so the editor can
/// still read it after this process exits. A failure for one file is recorded
/// and the remaining files are still opened.
pub fn open_in_editor<E: OpenFile + ?Sized>(
    fetched: Vec<FetchedLog>,
    editor: &E,
) -> Vec<EditorHandoff> {
    fetched
        .into_iter()
        .map(|log| {
            let server = log.server;
            let result = log
                .staged
                .keep()
                .map_err(LaunchError::from)
                .and_then(|path| editor.open(&path).map(|()| path));
            if let Err(e) = &result {
                warn!(server = %server, error = %e, "editor hand-off failed");
            }
            EditorHandoff { server, result }
        })
        .collect()
}

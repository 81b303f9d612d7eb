//! Fetch application log files from remote hosts over SSH and read them in
//! the terminal or in an external editor.

pub mod config;
pub mod editor;
pub mod logging;
pub mod remote;
pub mod retrieval;
pub mod secrets;
pub mod selection;
pub mod terminal;
pub mod theme;
pub mod viewer;

// Re-export commonly used types
pub use config::{ApplicationDescriptor, Config, ConfigError, CredentialOwner};
pub use editor::{EditorLauncher, LaunchError, OpenFile};
pub use remote::{ConnectError, Connector, DownloadError, RemoteSession, SshConnector, StagedFile};
pub use retrieval::{
    FetchedLog, HostOutcome, HostReport, RetrievalError, RetrievalOutcome, RetrievalRequest,
    Retriever, TargetDate,
};
pub use secrets::{Credentials, KeyringStore, MemoryStore, SecretError, SecretStore};
pub use selection::SelectionFlow;
pub use terminal::{TerminalError, TerminalSession};
pub use theme::Theme;
pub use viewer::{ViewerExit, ViewerOptions, ViewerState};

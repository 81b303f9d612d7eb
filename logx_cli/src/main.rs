use anyhow::Result;
use clap::{Parser, Subcommand};
use logx::logging::{default_log_file, init_tracing, LogTarget};
use std::path::PathBuf;

mod fetch;
mod manage;

use manage::{AppAction, EditorAction, UserAction};

#[derive(Parser)]
#[command(name = "logx", version)]
#[command(about = "Fetch application logs from remote servers and read them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a log from every server and open the copies in an editor
    View {
        app: String,
        /// YYYY-MM-DD or "today"; omit for the current log
        date: Option<String>,
        /// Only fetch from this server
        #[arg(short, long)]
        server: Option<String>,
        /// Print a JSON report and keep the downloaded files
        #[arg(long)]
        json: bool,
    },
    /// Fetch a log and read it in the terminal viewer
    Open {
        app: String,
        /// YYYY-MM-DD or "today"; omit for the current log
        date: Option<String>,
        #[arg(short, long)]
        server: Option<String>,
    },
    /// Pick an application, server and date interactively
    Browse,
    /// List the log files available on each server
    Files {
        app: String,
        #[arg(short, long)]
        server: Option<String>,
    },
    /// Manage credential owners
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage applications
    App {
        #[command(subcommand)]
        action: AppAction,
    },
    /// Configure the external editor
    Editor {
        #[command(subcommand)]
        action: EditorAction,
    },
}

impl Commands {
    /// Commands that take over the terminal.
    fn is_fullscreen(&self) -> bool {
        matches!(self, Commands::Open { .. } | Commands::Browse)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Full-screen commands log to a file so records never land on the UI
    let target = if cli.command.is_fullscreen() {
        default_log_file().map(LogTarget::File)
    } else {
        Some(LogTarget::Stderr)
    };
    if let Some(target) = target {
        if let Err(e) = init_tracing(cli.verbose, target) {
            eprintln!("warning: logging disabled: {}", e);
        }
    }

    let config_path = match cli.config {
        Some(path) => path,
        None => logx::Config::config_path()?,
    };

    match cli.command {
        Commands::View {
            app,
            date,
            server,
            json,
        } => fetch::view(&config_path, &app, date, server, json),
        Commands::Open { app, date, server } => fetch::open(&config_path, &app, date, server),
        Commands::Browse => fetch::browse(&config_path),
        Commands::Files { app, server } => fetch::files(&config_path, &app, server),
        Commands::User { action } => manage::user(&config_path, action),
        Commands::App { action } => manage::app(&config_path, action),
        Commands::Editor { action } => manage::editor(&config_path, action),
    }
}

//! Configuration management: credential owners, applications and the editor.

use crate::fetch::load_config;
use anyhow::{bail, Context, Result};
use clap::Subcommand;
use dialoguer::{theme::ColorfulTheme, Input, Password, Select};
use logx::retrieval::render_date;
use logx::{
    ApplicationDescriptor, Config, Credentials, CredentialOwner, KeyringStore, SecretError,
    SecretStore,
};
use std::path::Path;
use tracing::{info, warn};

#[derive(Subcommand)]
pub enum UserAction {
    /// Add a user and store its password in the OS keyring
    Add {
        name: Option<String>,
        /// SSH login name
        #[arg(short, long)]
        username: Option<String>,
    },
    List,
    Delete { name: String },
}

#[derive(Subcommand)]
pub enum AppAction {
    /// Add an application interactively
    Add,
    List,
    /// Edit an application; press Enter to keep a value
    Update { name: String },
    Delete { name: String },
}

#[derive(Subcommand)]
pub enum EditorAction {
    /// Use this command to open logs, e.g. "code --wait"; empty resets
    Set { command: String },
    Show,
}

fn save(config: &Config, path: &Path) -> Result<()> {
    config
        .save_to(path)
        .with_context(|| format!("failed to save {}", path.display()))
}

pub fn user(config_path: &Path, action: UserAction) -> Result<()> {
    let mut config = load_config(config_path)?;
    let secrets = KeyringStore::default();
    let theme = ColorfulTheme::default();

    match action {
        UserAction::Add { name, username } => {
            let name = match name {
                Some(name) => name,
                None => Input::with_theme(&theme)
                    .with_prompt("User name (identifier)")
                    .interact_text()?,
            };
            let username = match username {
                Some(username) => username,
                None => Input::with_theme(&theme)
                    .with_prompt("SSH username")
                    .interact_text()?,
            };
            let password = Password::with_theme(&theme)
                .with_prompt("SSH password")
                .interact()?;

            config.add_user(CredentialOwner {
                id: name.clone(),
                name: name.clone(),
                username: username.clone(),
            })?;
            secrets
                .put(&name, &Credentials::new(username, password))
                .context("failed to store the password")?;
            save(&config, config_path)?;
            info!(user = %name, "user added");
            println!("✓ User '{}' added successfully!", name);
        }
        UserAction::List => {
            if config.users.is_empty() {
                println!("No users configured. Add one with: logx user add");
            }
            for user in &config.users {
                let stored = match secrets.get(&user.id) {
                    Ok(_) => "password stored",
                    Err(SecretError::NotFound(_)) => "no password stored",
                    Err(_) => "keyring unavailable",
                };
                println!("{} (username: {}, {})", user.name, user.username, stored);
            }
        }
        UserAction::Delete { name } => {
            let removed = config.delete_user(&name)?;
            save(&config, config_path)?;
            match secrets.delete(&removed.id) {
                Ok(()) | Err(SecretError::NotFound(_)) => {}
                Err(e) => warn!(user = %name, error = %e, "password left in keyring"),
            }
            println!("✓ User '{}' deleted successfully!", name);
        }
    }
    Ok(())
}

pub fn app(config_path: &Path, action: AppAction) -> Result<()> {
    let mut config = load_config(config_path)?;

    match action {
        AppAction::Add => {
            if config.users.is_empty() {
                bail!("no users configured. Please add a user first using: logx user add");
            }
            let app = prompt_app(&config, None)?;
            let name = app.name.clone();
            config.add_app(app)?;
            save(&config, config_path)?;
            println!("✓ App '{}' added successfully!", name);
        }
        AppAction::List => {
            if config.apps.is_empty() {
                println!("No apps configured. Add one with: logx app add");
            }
            for app in &config.apps {
                let user = config
                    .find_user(&app.user_ref)
                    .map(|u| u.name.as_str())
                    .unwrap_or("?");
                println!("{}", app.name);
                println!("  user:    {}", user);
                println!("  path:    {}", app.log_path);
                if !app.log_pattern.is_empty() {
                    println!("  pattern: {} ({})", app.log_pattern, app.date_format);
                }
                println!("  servers: {}", app.servers.join(", "));
            }
        }
        AppAction::Update { name } => {
            let current = config
                .find_app(&name)
                .cloned()
                .with_context(|| format!("app not found: {}", name))?;
            let app = prompt_app(&config, Some(&current))?;
            config.update_app(app)?;
            save(&config, config_path)?;
            println!("✓ App '{}' updated successfully!", name);
        }
        AppAction::Delete { name } => {
            config.delete_app(&name)?;
            save(&config, config_path)?;
            println!("✓ App '{}' deleted successfully!", name);
        }
    }
    Ok(())
}

/// Ask for every field, offering `current`'s values as defaults.
fn prompt_app(config: &Config, current: Option<&ApplicationDescriptor>) -> Result<ApplicationDescriptor> {
    let theme = ColorfulTheme::default();

    let name = match current {
        Some(app) => app.name.clone(),
        None => Input::with_theme(&theme)
            .with_prompt("App name")
            .interact_text()?,
    };

    let users: Vec<String> = config
        .users
        .iter()
        .map(|u| format!("{} (username: {})", u.name, u.username))
        .collect();
    let default_user = current
        .and_then(|app| config.users.iter().position(|u| u.id == app.user_ref))
        .unwrap_or(0);
    let user_idx = Select::with_theme(&theme)
        .with_prompt("User")
        .items(&users)
        .default(default_user)
        .interact()?;
    let user_ref = config.users[user_idx].id.clone();

    let log_path: String = Input::with_theme(&theme)
        .with_prompt("Log file path (e.g. /logs/billing/billing.log)")
        .with_initial_text(current.map(|a| a.log_path.clone()).unwrap_or_default())
        .interact_text()?;

    let log_pattern: String = Input::with_theme(&theme)
        .with_prompt("File name pattern with {date} (e.g. billing-{date}.log)")
        .with_initial_text(current.map(|a| a.log_pattern.clone()).unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;

    let today = chrono::Local::now().date_naive();
    let date_format: String = Input::with_theme(&theme)
        .with_prompt("Date format (strftime, or a layout such as 2006-01-02)")
        .default(
            current
                .map(|a| a.date_format.clone())
                .unwrap_or_else(|| "%Y-%m-%d".to_string()),
        )
        .validate_with(|spec: &String| -> Result<(), String> {
            if spec.trim().is_empty() {
                Err("date format cannot be empty".to_string())
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    println!("  today renders as: {}", render_date(today, &date_format));

    let servers: String = Input::with_theme(&theme)
        .with_prompt("Servers, comma separated (host or host:port)")
        .with_initial_text(current.map(|a| a.servers.join(", ")).unwrap_or_default())
        .interact_text()?;
    let servers: Vec<String> = servers
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    Ok(ApplicationDescriptor {
        name,
        user_ref,
        log_path,
        log_pattern,
        date_format,
        servers,
    })
}

pub fn editor(config_path: &Path, action: EditorAction) -> Result<()> {
    let mut config = load_config(config_path)?;

    match action {
        EditorAction::Set { command } => {
            config.set_editor(Some(command));
            save(&config, config_path)?;
            match &config.editor {
                Some(command) => println!("✓ Editor set to: {}", command),
                None => println!("✓ Editor reset to the platform default"),
            }
        }
        EditorAction::Show => match &config.editor {
            Some(command) => println!("Current editor: {}", command),
            None => println!("No custom editor set. Using platform default."),
        },
    }
    Ok(())
}

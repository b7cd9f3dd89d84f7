use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};
use crate::identity::{IdentityProvider, LocalIdentity};
use crate::storage;

pub mod commands;

use self::commands::{LinksCommand, PreviewArgs, ProfileCommand};

#[derive(Parser, Debug)]
#[command(
    name = "devlinks",
    version,
    about = "Keyboard-first editor for your developer profile links"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over DEVLINKS_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over DEVLINKS_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Act as this email instead of identity.email from the config
    #[arg(long)]
    pub user: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive editor (default)
    Tui,
    /// Inspect or replace the saved link list
    #[command(subcommand)]
    Links(LinksCommand),
    /// Print the public preview page
    Preview(PreviewArgs),
    /// Show or update profile details
    #[command(subcommand)]
    Profile(ProfileCommand),
}

enum LogSink {
    Stderr,
    File(PathBuf),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let command = cli.command.unwrap_or(Commands::Tui);

    // The alternate screen owns stderr while the editor runs.
    let sink = match command {
        Commands::Tui => LogSink::File(paths.log_dir.join("devlinks.log")),
        _ => LogSink::Stderr,
    };
    init_tracing(&cli.log_level, sink)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let config = loader.load_or_init()?;
    let storage = storage::init(&paths, &config.storage)?;
    let email = cli
        .user
        .clone()
        .unwrap_or_else(|| config.identity.email.clone());
    let user = LocalIdentity::new(storage.clone(), email).current_user()?;
    tracing::debug!(user = %user, database = %storage.database_path().display(), "session resolved");

    let config = Arc::new(config);
    match command {
        Commands::Tui => {
            let mut app = App::new(config, storage, user)?;
            commands::run_tui(&mut app)
        }
        Commands::Links(command) => commands::handle_links_command(&storage, &user, command),
        Commands::Preview(args) => commands::show_preview(&storage, &user, args),
        Commands::Profile(command) => commands::handle_profile_command(&storage, &user, command),
    }
}

fn init_tracing(level: &str, sink: LogSink) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match sink {
            LogSink::Stderr => fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init(),
            LogSink::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_timer(fmt::time::UtcTime::rfc_3339())
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
        }
        Ok(())
    })
    .map(|_| ())
}

//! Grievance Portal CLI - share a grievance list with your partner
//!
//! Every command signs in anonymously, re-enters the saved portal and talks
//! to the hosted backend; `watch` keeps a live session open.

mod cli;
mod commands;
mod config_file;
mod error;

use std::path::Path;

use clap::{CommandFactory, Parser};
use portal_core::prefs::FilePreferenceStore;
use portal_core::remote::FirestoreClient;
use portal_core::PortalSession;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::code::run_code;
use crate::commands::common::start_session;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::countdown::run_countdown;
use crate::commands::list::run_list;
use crate::commands::open::run_open;
use crate::commands::status::run_status;
use crate::commands::switch::{confirm_on_stdin, run_switch};
use crate::commands::watch::run_watch;
use crate::config_file::{resolve_config_path, resolve_prefs_path, CliConfig};
use crate::error::CliError;

type CliSession = PortalSession<FirestoreClient, FilePreferenceStore>;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config_path);
    let prefs = FilePreferenceStore::new(resolve_prefs_path(cli.prefs_path));

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Config { command } => run_config(command, &config_path),
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
        Commands::Countdown { set, clear, watch } => {
            let config = load_config(&config_path)?;
            run_countdown(prefs, &config.app_config()?, set.as_deref(), clear, watch).await
        }
        Commands::Open { code, new } => {
            let mut session = connect(&config_path, prefs).await?;
            run_open(&mut session, code.as_deref(), new).await
        }
        Commands::List { filter, json } => {
            let mut session = connect(&config_path, prefs).await?;
            run_list(&mut session, filter.into(), json).await
        }
        Commands::Add { title, description } => {
            let mut session = connect(&config_path, prefs).await?;
            run_add(&mut session, &title, &description).await
        }
        Commands::Status { id, status } => {
            let mut session = connect(&config_path, prefs).await?;
            run_status(&mut session, &id, status.into()).await
        }
        Commands::Switch { yes } => {
            let mut session = connect(&config_path, prefs).await?;
            run_switch(&mut session, |prompt| yes || confirm_on_stdin(prompt))
        }
        Commands::Watch { filter } => {
            let mut session = connect(&config_path, prefs).await?;
            run_watch(&mut session, filter.into()).await
        }
        Commands::Code => {
            let session = connect(&config_path, prefs).await?;
            run_code(&session)
        }
    }
}

fn init_tracing() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "portal=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(config_path: &Path) -> Result<CliConfig, CliError> {
    CliConfig::load_from_path(config_path).map_err(CliError::Config)
}

/// Build the hosted client and start a signed-in session.
async fn connect(config_path: &Path, prefs: FilePreferenceStore) -> Result<CliSession, CliError> {
    let config = load_config(config_path)?;
    let remote = FirestoreClient::new(config.firestore_config()?)?;
    start_session(remote, prefs, config.app_config()?).await
}

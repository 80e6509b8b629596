use std::path::Path;

use portal_core::util::normalize_text_option;

use crate::cli::ConfigCommands;
use crate::config_file::{redact_secret, CliConfig, API_KEY_ENV, PROJECT_ID_ENV};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, config_path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            api_key,
            project_id,
            poll_interval_ms,
            firestore_url,
            identity_url,
            secure_token_url,
        } => run_config_init(
            config_path,
            ConfigInitArgs {
                api_key,
                project_id,
                poll_interval_ms,
                firestore_url,
                identity_url,
                secure_token_url,
            },
        ),
        ConfigCommands::Show => run_config_show(config_path),
    }
}

#[derive(Debug, Default)]
pub struct ConfigInitArgs {
    pub api_key: Option<String>,
    pub project_id: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub firestore_url: Option<String>,
    pub identity_url: Option<String>,
    pub secure_token_url: Option<String>,
}

/// Merge explicit values into the stored config, keeping existing ones.
pub fn run_config_init(config_path: &Path, args: ConfigInitArgs) -> Result<(), CliError> {
    let mut config = CliConfig::load_from_path(config_path).map_err(CliError::Config)?;
    let section = &mut config.firestore;

    if let Some(value) = normalize_text_option(args.api_key) {
        section.api_key = Some(value);
    }
    if let Some(value) = normalize_text_option(args.project_id) {
        section.project_id = Some(value);
    }
    if let Some(value) = args.poll_interval_ms {
        section.poll_interval_ms = Some(value);
    }
    if let Some(value) = normalize_text_option(args.firestore_url) {
        section.firestore_url = Some(value);
    }
    if let Some(value) = normalize_text_option(args.identity_url) {
        section.identity_url = Some(value);
    }
    if let Some(value) = normalize_text_option(args.secure_token_url) {
        section.secure_token_url = Some(value);
    }
    section.validate_urls()?;

    config.save_to_path(config_path).map_err(CliError::Config)?;
    println!("Config written to {}", config_path.display());

    let mut missing_fields = Vec::new();
    if config.firestore.api_key.is_none() {
        missing_fields.push("api_key");
    }
    if config.firestore.project_id.is_none() {
        missing_fields.push("project_id");
    }
    if missing_fields.is_empty() {
        println!("Backend is ready. Run `portal open --new` to create a portal.");
    } else {
        println!("Config is missing: {}", missing_fields.join(", "));
    }

    Ok(())
}

pub fn run_config_show(config_path: &Path) -> Result<(), CliError> {
    let config = CliConfig::load_from_path(config_path).map_err(CliError::Config)?;
    let app = config.app_config()?;

    println!("config file: {}", config_path.display());
    println!(
        "api_key: {}",
        describe_value(config.firestore.api_key.as_deref(), API_KEY_ENV, true)
    );
    println!(
        "project_id: {}",
        describe_value(config.firestore.project_id.as_deref(), PROJECT_ID_ENV, false)
    );
    match config.firestore_config() {
        Ok(firestore) => {
            println!("poll_interval_ms: {}", firestore.poll_interval_ms);
            println!("firestore_url: {}", firestore.firestore_url);
            println!("identity_url: {}", firestore.identity_url);
            println!("secure_token_url: {}", firestore.secure_token_url);
        }
        Err(error) => println!("backend: {error}"),
    }
    println!("portal_id_length: {}", app.portal_id_length);
    println!("max_grievance_length: {}", app.max_grievance_length);
    Ok(())
}

fn describe_value(file_value: Option<&str>, env_name: &str, secret: bool) -> String {
    let env_value = normalize_text_option(std::env::var(env_name).ok());
    let (value, source) = match (env_value.as_deref(), file_value) {
        (Some(value), _) => (value, env_name),
        (None, Some(value)) => (value, "config file"),
        (None, None) => return "(not set)".to_string(),
    };
    let shown = if secret {
        redact_secret(value)
    } else {
        value.to_string()
    };
    format!("{shown} (from {source})")
}

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use portal_core::{GrievanceStatus, StatusFilter};

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Share grievances with your partner from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to the local preferences file
    #[arg(long, global = true, value_name = "PATH")]
    pub prefs_path: Option<PathBuf>,

    /// Optional path to the CLI config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enter a portal by code, or create a new one
    Open {
        /// Portal code shared by your partner
        code: Option<String>,
        /// Create a fresh portal with a generated code
        #[arg(long, conflicts_with = "code")]
        new: bool,
    },
    /// List grievances in the current portal
    #[command(alias = "ls")]
    List {
        /// Only show grievances with this status
        #[arg(short, long, value_enum, default_value_t = FilterArg::All)]
        filter: FilterArg,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Submit a new grievance
    #[command(alias = "new")]
    Add {
        /// Short title
        title: String,
        /// What happened
        #[arg(required = true)]
        description: Vec<String>,
    },
    /// Change the status of a grievance
    Status {
        /// Grievance ID
        id: String,
        /// New status
        #[arg(value_enum)]
        status: StatusArg,
    },
    /// Leave the current portal
    Switch {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Follow the portal live and issue commands interactively
    Watch {
        /// Initial status filter
        #[arg(short, long, value_enum, default_value_t = FilterArg::All)]
        filter: FilterArg,
    },
    /// Show or change the meeting countdown
    Countdown {
        /// New meeting date (RFC 3339, e.g. 2025-08-14T19:00:00Z)
        #[arg(long, value_name = "DATE", conflicts_with = "clear")]
        set: Option<String>,
        /// Forget the saved meeting date
        #[arg(long)]
        clear: bool,
        /// Keep refreshing every second
        #[arg(short, long)]
        watch: bool,
    },
    /// Print the current portal code to share
    Code,
    /// Configure the hosted backend
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum FilterArg {
    All,
    Pending,
    InProgress,
    Resolved,
}

impl From<FilterArg> for StatusFilter {
    fn from(value: FilterArg) -> Self {
        match value {
            FilterArg::All => Self::All,
            FilterArg::Pending => Self::Pending,
            FilterArg::InProgress => Self::InProgress,
            FilterArg::Resolved => Self::Resolved,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StatusArg {
    Pending,
    InProgress,
    Resolved,
}

impl From<StatusArg> for GrievanceStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Pending => Self::Pending,
            StatusArg::InProgress => Self::InProgress,
            StatusArg::Resolved => Self::Resolved,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update the backend config
    Init {
        /// Firebase web API key
        #[arg(long, value_name = "KEY")]
        api_key: Option<String>,
        /// Firebase project ID
        #[arg(long, value_name = "ID")]
        project_id: Option<String>,
        /// Live feed poll interval in milliseconds
        #[arg(long, value_name = "MS")]
        poll_interval_ms: Option<u64>,
        /// Override the Firestore base URL (e.g. an emulator)
        #[arg(long, value_name = "URL")]
        firestore_url: Option<String>,
        /// Override the Identity Toolkit base URL
        #[arg(long, value_name = "URL")]
        identity_url: Option<String>,
        /// Override the Secure Token base URL
        #[arg(long, value_name = "URL")]
        secure_token_url: Option<String>,
    },
    /// Print the effective config with secrets redacted
    Show,
}

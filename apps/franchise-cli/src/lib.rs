//! Franchise CLI library
//! Argument parsing, command execution and terminal output for the `franchise` binary

pub mod commands;
pub mod logging;
pub mod output;

use clap::{ArgGroup, Parser, Subcommand};
use franchise_core::{ConfigOverlay, ServiceStatus};
use std::path::PathBuf;

pub use commands::{execute, health_check};
pub use output::{
    print_case, print_cases, print_notifications, print_read_outcome, print_remarks,
    print_session,
};

#[derive(Parser, Debug)]
#[command(name = "franchise")]
#[command(about = "Franchise compliance case tracker client")]
#[command(version)]
pub struct Cli {
    /// Backend base URL (overrides config files and environment)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Extra config file, applied after the default locations
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Flags that take precedence over every other configuration source
    #[must_use]
    pub fn overrides(&self) -> ConfigOverlay {
        ConfigOverlay {
            api_url: self.api_url.clone(),
            log_level: self.log_level.clone(),
            json_logs: self.json_logs.then_some(true),
            log_file: self.log_file.clone(),
            ..ConfigOverlay::default()
        }
    }
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Sign in with an issued token
    Login {
        /// Bearer token
        #[arg(long, env = "FRANCHISE_TOKEN", hide_env_values = true)]
        token: String,
        /// Id of the user the token belongs to
        #[arg(long)]
        user: String,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user and their permissions
    Whoami {
        /// Fetch permissions from the server first
        #[arg(long)]
        refresh: bool,
    },
    /// List visible cases
    Cases {
        /// Only cases assigned to me
        #[arg(long)]
        mine: bool,
        /// Limit number of results
        #[arg(long, short)]
        limit: Option<usize>,
    },
    /// Show one case with its services and roll-up
    Case {
        /// Case id
        id: String,
    },
    /// Re-derive a case summary from its services and save it
    Recompute {
        /// Case id
        id: String,
    },
    /// Change the status of one service
    SetStatus {
        /// Case id
        case: String,
        /// Service id
        service: String,
        /// New status (To be Started, Detail Required, In-Progress, Completed)
        status: ServiceStatus,
    },
    /// List remarks on a service, marking the unread ones
    Remarks {
        /// Case id
        case: String,
        /// Service id
        service: String,
    },
    /// Mark remarks read and tell the rest of the case team
    #[command(group(ArgGroup::new("target").required(true).args(["remark", "all"])))]
    MarkRead {
        /// Case id
        case: String,
        /// Service id
        service: String,
        /// Remark id
        #[arg(long)]
        remark: Option<String>,
        /// Every unread remark on the service
        #[arg(long)]
        all: bool,
    },
    /// Add a remark to a service
    AddRemark {
        /// Case id
        case: String,
        /// Service id
        service: String,
        /// Remark text
        text: String,
    },
    /// Delete remarks from a service
    #[command(group(ArgGroup::new("target").required(true).args(["remark", "all"])))]
    DeleteRemark {
        /// Case id
        case: String,
        /// Service id
        service: String,
        /// Remark id
        #[arg(long)]
        remark: Option<String>,
        /// Every remark on the service
        #[arg(long)]
        all: bool,
    },
    /// List my notifications
    Notifications {
        /// Only unread ones
        #[arg(long)]
        unread: bool,
    },
    /// Mark a notification read
    ReadNotification {
        /// Notification id
        id: String,
    },
    /// Check that the backend is reachable
    Health,
}

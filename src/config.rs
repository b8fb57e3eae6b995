/// Configuration management for the socialgram server.
/// Handles command-line argument parsing and the settings handed to services.
use clap::Parser;
use std::path::PathBuf;

use crate::services::accounts::AccountSettings;
use crate::services::EmptyListPolicy;

#[derive(Parser, Debug)]
#[command(name = "Socialgram Server")]
#[command(about = "Social graph, photo and chat backend", long_about = None)]
pub struct Config {
    /// Server port (default: 4000)
    #[arg(long, default_value = "4000")]
    pub port: u16,

    /// SQLite database file path (default: socialgram.db)
    #[arg(long, default_value = "socialgram.db")]
    pub database: PathBuf,

    /// PID file path (optional) - write server PID to this file on startup
    #[arg(long)]
    pub pidfile: Option<PathBuf>,

    /// Minimum age in years required to sign up
    #[arg(long, default_value = "13")]
    pub min_age: u32,

    /// Lifetime of a sign-in session in hours
    #[arg(long, default_value = "168")]
    pub session_ttl_hours: i64,

    /// Report empty list queries as errors (`false` returns empty lists)
    #[arg(long, default_value = "true", action = clap::ArgAction::Set)]
    pub strict_empty_lists: bool,
}

/// Settings shared by every request handler
#[derive(Debug, Clone, Default)]
pub struct ServiceSettings {
    pub list_policy: EmptyListPolicy,
    pub accounts: AccountSettings,
}

impl Config {
    /// Parse command-line arguments into Config
    pub fn from_args() -> Self {
        Config::parse()
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            list_policy: EmptyListPolicy::from_strict(self.strict_empty_lists),
            accounts: AccountSettings {
                min_age: self.min_age,
                session_ttl_seconds: self.session_ttl_hours * 3600,
                ..AccountSettings::default()
            },
        }
    }
}

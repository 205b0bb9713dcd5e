//! Command-line argument parsing for taskdesk.

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::roles::Role;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Data-layer tools for the taskdesk task manager.
#[derive(Parser, Debug)]
#[command(name = "taskdesk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// PostgreSQL connection string (e.g., postgres://user@host:port/database)
    #[arg(long, value_name = "CONNECTION_STRING", global = true)]
    pub url: Option<String>,

    /// Database host
    #[arg(short = 'H', long, value_name = "HOST", global = true)]
    pub host: Option<String>,

    /// Database port
    #[arg(short = 'p', long, value_name = "PORT", global = true)]
    pub port: Option<u16>,

    /// Database name
    #[arg(short = 'd', long, value_name = "DATABASE", global = true)]
    pub database: Option<String>,

    /// Database user
    #[arg(short = 'U', long, value_name = "USER", global = true)]
    pub user: Option<String>,

    /// Config file path
    #[arg(long, value_name = "PATH", env = "TASKDESK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Use the in-memory mock database (for testing)
    #[arg(long, global = true)]
    pub mock_db: bool,

    /// Write logs to the taskdesk log file instead of stderr
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Verify that a database session can be established
    Check,

    /// Show the server the application is connected to
    Status,

    /// Execute a SQL statement
    Query {
        /// SQL to execute
        sql: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the permissions granted to a role
    Permissions {
        /// employee, supervisor, manager, or admin
        role: Role,
    },

    /// Store the database password in the OS keyring
    SetPassword {
        /// Remove the stored password instead
        #[arg(long)]
        clear: bool,
    },
}

impl Command {
    /// Whether the command needs a live database session.
    pub fn needs_database(&self) -> bool {
        matches!(self, Self::Check | Self::Status | Self::Query { .. })
    }
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Applies the connection arguments given on the command line.
    ///
    /// The connection string is applied first, individual flags after it.
    /// Parameters not given keep the value from the file or environment.
    pub fn apply_overrides(&self, config: &mut DatabaseConfig) -> Result<()> {
        if let Some(url) = &self.url {
            config.apply_connection_string(url)?;
        }

        if self.host.is_some() {
            config.host = self.host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.database.is_some() {
            config.database = self.database.clone();
        }
        if self.user.is_some() {
            config.user = self.user.clone();
        }

        Ok(())
    }

    /// Returns the config file path to use.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::Config::default_path)
    }
}

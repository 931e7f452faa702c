//! Configuration handling for pgbind.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use crate::db::ConnectionOptions;
use clap::{Parser, Subcommand};
use std::time::Duration;

pub const DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LIST_MAX: u64 = 1000;

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Connection pool configuration options.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PoolOptions {
    /// Maximum connections in pool (default: 10)
    pub max_connections: Option<u32>,
    /// Minimum connections in pool (default: 1)
    pub min_connections: Option<u32>,
    /// Idle timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Whether to test connections before use (default: true)
    pub test_before_acquire: Option<bool>,
}

impl PoolOptions {
    pub fn max_connections_or_default(&self) -> u32 {
        self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS)
    }

    pub fn min_connections_or_default(&self) -> u32 {
        self.min_connections.unwrap_or(DEFAULT_MIN_CONNECTIONS)
    }

    pub fn idle_timeout_or_default(&self) -> u64 {
        self.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS)
    }

    pub fn acquire_timeout_or_default(&self) -> u64 {
        self.acquire_timeout_secs
            .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS)
    }

    pub fn test_before_acquire_or_default(&self) -> bool {
        self.test_before_acquire.unwrap_or(true)
    }

    /// Validate pool options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == Some(0) {
            return Err("max_connections must be greater than 0".to_string());
        }
        let min = self.min_connections_or_default();
        let max = self.max_connections_or_default();
        if min > max {
            return Err(format!(
                "min_connections ({}) cannot exceed max_connections ({})",
                min, max
            ));
        }
        Ok(())
    }
}

/// A `key=value` pair given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarArg {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for VarArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok(Self {
                key: key.to_string(),
                value: value.to_string(),
            }),
            _ => Err(format!("expected key=value, got '{s}'")),
        }
    }
}

/// Variables shared by the `render` and `exec` commands.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct TemplateArgs {
    /// Bind a text variable (repeatable): --var key=value
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<VarArg>,

    /// Bind a text list (repeatable), elements comma-separated: --list ids=a,b,c
    #[arg(long = "list", value_name = "KEY=A,B,C")]
    pub lists: Vec<VarArg>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print a template with its variables substituted, without connecting
    Render {
        /// Query template
        template: String,
        #[command(flatten)]
        args: TemplateArgs,
    },
    /// Substitute variables and execute a statement that returns no rows
    Exec {
        /// Query template
        template: String,
        #[command(flatten)]
        args: TemplateArgs,
    },
    /// Subscribe to channels and print notifications as JSON lines
    Listen {
        /// Channels to LISTEN on
        #[arg(required = true)]
        topics: Vec<String>,
    },
}

/// Configuration for pgbind.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pgbind",
    about = "Templated SQL, CRUD dispatch and LISTEN/NOTIFY for PostgreSQL",
    version,
    author
)]
pub struct Config {
    /// PostgreSQL connection URL
    #[arg(long, value_name = "URL", env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum connections in the pool
    #[arg(long, env = "PGBIND_MAX_CONNECTIONS")]
    pub max_connections: Option<u32>,

    /// Statement timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_STATEMENT_TIMEOUT_SECS,
        env = "PGBIND_STATEMENT_TIMEOUT"
    )]
    pub statement_timeout: u64,

    /// Maximum rows a List may return
    #[arg(long, default_value_t = DEFAULT_LIST_MAX, env = "PGBIND_LIST_MAX")]
    pub list_max: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "PGBIND_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "PGBIND_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// Get the statement timeout as a Duration.
    pub fn statement_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.statement_timeout)
    }

    /// Runtime options for connections built from this configuration.
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            statement_timeout: self.statement_timeout_duration(),
            list_max: self.list_max,
        }
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_connections: self.max_connections,
            ..PoolOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render_command() {
        let config = Config::try_parse_from([
            "pgbind",
            "render",
            "SELECT * FROM ${\"table\"} WHERE id IN (${'ids'})",
            "--var",
            "table=widgets",
            "--list",
            "ids=a,b",
        ])
        .unwrap();
        match config.command {
            Command::Render { template, args } => {
                assert!(template.starts_with("SELECT"));
                assert_eq!(
                    args.vars,
                    vec![VarArg {
                        key: "table".into(),
                        value: "widgets".into()
                    }]
                );
                assert_eq!(args.lists[0].value, "a,b");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["pgbind", "listen", "jobs"]).unwrap();
        assert_eq!(config.statement_timeout, DEFAULT_STATEMENT_TIMEOUT_SECS);
        assert_eq!(config.list_max, DEFAULT_LIST_MAX);
        assert_eq!(config.log_level, "info");
        let options = config.connection_options();
        assert_eq!(options.statement_timeout, Duration::from_secs(30));
        assert_eq!(options.list_max, 1000);
    }

    #[test]
    fn test_listen_requires_topic() {
        assert!(Config::try_parse_from(["pgbind", "listen"]).is_err());
    }

    #[test]
    fn test_var_arg_parse() {
        assert_eq!(
            "k=v=w".parse::<VarArg>().unwrap(),
            VarArg {
                key: "k".into(),
                value: "v=w".into()
            }
        );
        assert!("novalue".parse::<VarArg>().is_err());
        assert!("=v".parse::<VarArg>().is_err());
    }

    #[test]
    fn test_pool_options_defaults() {
        let opts = PoolOptions::default();
        assert_eq!(opts.max_connections_or_default(), 10);
        assert_eq!(opts.min_connections_or_default(), 1);
        assert_eq!(opts.idle_timeout_or_default(), 600);
        assert_eq!(opts.acquire_timeout_or_default(), 30);
        assert!(opts.test_before_acquire_or_default());
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_pool_options_validation() {
        let zero = PoolOptions {
            max_connections: Some(0),
            ..PoolOptions::default()
        };
        assert!(zero.validate().unwrap_err().contains("max_connections"));

        let inverted = PoolOptions {
            min_connections: Some(10),
            max_connections: Some(5),
            ..PoolOptions::default()
        };
        assert!(inverted.validate().unwrap_err().contains("cannot exceed"));
    }
}

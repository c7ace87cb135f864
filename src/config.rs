// src/config.rs
use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Merging or extracting the layered configuration failed.
    #[error(transparent)]
    Extract(#[from] figment::Error),

    /// Monitor mode was requested without a directory to monitor.
    #[error("no directory to monitor was specified")]
    MissingDirectory,

    /// The monitor root does not exist or is not a directory.
    #[error("monitor root is not a directory: {0}")]
    NotADirectory(String),
}

/// Command-line arguments for the application.
#[derive(Parser, Debug, Deserialize, Default)]
#[clap(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Run in listener mode (receive and print status frames)
    #[clap(
        short,
        long,
        help = "Run in listener mode (receive and print status frames)"
    )]
    pub listen: bool,

    /// Host to bind (monitor mode) or connect to (listener mode)
    #[clap(
        long,
        value_parser,
        help = "Host to bind (monitor mode) or connect to (listener mode)"
    )]
    pub host: Option<String>,

    /// TCP port for the status feed
    #[clap(short, long, value_parser, help = "TCP port for the status feed")]
    pub port: Option<u16>,

    /// Poll and broadcast interval in milliseconds
    #[clap(
        long,
        value_parser,
        help = "Poll and broadcast interval in milliseconds"
    )]
    pub interval_ms: Option<u64>,

    /// Path to a configuration file (e.g., dirbeat.toml)
    #[clap(
        short,
        long,
        value_parser,
        help = "Path to a configuration file (e.g., dirbeat.toml)"
    )]
    pub config: Option<PathBuf>,

    /// Directory to monitor, then zero or more files (relative to it) to watch
    #[clap(
        help = "Directory to monitor, then zero or more files (relative to it) to watch for content changes"
    )]
    pub paths: Vec<String>,

    /// Log level (e.g., trace, debug, info, warn, error)
    #[clap(
        long,
        value_parser,
        help = "Log level (e.g., trace, debug, info, warn, error)"
    )]
    pub log_level: Option<String>,
}

/// Configuration loaded from file, environment, or defaults.
#[derive(Deserialize, Serialize, Debug, Default)]
pub struct FileConfig {
    /// Directory to monitor
    pub directory: Option<String>,
    /// Files to watch for content changes
    pub watch: Option<Vec<String>>,
    /// Bind/connect host
    pub host: Option<String>,
    /// Bind/connect port
    pub port: Option<u16>,
    /// Poll and broadcast interval in milliseconds
    pub interval_ms: Option<u64>,
    /// Listener mode
    pub listen: Option<bool>,
    /// Log level
    pub log_level: Option<String>,
}

/// Final application configuration after merging all sources.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Whether to run in listener mode
    pub listen: bool,
    /// Host to bind or connect to
    pub host: String,
    /// TCP port for the status feed
    pub port: u16,
    /// Poll and broadcast interval in milliseconds
    pub interval_ms: u64,
    /// Directory to monitor (unset in listener mode)
    pub directory: Option<PathBuf>,
    /// Files (relative to the directory) to watch for content changes
    pub watch_files: Vec<String>,
    /// Log level
    pub log_level: String,
}

impl AppConfig {
    /// Loads the application configuration by merging CLI, file, environment, and defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    /// Builds the configuration from already-parsed CLI arguments.
    ///
    /// Precedence, lowest to highest: built-in defaults, the TOML file
    /// (`dirbeat.toml` unless overridden with `--config`), `DIRBEAT_`-prefixed
    /// environment variables, explicit CLI arguments.
    pub fn from_cli(cli_args: CliArgs) -> Result<Self, ConfigError> {
        let config_file_path = cli_args
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from("dirbeat.toml"));

        // Default log level from environment variable DIRBEAT_LOG_LEVEL, then "info"
        let default_log_level =
            std::env::var("DIRBEAT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let fig = Figment::new()
            .merge(Serialized::defaults(FileConfig {
                directory: None,
                watch: Some(vec![]),
                host: Some("localhost".to_string()),
                port: Some(5000),
                interval_ms: Some(1000),
                listen: Some(false),
                log_level: Some(default_log_level.clone()),
            }))
            .merge(Toml::file(config_file_path).nested())
            .merge(Env::prefixed("DIRBEAT_").map(|key| key.as_str().replace("__", ".").into()));

        let mut merged_config: FileConfig = fig.select("dirbeat").extract()?;

        // CLI overrides win over file and environment values.
        if let Some(cli_host) = cli_args.host {
            merged_config.host = Some(cli_host);
        }
        if let Some(cli_port) = cli_args.port {
            merged_config.port = Some(cli_port);
        }
        if let Some(cli_interval) = cli_args.interval_ms {
            merged_config.interval_ms = Some(cli_interval);
        }
        if let Some(cli_ll) = cli_args.log_level {
            merged_config.log_level = Some(cli_ll);
        }
        // For boolean flags, CLI presence means true
        let final_listen = cli_args.listen || merged_config.listen.unwrap_or(false);

        // First positional argument is the directory, the rest are watch files.
        let (directory, watch_files) = if !cli_args.paths.is_empty() {
            let mut paths = cli_args.paths;
            let directory = paths.remove(0);
            (Some(directory), paths)
        } else {
            (
                merged_config.directory,
                merged_config.watch.unwrap_or_default(),
            )
        };

        Ok(AppConfig {
            listen: final_listen,
            host: merged_config
                .host
                .unwrap_or_else(|| "localhost".to_string()),
            port: merged_config.port.unwrap_or(5000),
            interval_ms: merged_config.interval_ms.unwrap_or(1000),
            directory: directory.map(PathBuf::from),
            watch_files,
            log_level: merged_config.log_level.unwrap_or(default_log_level),
        })
    }

    /// The poll/broadcast cadence as a [`std::time::Duration`].
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.interval_ms)
    }

    /// The `host:port` pair used for binding or connecting.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validates monitor-mode prerequisites and returns the monitor root.
    pub fn monitor_root(&self) -> Result<PathBuf, ConfigError> {
        let root = self
            .directory
            .clone()
            .ok_or(ConfigError::MissingDirectory)?;
        if !root.is_dir() {
            return Err(ConfigError::NotADirectory(root.display().to_string()));
        }
        Ok(root)
    }
}

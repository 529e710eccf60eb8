//! Configuration module for the relay server and client.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};

/// Command-line arguments for the relay server
#[derive(Parser, Debug, Default)]
#[command(name = "simple-relay")]
#[command(author = "simple-relay authors")]
#[command(version = "0.1.0")]
#[command(about = "A multi-client TCP message relay", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to (e.g., 127.0.0.1)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Shared secret required to shut the server down remotely
    #[arg(long)]
    pub password: Option<String>,

    /// Append-only message log
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Start immediately without the operator console and exit once stopped
    #[arg(long)]
    pub headless: bool,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret for remote termination
    #[serde(default = "default_password")]
    pub password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: default_password(),
        }
    }
}

/// Message log configuration
#[derive(Debug, Deserialize)]
pub struct RelayConfig {
    /// Path of the append-only message log
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    55222
}

fn default_password() -> String {
    "password".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("./log.txt")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Read and parse a TOML configuration file.
pub fn read_toml(path: &Path) -> Result<TomlConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
    toml::from_str(&contents).map_err(|e| ConfigError::TomlParse(path.to_path_buf(), e))
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub log_file: PathBuf,
    pub log_level: String,
    pub headless: bool,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    /// Resolve already-parsed CLI arguments against the TOML file they name.
    pub fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = match cli.config {
            Some(ref config_path) => read_toml(config_path)?,
            None => TomlConfig::default(),
        };

        Ok(Self::merge(cli, toml_config))
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        Config {
            host: cli.host.unwrap_or(toml_config.server.host),
            port: cli.port.unwrap_or(toml_config.server.port),
            password: cli.password.unwrap_or(toml_config.server.password),
            log_file: cli.log_file.unwrap_or(toml_config.relay.log_file),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
            headless: cli.headless,
        }
    }

    /// Resolve `host:port` into a socket address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        resolve(&self.host, self.port)
    }
}

/// Resolve a host name or literal address plus port to the first matching socket address.
pub fn resolve(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    let display = format!("{host}:{port}");
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| ConfigError::InvalidAddress(display.clone(), e))?;
    addrs.next().ok_or_else(|| {
        ConfigError::InvalidAddress(
            display,
            std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved"),
        )
    })
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    InvalidAddress(String, std::io::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidAddress(addr, e) => {
                write!(f, "Invalid listen address '{}': {}", addr, e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli() -> CliArgs {
        CliArgs {
            log_level: "info".to_string(),
            ..CliArgs::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 55222);
        assert_eq!(config.server.password, "password");
        assert_eq!(config.relay.log_file, PathBuf::from("./log.txt"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            host = "0.0.0.0"
            port = 6000
            password = "hunter2"

            [relay]
            log_file = "/var/log/relay.txt"

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.server.password, "hunter2");
        assert_eq!(config.relay.log_file, PathBuf::from("/var/log/relay.txt"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str("[server]\nport = 7000\n").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.password, "password");
    }

    #[test]
    fn test_cli_takes_precedence() {
        let toml_config: TomlConfig =
            toml::from_str("[server]\nport = 7000\npassword = \"from-file\"\n").unwrap();
        let args = CliArgs {
            port: Some(8000),
            log_level: "debug".to_string(),
            ..cli()
        };

        let config = Config::merge(args, toml_config);
        assert_eq!(config.port, 8000);
        assert_eq!(config.password, "from-file");
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_listen_addr() {
        let config = Config::merge(cli(), TomlConfig::default());
        let addr = config.listen_addr().unwrap();
        assert_eq!(addr, "127.0.0.1:55222".parse().unwrap());
    }

    #[test]
    fn test_missing_config_file() {
        let args = CliArgs {
            config: Some(PathBuf::from("/nonexistent/relay.toml")),
            ..cli()
        };
        assert!(matches!(
            Config::from_cli(args),
            Err(ConfigError::FileRead(_, _))
        ));
    }
}

//! Configuration module for kklib-rs tools
//!
//! Loads a TOML file describing which vendor library to load and how one
//! source is connected and set up.
//!
//! # Example
//! ```ignore
//! let config = Config::load("kk.toml")?;
//! let connection = config.source.connection.as_deref();
//! ```

use crate::kk::{Command, DebugLogType, DecimalSeparator, LibraryVersion, LogType, NszCount};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub debug: DebugConfig,
    #[serde(default)]
    pub tcp_server: TcpServerConfig,
    /// Present when reading LOG entries from a K+K TCP server
    #[serde(default)]
    pub tcp_log: Option<TcpLogConfig>,
    #[serde(default)]
    pub reader: ReaderSection,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot check by itself
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.library.min_version()?;
        self.source.decimal_separator()?;
        self.source.nsz()?;
        self.source.commands()?;
        if let Some(tcp_log) = &self.tcp_log {
            tcp_log.log_type()?;
            if tcp_log.address.is_empty() {
                return Err(ConfigError::invalid("tcp_log.address must not be empty"));
            }
        }
        if self.reader.poll_interval_ms == 0 {
            return Err(ConfigError::invalid("reader.poll_interval_ms must be > 0"));
        }
        Ok(())
    }
}

// =============================================================================
// Library
// =============================================================================

/// Which vendor library to load
#[derive(Debug, Clone, Deserialize)]
pub struct LibraryConfig {
    /// Library path; platform default file name if not set
    #[serde(default)]
    pub path: Option<String>,

    /// Oldest accepted library version
    #[serde(default = "default_min_version")]
    pub min_version: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            path: None,
            min_version: default_min_version(),
        }
    }
}

fn default_min_version() -> String {
    LibraryVersion::MINIMUM.to_string()
}

impl LibraryConfig {
    pub fn min_version(&self) -> Result<LibraryVersion, ConfigError> {
        self.min_version
            .parse()
            .map_err(|e| ConfigError::invalid(format!("library.min_version: {}", e)))
    }
}

// =============================================================================
// Source
// =============================================================================

/// Connection and report settings for one source
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Connection string (e.g. "COM3", "192.168.1.10:1234", a test data file)
    #[serde(default)]
    pub connection: Option<String>,

    #[serde(default)]
    pub blocking_io: bool,

    /// Directory for debug logs and test data files
    #[serde(default)]
    pub output_path: Option<String>,

    #[serde(default = "default_decimal_separator")]
    pub decimal_separator: char,

    #[serde(default = "default_nsz")]
    pub nsz: i32,

    /// Command queue limit, 0 = unlimited
    #[serde(default)]
    pub command_limit: u32,

    #[serde(default)]
    pub send_7016: bool,

    /// Commands sent after connecting, in `group:name` form
    #[serde(default)]
    pub commands: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            connection: None,
            blocking_io: false,
            output_path: None,
            decimal_separator: default_decimal_separator(),
            nsz: default_nsz(),
            command_limit: 0,
            send_7016: false,
            commands: Vec::new(),
        }
    }
}

fn default_decimal_separator() -> char {
    '.'
}

fn default_nsz() -> i32 {
    1
}

impl SourceConfig {
    pub fn decimal_separator(&self) -> Result<DecimalSeparator, ConfigError> {
        DecimalSeparator::from_char(self.decimal_separator)
            .map_err(|e| ConfigError::invalid(format!("source.decimal_separator: {}", e)))
    }

    pub fn nsz(&self) -> Result<NszCount, ConfigError> {
        NszCount::new(self.nsz).map_err(|e| ConfigError::invalid(format!("source.nsz: {}", e)))
    }

    pub fn commands(&self) -> Result<Vec<Command>, ConfigError> {
        self.commands
            .iter()
            .map(|c| {
                c.parse()
                    .map_err(|e| ConfigError::invalid(format!("source.commands: {}", e)))
            })
            .collect()
    }
}

// =============================================================================
// Debug log
// =============================================================================

/// Vendor library debug log settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DebugConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Becomes part of the debug log file name
    #[serde(default)]
    pub dbg_id: Option<String>,

    #[serde(default)]
    pub report_log: bool,

    #[serde(default)]
    pub low_level_log: bool,

    #[serde(default)]
    pub log_type: DebugLogType,

    /// Size limit in bytes; unused for `unlimited`
    #[serde(default)]
    pub log_size: u32,
}

// =============================================================================
// TCP
// =============================================================================

/// Local TCP server forwarding reports to K+K clients
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TcpServerConfig {
    #[serde(default)]
    pub enabled: bool,

    /// 0 lets the system assign a port
    #[serde(default)]
    pub port: u16,
}

/// TCP log client settings
#[derive(Debug, Clone, Deserialize)]
pub struct TcpLogConfig {
    /// Server address as `ip:port`
    pub address: String,

    #[serde(default = "default_tcp_log_type")]
    pub log_type: String,

    /// UTC time stamp format, e.g. "YYYYMMDD HH:NN:SS.ZZZ"
    #[serde(default)]
    pub time_format: Option<String>,
}

fn default_tcp_log_type() -> String {
    LogType::Freq.name().to_string()
}

impl TcpLogConfig {
    pub fn log_type(&self) -> Result<LogType, ConfigError> {
        self.log_type
            .parse()
            .map_err(|e| ConfigError::invalid(format!("tcp_log.log_type: {}", e)))
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Report pump settings
#[derive(Debug, Clone, Deserialize)]
pub struct ReaderSection {
    /// Sleep between polls when no report is available
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Output file; stdout if not set
    #[serde(default)]
    pub output: Option<String>,
}

impl Default for ReaderSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            output: None,
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    10
}

impl ReaderSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

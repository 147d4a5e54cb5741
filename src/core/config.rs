//! Configuration module for IIO context discovery
//!
//! Supports loading configuration from a TOML file.
//! Configuration is stored in a standard location:
//! - Windows: %APPDATA%\iio_discovery\config.toml
//! - Linux: ~/.config/iio_discovery/config.toml
//! - macOS: ~/Library/Application Support/iio_discovery/config.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application name used for config directory
const APP_NAME: &str = "iio_discovery";

/// Default config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Period between two scans when nothing else is configured
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 5000;

/// Transport scanned when nothing else is configured
pub const DEFAULT_BACKEND: &str = "usb";

/// Get the standard configuration directory for the application.
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

/// Get the standard configuration file path.
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Ensure the configuration directory exists.
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let config_dir = get_config_dir().ok_or(ConfigError::ConfigDirNotFound)?;

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .map_err(|e| ConfigError::WriteError(config_dir.clone(), e.to_string()))?;
    }

    Ok(config_dir)
}

/// Initialize the configuration file if it doesn't exist.
///
/// Returns the path to the config file.
pub fn init_config() -> Result<PathBuf, ConfigError> {
    let config_dir = ensure_config_dir()?;
    let config_path = config_dir.join(CONFIG_FILE_NAME);

    if !config_path.exists() {
        fs::write(&config_path, Config::generate_default_config())
            .map_err(|e| ConfigError::WriteError(config_path.clone(), e.to_string()))?;
    }

    Ok(config_path)
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scanner settings
    pub scanner: ScannerConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Periodic scanner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Period between the end of one scan and the start of the next (ms)
    pub interval_ms: u64,

    /// Transports to enumerate each cycle ("usb", "ip", "local")
    pub backends: Vec<String>,

    /// URI prefixes to keep (e.g. "usb:"). Empty keeps everything.
    pub uri_filters: Vec<String>,

    /// Fire the first scan right away instead of after one interval
    pub scan_on_start: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log to file
    pub log_to_file: bool,

    /// Log file path
    pub log_file: PathBuf,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_SCAN_INTERVAL_MS,
            backends: vec![DEFAULT_BACKEND.to_string()],
            uri_filters: Vec::new(),
            scan_on_start: true,
        }
    }
}

impl ScannerConfig {
    /// Scan period as a `Duration`
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Set the scan period
    pub fn with_interval(mut self, ms: u64) -> Self {
        self.interval_ms = ms;
        self
    }

    /// Replace the list of transports
    pub fn with_backends<I, S>(mut self, backends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.backends = backends.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the URI prefix allow-list
    pub fn with_uri_filters<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uri_filters = filters.into_iter().map(Into::into).collect();
        self
    }

    /// Set whether the first scan fires immediately
    pub fn scan_on_start(mut self, enabled: bool) -> Self {
        self.scan_on_start = enabled;
        self
    }

    /// Whether a URI passes the prefix allow-list
    pub fn accepts(&self, uri: &str) -> bool {
        self.uri_filters.is_empty() || self.uri_filters.iter().any(|p| uri.starts_with(p.as_str()))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: PathBuf::from("./iio_discovery.log"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./config.toml
    /// 2. ./iio_discovery.toml
    /// 3. Standard config location
    ///
    /// If no config file is found, returns default configuration.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::get_active_config_path();
        if path.exists() {
            return Self::load(&path);
        }

        Ok(Self::default())
    }

    /// Path of the config file `load_default` reads, or the standard
    /// location when none exists yet
    pub fn get_active_config_path() -> PathBuf {
        let local_paths = [
            PathBuf::from("./config.toml"),
            PathBuf::from("./iio_discovery.toml"),
        ];

        for path in &local_paths {
            if path.exists() {
                return path.clone();
            }
        }

        get_config_path().unwrap_or_else(|| PathBuf::from("./config.toml"))
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path.as_ref(), content)
            .map_err(|e| ConfigError::WriteError(path.as_ref().to_path_buf(), e.to_string()))?;

        Ok(())
    }

    /// Generate a default config file with comments
    pub fn generate_default_config() -> String {
        include_str!("../../config.example.toml").to_string()
    }

    /// Reject values the scanner cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scanner.interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "scanner.interval_ms".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        if self.scanner.backends.is_empty() {
            return Err(ConfigError::InvalidValue(
                "scanner.backends".to_string(),
                "at least one transport is required".to_string(),
            ));
        }
        if self.scanner.backends.iter().any(|b| b.trim().is_empty()) {
            return Err(ConfigError::InvalidValue(
                "scanner.backends".to_string(),
                "transport names cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration file was not found at the specified path
    FileNotFound(PathBuf),
    /// Failed to read the configuration file
    ReadError(PathBuf, String),
    /// Failed to parse the configuration file (invalid TOML)
    ParseError(PathBuf, String),
    /// Failed to serialize configuration to TOML
    SerializeError(String),
    /// Failed to write configuration file
    WriteError(PathBuf, String),
    /// Could not determine config directory
    ConfigDirNotFound,
    /// A setting holds a value that cannot be used
    InvalidValue(String, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ReadError(path, err) => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::ParseError(path, err) => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::SerializeError(err) => {
                write!(f, "Failed to serialize configuration: {}", err)
            }
            ConfigError::WriteError(path, err) => {
                write!(
                    f,
                    "Failed to write config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::ConfigDirNotFound => {
                write!(f, "Could not determine configuration directory")
            }
            ConfigError::InvalidValue(key, reason) => {
                write!(f, "Invalid value for '{}': {}", key, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scanner_config_defaults() {
        let config = ScannerConfig::default();
        assert_eq!(config.interval_ms, 5000);
        assert_eq!(config.interval(), Duration::from_secs(5));
        assert_eq!(config.backends, vec!["usb".to_string()]);
        assert!(config.uri_filters.is_empty());
        assert!(config.scan_on_start);
    }

    #[test]
    fn test_scanner_config_builder() {
        let config = ScannerConfig::default()
            .with_interval(250)
            .with_backends(["usb", "ip"])
            .with_uri_filters(["usb:"])
            .scan_on_start(false);

        assert_eq!(config.interval_ms, 250);
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.uri_filters, vec!["usb:".to_string()]);
        assert!(!config.scan_on_start);
    }

    #[test]
    fn test_uri_filter_accepts() {
        let open = ScannerConfig::default();
        assert!(open.accepts("ip:192.168.2.1"));

        let usb_only = ScannerConfig::default().with_uri_filters(["usb:"]);
        assert!(usb_only.accepts("usb:3.14.5"));
        assert!(!usb_only.accepts("ip:192.168.2.1"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.scanner = config.scanner.with_interval(1200).with_backends(["ip"]);
        config.logging.level = "debug".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[scanner]\ninterval_ms = 800\n").unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.scanner.interval_ms, 800);
        assert_eq!(loaded.scanner.backends, vec!["usb".to_string()]);
        assert_eq!(loaded.logging.level, "info");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/definitely/not/here/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[scanner\ninterval_ms = ").unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::ParseError(_, _))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.scanner.interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(_, _))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_backends() {
        let mut config = Config::default();
        config.scanner.backends.clear();
        assert!(config.validate().is_err());

        config.scanner.backends = vec!["  ".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_template_parses() {
        let parsed: Config = toml::from_str(&Config::generate_default_config()).unwrap();
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed.scanner, ScannerConfig::default());
    }
}

//! TOML-based configuration for the listener binary.
//!
//! Reads `AppConfig` from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\WingIO\config.toml`
//! - Linux:    `~/.config/wingio/config.toml`
//! - macOS:    `~/Library/Application Support/WingIO/config.toml`
//!
//! Example:
//!
//! ```toml
//! [listener]
//! port = 3330
//! bind_address = "0.0.0.0"
//! liveness_timeout_ms = 5000
//!
//! [events]
//! queue_capacity = 1024
//! overflow = "drop_newest"
//!
//! [logging]
//! log_level = "info"
//! ```
//!
//! # Serde default values
//!
//! Every field carries a `#[serde(default = "some_fn")]`, so an empty file,
//! a missing section, or an older file without newer keys all load cleanly.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wing_core::protocol::packets::DEFAULT_WING_PORT;

use crate::application::service::ServiceConfig;
use crate::infrastructure::sink::{OverflowPolicy, DEFAULT_QUEUE_CAPACITY};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `bind_address` is not an IP address.
    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Socket and timing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListenerConfig {
    /// UDP port the Wings transmit to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// IP address to bind to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Silence after which a Wing is reported offline.
    #[serde(default = "default_liveness_timeout_ms")]
    pub liveness_timeout_ms: u64,
    /// How often the receive thread checks for expired Wings.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Socket read timeout; bounds how long `stop` takes.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Overflow behaviour of the event queue.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverflowMode {
    #[default]
    DropNewest,
    Unbounded,
}

/// Event queue settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventsConfig {
    /// Capacity of the queue in front of the host sink (`drop_newest` only).
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub overflow: OverflowMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_port() -> u16 {
    DEFAULT_WING_PORT
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_liveness_timeout_ms() -> u64 {
    5000
}
fn default_sweep_interval_ms() -> u64 {
    500
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            liveness_timeout_ms: default_liveness_timeout_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            overflow: OverflowMode::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Converts the file representation into the runtime [`ServiceConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] if `bind_address` does not
    /// parse as an IP address.
    pub fn service_config(&self) -> Result<ServiceConfig, ConfigError> {
        let ip: IpAddr = self
            .listener
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.listener.bind_address.clone()))?;

        let overflow = match self.events.overflow {
            OverflowMode::DropNewest => OverflowPolicy::DropNewest {
                capacity: self.events.queue_capacity,
            },
            OverflowMode::Unbounded => OverflowPolicy::Unbounded,
        };

        Ok(ServiceConfig {
            bind_address: SocketAddr::new(ip, self.listener.port),
            liveness_timeout: Duration::from_millis(self.listener.liveness_timeout_ms),
            sweep_interval: Duration::from_millis(self.listener.sweep_interval_ms),
            poll_interval: Duration::from_millis(self.listener.poll_interval_ms),
            overflow,
        })
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from the platform config file, returning the defaults
/// if the file does not yet exist.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `AppConfig` from `path`, returning the defaults if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Resolves the platform config directory, including the `wingio` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("WingIO"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("wingio"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("WingIO")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("wing_test_{}", Uuid::new_v4()))
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_app_config_default_listens_on_wing_port() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.listener.port, 3330);
        assert_eq!(cfg.listener.bind_address, "0.0.0.0");
        assert_eq!(cfg.listener.liveness_timeout_ms, 5000);
    }

    #[test]
    fn test_events_config_default_is_bounded() {
        let cfg = EventsConfig::default();
        assert_eq!(cfg.overflow, OverflowMode::DropNewest);
        assert_eq!(cfg.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_logging_config_default_level_is_info() {
        assert_eq!(LoggingConfig::default().log_level, "info");
    }

    // ── TOML ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_listener_section_overrides_defaults() {
        // Arrange
        let toml_str = r#"
[listener]
port = 6454
liveness_timeout_ms = 2000
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.listener.port, 6454);
        assert_eq!(cfg.listener.liveness_timeout_ms, 2000);
        // Unspecified fields keep their defaults
        assert_eq!(cfg.listener.sweep_interval_ms, 500);
        assert_eq!(cfg.events, EventsConfig::default());
    }

    #[test]
    fn test_overflow_mode_parses_snake_case() {
        let cfg: AppConfig =
            toml::from_str("[events]\noverflow = \"unbounded\"\n").expect("deserialize");
        assert_eq!(cfg.events.overflow, OverflowMode::Unbounded);
    }

    #[test]
    fn test_unknown_overflow_mode_is_a_parse_error() {
        let result: Result<AppConfig, toml::de::Error> =
            toml::from_str("[events]\noverflow = \"block\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_app_config_round_trips_through_toml() {
        // Arrange
        let mut cfg = AppConfig::default();
        cfg.listener.port = 4000;
        cfg.events.overflow = OverflowMode::Unbounded;
        cfg.logging.log_level = "debug".to_string();

        // Act
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: AppConfig = toml::from_str(&toml_str).expect("deserialize");

        // Assert
        assert_eq!(cfg, restored);
    }

    // ── service_config ────────────────────────────────────────────────────────

    #[test]
    fn test_service_config_converts_units_and_policy() {
        // Arrange
        let mut cfg = AppConfig::default();
        cfg.listener.bind_address = "127.0.0.1".to_string();
        cfg.listener.port = 4444;
        cfg.listener.sweep_interval_ms = 250;
        cfg.events.queue_capacity = 16;

        // Act
        let service = cfg.service_config().expect("valid config");

        // Assert
        assert_eq!(service.bind_address, "127.0.0.1:4444".parse().unwrap());
        assert_eq!(service.liveness_timeout, Duration::from_secs(5));
        assert_eq!(service.sweep_interval, Duration::from_millis(250));
        assert_eq!(service.poll_interval, Duration::from_millis(100));
        assert_eq!(service.overflow, OverflowPolicy::DropNewest { capacity: 16 });
    }

    #[test]
    fn test_service_config_unbounded_ignores_capacity() {
        let mut cfg = AppConfig::default();
        cfg.events.overflow = OverflowMode::Unbounded;
        cfg.events.queue_capacity = 1;

        let service = cfg.service_config().expect("valid config");

        assert_eq!(service.overflow, OverflowPolicy::Unbounded);
    }

    #[test]
    fn test_service_config_rejects_bad_bind_address() {
        let mut cfg = AppConfig::default();
        cfg.listener.bind_address = "wing.local".to_string();

        let err = cfg.service_config().expect_err("hostname is not an IP");

        assert!(matches!(err, ConfigError::InvalidBindAddress(ref a) if a == "wing.local"));
    }

    #[test]
    fn test_default_service_config_matches_default_file() {
        let from_file = AppConfig::default().service_config().expect("valid");
        assert_eq!(from_file, ServiceConfig::default());
    }

    // ── Files ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_load_config_from_missing_file_returns_default() {
        let path = temp_dir().join("config.toml");
        let cfg = load_config_from(&path).expect("missing file is not an error");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_load_config_from_reads_written_file() {
        // Arrange
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.listener.port = 12345;
        cfg.logging.log_level = "trace".to_string();
        std::fs::write(&path, toml::to_string_pretty(&cfg).unwrap()).unwrap();

        // Act
        let loaded = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_config_from_malformed_file_returns_parse_error() {
        // Arrange
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        // Act
        let result = load_config_from(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_wingio_config_toml() {
        // NoPlatformConfigDir is acceptable in a stripped CI environment.
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("config.toml"), "got {path:?}");
            let parent = path.parent().and_then(Path::file_name);
            assert!(
                matches!(parent.and_then(|n| n.to_str()), Some("wingio" | "WingIO")),
                "got {path:?}"
            );
        }
    }
}

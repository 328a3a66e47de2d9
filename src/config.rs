/// Fleet configuration
///
/// Loaded from a TOML file (explicit path, or the per-user config directory)
/// with `FLEET_MEDIC__*` environment overrides, e.g.
/// `FLEET_MEDIC__TIMEOUTS__BRIDGE_CALL_MS=5000`.
use crate::Device;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_PREFIX: &str = "FLEET_MEDIC";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("device #{index} has an empty id")]
    EmptyDeviceId { index: usize },

    #[error("device id '{0}' is configured more than once")]
    DuplicateDevice(String),

    #[error("bridge call timeout must be greater than zero")]
    ZeroTimeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per bridge call, enforced by killing the child process
    pub bridge_call_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            bridge_call_ms: 8000,
        }
    }
}

/// Fixed waits after disruptive ladder steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    pub daemon_restart_secs: u64,
    pub reboot_secs: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            daemon_restart_secs: 3,
            reboot_secs: 60,
        }
    }
}

impl SettleConfig {
    pub fn daemon_restart(&self) -> Duration {
        Duration::from_secs(self.daemon_restart_secs)
    }

    pub fn reboot(&self) -> Duration {
        Duration::from_secs(self.reboot_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Control tool executable
    pub bridge_program: PathBuf,

    /// Root under which each job run gets its own directory
    pub runs_dir: PathBuf,

    pub devices: Vec<Device>,

    pub timeouts: TimeoutConfig,

    pub settle: SettleConfig,

    /// Upper bound on one device's ladder, settle waits included.
    /// `None` leaves the ladder bounded only by its own steps.
    pub recovery_deadline_secs: Option<u64>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            bridge_program: PathBuf::from("adb"),
            runs_dir: PathBuf::from("runs"),
            devices: Vec::new(),
            timeouts: TimeoutConfig::default(),
            settle: SettleConfig::default(),
            recovery_deadline_secs: None,
        }
    }
}

impl FleetConfig {
    /// Load from `path`, or from the default location when `path` is `None`.
    ///
    /// An explicit path must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(::config::File::from(path).required(true));
            }
            None => {
                if let Some(default_path) = default_config_path() {
                    tracing::debug!(path = %default_path.display(), "Using default config location");
                    builder = builder
                        .add_source(::config::File::from(default_path.as_path()).required(false));
                }
            }
        }

        let config: FleetConfig = builder
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;

        config.validated()
    }

    /// Parse a TOML document (no environment overrides)
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: FleetConfig = ::config::Config::builder()
            .add_source(::config::File::from_str(
                source,
                ::config::FileFormat::Toml,
            ))
            .build()?
            .try_deserialize()?;

        config.validated()
    }

    /// Check invariants and fill in missing device names
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.timeouts.bridge_call_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let mut seen = HashSet::new();
        for (index, device) in self.devices.iter_mut().enumerate() {
            device.id = device.id.trim().to_string();
            if device.id.is_empty() {
                return Err(ConfigError::EmptyDeviceId { index });
            }
            if !seen.insert(device.id.clone()) {
                return Err(ConfigError::DuplicateDevice(device.id.clone()));
            }
            if device.name.trim().is_empty() {
                device.name = device.id.clone();
            }
        }

        Ok(self)
    }

    pub fn bridge_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.bridge_call_ms)
    }

    pub fn recovery_deadline(&self) -> Option<Duration> {
        self.recovery_deadline_secs.map(Duration::from_secs)
    }
}

/// `<user config dir>/fleet-medic/config.toml`, if the platform has one
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "fleet-medic")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
bridge_program = "/opt/platform-tools/adb"
recovery_deadline_secs = 300

[timeouts]
bridge_call_ms = 5000

[settle]
reboot_secs = 90

[[devices]]
id = "R58M123ABC"
name = "Galaxy S21"

[[devices]]
id = "192.168.1.20:5555"
"#;

    #[test]
    fn test_defaults() {
        let config = FleetConfig::default();
        assert_eq!(config.bridge_program, PathBuf::from("adb"));
        assert_eq!(config.bridge_timeout(), Duration::from_secs(8));
        assert_eq!(config.settle.daemon_restart(), Duration::from_secs(3));
        assert_eq!(config.settle.reboot(), Duration::from_secs(60));
        assert_eq!(config.recovery_deadline(), None);
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_parse_toml() {
        let config = FleetConfig::from_toml(SAMPLE).unwrap();

        assert_eq!(config.bridge_program, PathBuf::from("/opt/platform-tools/adb"));
        assert_eq!(config.bridge_timeout(), Duration::from_millis(5000));
        assert_eq!(config.settle.reboot(), Duration::from_secs(90));
        // Unset keys keep their defaults
        assert_eq!(config.settle.daemon_restart(), Duration::from_secs(3));
        assert_eq!(config.recovery_deadline(), Some(Duration::from_secs(300)));

        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[0].name, "Galaxy S21");
        // Missing names fall back to the id
        assert_eq!(config.devices[1].name, "192.168.1.20:5555");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = FleetConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.devices.len(), 2);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let result = FleetConfig::load(Some(Path::new("/nonexistent/fleet.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_duplicate_device_rejected() {
        let source = r#"
[[devices]]
id = "a"
[[devices]]
id = "a"
"#;
        let err = FleetConfig::from_toml(source).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateDevice(id) if id == "a"));
    }

    #[test]
    fn test_empty_device_id_rejected() {
        let source = r#"
[[devices]]
id = "  "
name = "ghost"
"#;
        let err = FleetConfig::from_toml(source).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyDeviceId { index: 0 }));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = FleetConfig::from_toml("[timeouts]\nbridge_call_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTimeout));
    }
}

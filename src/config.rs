//! Configuration for the wardlink controller.

use crate::window::impute::{default_ranges, SensorRange};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Declared patient population; heartbeats sweep `[0, num_patients)`
    /// and readings outside it are dropped.
    pub num_patients: u32,

    /// Interval between heartbeat sweeps
    #[serde(with = "duration_serde")]
    pub heartbeat_interval: Duration,

    /// Window age at which a heartbeat tick forces finalization
    #[serde(with = "duration_serde")]
    pub window_timeout: Duration,

    /// Whether heartbeat sentinels refresh a window's last-update time
    pub heartbeat_extends_staleness: bool,

    /// UDP address receiving punted sensor frames
    pub listen_addr: SocketAddr,

    /// UDP address of the switch packet-out relay
    pub switch_addr: SocketAddr,

    /// UDP address receiving alert frames (watch mode)
    pub alert_listen_addr: SocketAddr,

    /// Fixed imputation seed; omit for entropy seeding
    pub imputation_seed: Option<u64>,

    /// Per-sensor plausible ranges, in slot order
    pub imputation_ranges: Vec<SensorRange>,

    /// Path for stats and alert logs
    pub data_path: PathBuf,

    /// Path of the imputation audit CSV
    pub log_path: PathBuf,

    /// Path of the alerts CSV written by watch mode
    pub alerts_log_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wardlink-controller");

        Self {
            num_patients: 2000,
            heartbeat_interval: Duration::from_secs(15),
            window_timeout: Duration::from_secs(60),
            heartbeat_extends_staleness: false,
            listen_addr: "0.0.0.0:7431".parse().expect("static addr"),
            switch_addr: "127.0.0.1:7432".parse().expect("static addr"),
            alert_listen_addr: "0.0.0.0:7433".parse().expect("static addr"),
            imputation_seed: None,
            imputation_ranges: default_ranges(),
            log_path: data_dir.join("logs").join("imputation_log.csv"),
            alerts_log_path: data_dir.join("logs").join("alerts_log.csv"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wardlink-controller")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        for path in [&self.log_path, &self.alerts_log_path] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Path of the persisted session stats.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("stats.json")
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.num_patients, 2000);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(15));
        assert_eq!(config.window_timeout, Duration::from_secs(60));
        assert!(!config.heartbeat_extends_staleness);
        assert_eq!(config.imputation_ranges.len(), crate::NUM_SENSORS);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.window_timeout, config.window_timeout);
        assert_eq!(parsed.listen_addr, config.listen_addr);
        assert_eq!(parsed.imputation_ranges, config.imputation_ranges);
    }
}

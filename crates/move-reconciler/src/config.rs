//! Board configuration loaded from `chessboard.toml`.
//!
//! Every field has a default, so a missing file or a partial one is fine:
//!
//! ```toml
//! [clock]
//! initial_secs = 300
//! increment_secs = 3
//!
//! [opponent]
//! kind = "engine"
//! color = "black"
//!
//! [engine]
//! host = "192.168.1.20"
//! skill_level = 5
//! ```

use chess_core::Color;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// A value is out of range. Hardware misconfiguration is fatal at startup.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct BoardConfig {
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub opponent: OpponentConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
}

/// Time control. Defaults to 15 minutes, no increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClockConfig {
    #[serde(default = "default_initial_secs")]
    pub initial_secs: u64,
    #[serde(default)]
    pub increment_secs: u64,
}

fn default_initial_secs() -> u64 {
    900
}

impl Default for ClockConfig {
    fn default() -> Self {
        ClockConfig {
            initial_secs: default_initial_secs(),
            increment_secs: 0,
        }
    }
}

impl ClockConfig {
    pub fn initial(&self) -> Duration {
        Duration::from_secs(self.initial_secs)
    }

    pub fn increment(&self) -> Duration {
        Duration::from_secs(self.increment_secs)
    }
}

/// Who sits across the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OpponentConfig {
    /// Two people at the board.
    #[default]
    Human,
    /// The remote engine plays `color`; its moves are made by hand.
    Engine { color: Color },
}

impl OpponentConfig {
    pub fn engine_color(&self) -> Option<Color> {
        match self {
            OpponentConfig::Human => None,
            OpponentConfig::Engine { color } => Some(*color),
        }
    }
}

/// Where the remote engine listens and how hard it plays.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_skill_level")]
    pub skill_level: u32,
    #[serde(default = "default_depth")]
    pub depth: u32,
    #[serde(default = "default_movetime_ms")]
    pub movetime_ms: u64,
    /// How long one poll waits for engine output.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    9999
}

fn default_skill_level() -> u32 {
    1
}

fn default_depth() -> u32 {
    1
}

fn default_movetime_ms() -> u64 {
    1000
}

fn default_poll_timeout_ms() -> u64 {
    200
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            host: default_host(),
            port: default_port(),
            skill_level: default_skill_level(),
            depth: default_depth(),
            movetime_ms: default_movetime_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl EngineConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct SensorConfig {
    /// Pause between passes of the reconciliation loop.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl SensorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl BoardConfig {
    pub const FILE_NAME: &'static str = "chessboard.toml";

    /// Loads and validates `path`, or returns the defaults if it does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file exists but cannot be
    /// read, [`ConfigError::ParseError`] for invalid TOML and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BoardConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock.initial_secs == 0 {
            return Err(ConfigError::Invalid("clock.initial_secs must be positive".into()));
        }
        if self.engine.skill_level > 20 {
            return Err(ConfigError::Invalid(format!(
                "engine.skill_level {} is above 20",
                self.engine.skill_level
            )));
        }
        if self.engine.depth == 0 {
            return Err(ConfigError::Invalid("engine.depth must be at least 1".into()));
        }
        if self.engine.poll_timeout_ms == 0 || self.sensor.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll intervals must be at least 1 ms".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_file_gives_defaults() {
        let config = BoardConfig::from_toml_str("").unwrap();
        assert_eq!(config, BoardConfig::default());
        assert_eq!(config.clock.initial(), Duration::from_secs(900));
        assert_eq!(config.clock.increment(), Duration::ZERO);
        assert_eq!(config.opponent, OpponentConfig::Human);
        assert_eq!(config.engine.host, "localhost");
        assert_eq!(config.engine.port, 9999);
        assert_eq!(config.engine.skill_level, 1);
        assert_eq!(config.engine.depth, 1);
        assert_eq!(config.engine.movetime_ms, 1000);
        assert_eq!(config.engine.poll_timeout(), Duration::from_millis(200));
        assert_eq!(config.sensor.poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn partial_sections() {
        let config = BoardConfig::from_toml_str(
            r#"
[clock]
initial_secs = 300
increment_secs = 3

[opponent]
kind = "engine"
color = "black"

[engine]
host = "192.168.1.20"
skill_level = 5
"#,
        )
        .unwrap();

        assert_eq!(config.clock.initial(), Duration::from_secs(300));
        assert_eq!(config.clock.increment(), Duration::from_secs(3));
        assert_eq!(config.opponent.engine_color(), Some(Color::Black));
        assert_eq!(config.engine.host, "192.168.1.20");
        assert_eq!(config.engine.skill_level, 5);
        assert_eq!(config.engine.port, 9999);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = BoardConfig::from_toml_str("[clock]\ninitial_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = BoardConfig::from_toml_str("[engine]\nskill_level = 99\n").unwrap_err();
        assert!(err.to_string().contains("skill_level"));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = BoardConfig::from_toml_str("[clock\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[sensor]\npoll_interval_ms = 25").unwrap();

        let config = BoardConfig::load(file.path()).unwrap();
        assert_eq!(config.sensor.poll_interval(), Duration::from_millis(25));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BoardConfig::load(&dir.path().join(BoardConfig::FILE_NAME)).unwrap();
        assert_eq!(config, BoardConfig::default());
    }
}

//! Bridge configuration.
//!
//! Defaults mirror the constants the sensor firmware was flashed with:
//! 9600 baud, a 1 second read timeout, and a 10 second alert cooldown.
//! Values can be overridden by an optional TOML file and, on top of that,
//! by command-line flags.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Alert line emitted by the firmware.
pub const DEFAULT_ALERT_TOKEN: &str = "ALERT: FIRE AT PARKING!";

/// Notification text forwarded to the chat.
pub const DEFAULT_ALERT_MESSAGE: &str = "⚠️ Fire at parking slot!";

/// Top-level configuration for the bridge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SentinelConfig {
    pub serial: SerialSection,
    pub alert: AlertSection,
    pub telegram: TelegramSection,
}

/// Serial link settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerialSection {
    /// Serial port path (e.g., /dev/ttyUSB0, /dev/ttyACM0, COM3)
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    pub timeout_ms: u64,
    /// Idle delay between polls when no bytes are waiting, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            port: String::from("/dev/ttyUSB0"),
            baud_rate: 9_600,
            timeout_ms: 1_000,
            poll_interval_ms: 100,
        }
    }
}

impl SerialSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Alert matching and cooldown settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertSection {
    /// Exact line (after trimming) that signals an alert
    pub token: String,
    /// Minimum number of seconds between two dispatched notifications
    pub cooldown_secs: u64,
    /// Notification text forwarded on dispatch
    pub message: String,
}

impl Default for AlertSection {
    fn default() -> Self {
        Self {
            token: DEFAULT_ALERT_TOKEN.to_string(),
            cooldown_secs: 10,
            message: DEFAULT_ALERT_MESSAGE.to_string(),
        }
    }
}

impl AlertSection {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Telegram endpoint settings. Credentials stay in the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelegramSection {
    /// Bot API base URL
    pub api_base: String,
}

impl Default for TelegramSection {
    fn default() -> Self {
        Self {
            api_base: String::from(crate::notify::DEFAULT_API_BASE),
        }
    }
}

impl SentinelConfig {
    /// Load configuration from a TOML file.
    ///
    /// Keys omitted from the file fall back to the built-in defaults;
    /// unknown keys are rejected.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

/// Render a commented sample configuration with the built-in defaults.
pub fn sample_toml() -> Result<String> {
    let rendered = toml::to_string_pretty(&SentinelConfig::default())
        .with_context(|| "Failed to render sample configuration")?;

    Ok(format!(
        "# serial-sentinel configuration\n\
         #\n\
         # Every key is optional; values omitted here fall back to the\n\
         # built-in defaults shown below. BOT_TOKEN and CHAT_ID are read\n\
         # from the environment, never from this file.\n\n{rendered}"
    ))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn defaults_match_firmware_constants() {
        let config = SentinelConfig::default();

        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 9_600);
        assert_eq!(config.serial.timeout(), Duration::from_secs(1));
        assert_eq!(config.serial.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.alert.token, "ALERT: FIRE AT PARKING!");
        assert_eq!(config.alert.cooldown(), Duration::from_secs(10));
        assert_eq!(config.alert.message, "⚠️ Fire at parking slot!");
        assert_eq!(config.telegram.api_base, "https://api.telegram.org");
    }

    #[test]
    fn partial_file_keeps_defaults_for_omitted_keys() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[serial]\nport = \"/dev/ttyACM0\"\nbaud_rate = 115200").unwrap();

        let config = SentinelConfig::load(file.path()).unwrap();

        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 115_200);
        // Untouched sections keep their defaults.
        assert_eq!(config.serial.timeout_ms, 1_000);
        assert_eq!(config.alert, AlertSection::default());
        assert_eq!(config.telegram, TelegramSection::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[alert]\ncooldown = 30").unwrap();

        let err = SentinelConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = SentinelConfig::load(Path::new("/nonexistent/sentinel.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn sample_parses_back_to_defaults() {
        let sample = sample_toml().unwrap();
        let parsed: SentinelConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed, SentinelConfig::default());
    }
}

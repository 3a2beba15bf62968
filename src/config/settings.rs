use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::validator::SettingsValidator;
use crate::error::{HarnessError, Result};

/// Names the JSON settings file, overriding the platform config directory
pub const SETTINGS_ENV_VAR: &str = "RAWHTTP_HARNESS_CONFIG";
/// Overrides the fixture server port
pub const PORT_ENV_VAR: &str = "RAWHTTP_HARNESS_PORT";

const SETTINGS_FILE_NAME: &str = "harness.json";

/// Timeouts, retry budget and fixture address used by the harness
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessSettings {
    pub fixture_host: String,
    pub fixture_port: u16,
    /// How long a process may take to exit before it is killed
    pub exit_timeout: Duration,
    /// Sleep before a stop signal so the process can flush its output
    pub stop_grace: Duration,
    pub connect_retry_interval: Duration,
    pub connect_attempts: u32,
    /// Bound on reading or writing one HTTP message on a socket
    pub io_timeout: Duration,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            fixture_host: "127.0.0.1".to_string(),
            fixture_port: 8083,
            exit_timeout: Duration::from_secs(2),
            stop_grace: Duration::from_millis(250),
            connect_retry_interval: Duration::from_millis(150),
            connect_attempts: 10,
            io_timeout: Duration::from_secs(2),
        }
    }
}

/// On-disk form of [`HarnessSettings`]; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixture_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixture_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_grace_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_retry_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_timeout_ms: Option<u64>,
}

impl HarnessSettings {
    /// Defaults, then the settings file if any, then environment overrides.
    pub fn load() -> Result<Self> {
        let mut settings = Self::default();

        match env::var_os(SETTINGS_ENV_VAR) {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.is_file() {
                    return Err(HarnessError::invalid_settings(
                        SETTINGS_ENV_VAR,
                        format!("settings file does not exist: {}", path.display()),
                    ));
                }
                settings.apply_file(&path)?;
            }
            None => {
                if let Some(path) = Self::default_settings_path().filter(|p| p.is_file()) {
                    settings.apply_file(&path)?;
                }
            }
        }

        settings.apply_env(|key| env::var(key).ok())?;
        settings.validate()?;

        tracing::debug!(settings = ?settings, "Loaded harness settings");
        Ok(settings)
    }

    /// Defaults overlaid with the given JSON document, validated.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut settings = Self::default();
        let file: SettingsFile = serde_json::from_str(json)
            .map_err(|e| HarnessError::invalid_settings("settings file", e.to_string()))?;
        settings.apply(file);
        settings.validate()?;
        Ok(settings)
    }

    /// Platform config directory location of the settings file.
    pub fn default_settings_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "rawhttp", "rawhttp-harness")
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE_NAME))
    }

    pub fn validate(&self) -> Result<()> {
        SettingsValidator::validate(self).map_err(|errors| {
            let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
            let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
            HarnessError::invalid_settings(fields.join(", "), messages.join("; "))
        })
    }

    /// `host:port` of the fixture server
    pub fn fixture_address(&self) -> String {
        format!("{}:{}", self.fixture_host, self.fixture_port)
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path).map_err(|e| {
            HarnessError::io_error(format!("reading settings file {}", path.display()), e)
        })?;
        let file: SettingsFile = serde_json::from_str(&content).map_err(|e| {
            HarnessError::invalid_settings(path.display().to_string(), e.to_string())
        })?;
        self.apply(file);
        Ok(())
    }

    fn apply(&mut self, file: SettingsFile) {
        if let Some(host) = file.fixture_host {
            self.fixture_host = host;
        }
        if let Some(port) = file.fixture_port {
            self.fixture_port = port;
        }
        if let Some(ms) = file.exit_timeout_ms {
            self.exit_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.stop_grace_ms {
            self.stop_grace = Duration::from_millis(ms);
        }
        if let Some(ms) = file.connect_retry_interval_ms {
            self.connect_retry_interval = Duration::from_millis(ms);
        }
        if let Some(attempts) = file.connect_attempts {
            self.connect_attempts = attempts;
        }
        if let Some(ms) = file.io_timeout_ms {
            self.io_timeout = Duration::from_millis(ms);
        }
    }

    pub(crate) fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(PORT_ENV_VAR) {
            self.fixture_port = port.trim().parse().map_err(|_| {
                HarnessError::invalid_settings(PORT_ENV_VAR, format!("not a port number: {port}"))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_the_harness_constants() {
        let settings = HarnessSettings::default();
        assert_eq!(settings.fixture_port, 8083);
        assert_eq!(settings.exit_timeout, Duration::from_secs(2));
        assert_eq!(settings.stop_grace, Duration::from_millis(250));
        assert_eq!(settings.connect_retry_interval, Duration::from_millis(150));
        assert_eq!(settings.connect_attempts, 10);
        assert!(settings.validate().is_ok());
        assert_eq!(settings.fixture_address(), "127.0.0.1:8083");
    }

    #[test]
    fn test_json_overrides_only_given_fields() {
        let settings =
            HarnessSettings::from_json_str(r#"{"fixture_port": 9090, "connect_attempts": 3}"#)
                .unwrap();
        assert_eq!(settings.fixture_port, 9090);
        assert_eq!(settings.connect_attempts, 3);
        assert_eq!(settings.exit_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = HarnessSettings::from_json_str(r#"{"fixture_prot": 9090}"#).unwrap_err();
        assert!(err.is_setup_error());
    }

    #[test]
    fn test_env_port_override() {
        let mut settings = HarnessSettings::default();
        settings
            .apply_env(|key| (key == PORT_ENV_VAR).then(|| "18083".to_string()))
            .unwrap();
        assert_eq!(settings.fixture_port, 18083);

        let err = settings
            .apply_env(|key| (key == PORT_ENV_VAR).then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(PORT_ENV_VAR));
    }

    #[test]
    fn test_settings_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.json");
        fs::write(&path, r#"{"exit_timeout_ms": 5000, "stop_grace_ms": 100}"#).unwrap();

        let mut settings = HarnessSettings::default();
        settings.apply_file(&path).unwrap();
        assert_eq!(settings.exit_timeout, Duration::from_secs(5));
        assert_eq!(settings.stop_grace, Duration::from_millis(100));
    }
}

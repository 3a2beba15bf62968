use std::time::Duration;

use super::settings::HarnessSettings;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

pub struct SettingsValidator;

impl SettingsValidator {
    /// Validate harness settings, collecting every problem found
    pub fn validate(settings: &HarnessSettings) -> ValidationResult {
        let mut errors = Vec::new();

        if settings.fixture_host.trim().is_empty() {
            errors.push(ValidationError {
                field: "fixture_host".to_string(),
                message: "Fixture host cannot be empty".to_string(),
            });
        }

        for (field, value) in [
            ("exit_timeout_ms", settings.exit_timeout),
            ("connect_retry_interval_ms", settings.connect_retry_interval),
            ("io_timeout_ms", settings.io_timeout),
        ] {
            if value == Duration::ZERO {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message: "Timeouts must be greater than zero".to_string(),
                });
            }
        }

        if settings.connect_attempts == 0 {
            errors.push(ValidationError {
                field: "connect_attempts".to_string(),
                message: "At least one connection attempt is required".to_string(),
            });
        }

        // the grace sleep must leave room for the process to exit afterwards
        if settings.stop_grace >= settings.exit_timeout {
            errors.push(ValidationError {
                field: "stop_grace_ms".to_string(),
                message: format!(
                    "Stop grace period ({} ms) must be shorter than the exit timeout ({} ms)",
                    settings.stop_grace.as_millis(),
                    settings.exit_timeout.as_millis()
                ),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

pub mod locator;
pub mod settings;
pub mod validator;

pub use locator::{CliExecutable, ExecutableLocator, CLI_ENV_VAR};
pub use settings::{HarnessSettings, SettingsFile};
pub use validator::{SettingsValidator, ValidationError, ValidationResult};

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub mod builder;

pub use builder::ErrorBuilder;

#[derive(Debug)]
pub enum HarnessError {
    ExecutableNotConfigured {
        variable: String,
        searched: Vec<PathBuf>,
    },
    ExecutableNotFound {
        path: PathBuf,
    },
    NotExecutable {
        path: PathBuf,
    },
    InvalidSettings {
        field: String,
        message: String,
    },
    SpawnFailed {
        command: String,
        source: std::io::Error,
    },
    ProcessTimeout {
        process: String,
        timeout: Duration,
        stdout: String,
        stderr: String,
    },
    CaptureFailed {
        stream: &'static str,
        message: String,
        stdout: String,
        stderr: String,
    },
    ConnectRetriesExhausted {
        address: String,
        attempts: u32,
        last_error: Option<String>,
    },
    MalformedMessage {
        reason: String,
    },
    IoError {
        operation: String,
        source: std::io::Error,
    },
    Other(anyhow::Error),
}

impl HarnessError {
    pub fn executable_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ExecutableNotFound { path: path.into() }
    }

    pub fn not_executable(path: impl Into<PathBuf>) -> Self {
        Self::NotExecutable { path: path.into() }
    }

    pub fn invalid_settings(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSettings {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    pub fn io_error(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoError {
            operation: operation.into(),
            source,
        }
    }

    /// Setup errors abort a run before any scenario executes.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::ExecutableNotConfigured { .. }
                | Self::ExecutableNotFound { .. }
                | Self::NotExecutable { .. }
                | Self::InvalidSettings { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ProcessTimeout { .. } | Self::ConnectRetriesExhausted { .. }
        )
    }
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutableNotConfigured { variable, searched } => {
                writeln!(
                    f,
                    "{} The CLI under test is not configured: set {}",
                    "✗".red().bold(),
                    variable.yellow()
                )?;
                if !searched.is_empty() {
                    writeln!(f, "{}", "Searched locations:".green())?;
                    for path in searched {
                        writeln!(f, "  {} {}", "•".blue(), path.display())?;
                    }
                }
                Ok(())
            }
            Self::ExecutableNotFound { path } => {
                writeln!(
                    f,
                    "{} The CLI launcher does not exist: {}",
                    "✗".red().bold(),
                    path.display().to_string().yellow()
                )
            }
            Self::NotExecutable { path } => {
                writeln!(
                    f,
                    "{} Cannot execute: {}",
                    "✗".red().bold(),
                    path.display().to_string().yellow()
                )
            }
            Self::InvalidSettings { field, message } => {
                writeln!(f, "{} Invalid harness settings", "✗".red().bold())?;
                writeln!(f, "  {} Field: {}", "→".blue(), field.yellow())?;
                writeln!(f, "  {} Error: {}", "→".blue(), message)
            }
            Self::SpawnFailed { command, source } => {
                writeln!(
                    f,
                    "{} Failed to launch: {}",
                    "✗".red().bold(),
                    command.yellow()
                )?;
                writeln!(f, "  {} Error: {}", "→".blue(), source)
            }
            Self::ProcessTimeout {
                process,
                timeout,
                stdout,
                stderr,
            } => {
                writeln!(
                    f,
                    "{} Process not completed within the timeout ({} ms): {}",
                    "✗".red().bold(),
                    timeout.as_millis(),
                    process.yellow()
                )?;
                writeln!(f, "{}", "Process sysout:".green())?;
                writeln!(f, "{stdout}")?;
                writeln!(f, "{}", "Process syserr:".green())?;
                writeln!(f, "{stderr}")
            }
            Self::CaptureFailed {
                stream,
                message,
                stdout,
                stderr,
            } => {
                writeln!(
                    f,
                    "{} Failed to capture {} of the process",
                    "✗".red().bold(),
                    stream.yellow()
                )?;
                writeln!(f, "  {} {}", "→".blue(), message)?;
                writeln!(f, "{}", "Captured sysout:".green())?;
                writeln!(f, "{stdout}")?;
                writeln!(f, "{}", "Captured syserr:".green())?;
                writeln!(f, "{stderr}")
            }
            Self::ConnectRetriesExhausted {
                address,
                attempts,
                last_error,
            } => {
                writeln!(
                    f,
                    "{} Unable to connect to server after {} failed attempts",
                    "✗".red().bold(),
                    attempts
                )?;
                writeln!(f, "  {} Address: {}", "→".blue(), address.yellow())?;
                if let Some(err) = last_error {
                    writeln!(f, "  {} Last error: {}", "→".blue(), err)?;
                }
                Ok(())
            }
            Self::MalformedMessage { reason } => {
                writeln!(f, "{} Malformed HTTP message", "✗".red().bold())?;
                writeln!(f, "  {} {}", "→".blue(), reason)
            }
            Self::IoError { operation, source } => {
                writeln!(
                    f,
                    "{} I/O error during: {}",
                    "✗".red().bold(),
                    operation.yellow()
                )?;
                writeln!(f, "  {} Error: {}", "→".blue(), source)
            }
            Self::Other(err) => write!(f, "{} {}", "✗".red().bold(), err),
        }
    }
}

impl std::error::Error for HarnessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SpawnFailed { source, .. } | Self::IoError { source, .. } => Some(source),
            Self::Other(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for HarnessError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

impl From<anyhow::Error> for HarnessError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err)
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_names_the_path() {
        let err = HarnessError::executable_not_found("/opt/rawhttp/rawhttp.jar");
        let message = err.to_string();
        assert!(message.contains("/opt/rawhttp/rawhttp.jar"));
        assert!(err.is_setup_error());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_retries_exhausted_message() {
        let err = HarnessError::ConnectRetriesExhausted {
            address: "localhost:8083".to_string(),
            attempts: 10,
            last_error: Some("connection refused".to_string()),
        };
        let message = err.to_string();
        assert!(message.contains("Unable to connect to server after 10 failed attempts"));
        assert!(message.contains("localhost:8083"));
        assert!(message.contains("connection refused"));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_io_error_source_is_preserved() {
        let err: HarnessError =
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed").into();
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "pipe closed");
    }
}

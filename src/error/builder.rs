use std::time::Duration;

use super::HarnessError;

/// Builder for the diagnostics-heavy error variants
pub struct ErrorBuilder;

impl ErrorBuilder {
    /// Starts a timeout error for the process with the given identity
    pub fn process_timeout(process: &str) -> ProcessTimeoutBuilder {
        ProcessTimeoutBuilder {
            process: process.to_string(),
            timeout: Duration::ZERO,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Starts a retry exhaustion error for the given address
    pub fn retries_exhausted(address: &str) -> RetriesExhaustedBuilder {
        RetriesExhaustedBuilder {
            address: address.to_string(),
            attempts: 0,
            last_error: None,
        }
    }
}

pub struct ProcessTimeoutBuilder {
    process: String,
    timeout: Duration,
    stdout: String,
    stderr: String,
}

impl ProcessTimeoutBuilder {
    pub fn waited(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn stdout(mut self, bytes: &[u8]) -> Self {
        self.stdout = String::from_utf8_lossy(bytes).into_owned();
        self
    }

    pub fn stderr(mut self, bytes: &[u8]) -> Self {
        self.stderr = String::from_utf8_lossy(bytes).into_owned();
        self
    }

    pub fn build(self) -> HarnessError {
        HarnessError::ProcessTimeout {
            process: self.process,
            timeout: self.timeout,
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}

pub struct RetriesExhaustedBuilder {
    address: String,
    attempts: u32,
    last_error: Option<String>,
}

impl RetriesExhaustedBuilder {
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn last_error(mut self, err: &std::io::Error) -> Self {
        self.last_error = Some(err.to_string());
        self
    }

    pub fn build(self) -> HarnessError {
        HarnessError::ConnectRetriesExhausted {
            address: self.address,
            attempts: self.attempts,
            last_error: self.last_error,
        }
    }
}

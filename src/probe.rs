//! Client side of the harness: sends one raw request and reads one response
//!
//! Connecting is retried a fixed number of times so a probe can be fired at
//! a server that was launched a moment ago and may not be listening yet.

use std::io;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::config::HarnessSettings;
use crate::error::{ErrorBuilder, HarnessError, Result};
use crate::http::{read_response, RawMessage};
use crate::logging;

#[derive(Debug, Clone)]
pub struct ProbeClient {
    attempts: u32,
    retry_interval: Duration,
    io_timeout: Duration,
}

impl ProbeClient {
    pub fn new(settings: &HarnessSettings) -> Self {
        Self {
            attempts: settings.connect_attempts,
            retry_interval: settings.connect_retry_interval,
            io_timeout: settings.io_timeout,
        }
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Sends `request_text` to the server named by its Host header (or
    /// absolute target) and returns the parsed response.
    pub async fn send(&self, request_text: &str) -> Result<RawMessage> {
        let request = RawMessage::parse_request_text(request_text)?;
        let address = request.target_address()?;
        self.exchange(&address, &request).await
    }

    /// Sends `request_text` to `address` regardless of its Host header.
    pub async fn send_to(&self, address: &str, request_text: &str) -> Result<RawMessage> {
        let request = RawMessage::parse_request_text(request_text)?;
        self.exchange(address, &request).await
    }

    /// One request/response exchange over a fresh connection
    pub async fn exchange(&self, address: &str, request: &RawMessage) -> Result<RawMessage> {
        let mut stream = self.connect(address).await?;

        let bytes = request.to_bytes();
        tokio::time::timeout(self.io_timeout, async {
            stream.write_all(&bytes).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| timed_out("sending request", address))?
        .map_err(|e| HarnessError::io_error(format!("sending request to {address}"), e))?;

        let response = tokio::time::timeout(
            self.io_timeout,
            read_response(&mut stream, request.method()),
        )
        .await
        .map_err(|_| timed_out("reading response", address))??;

        tracing::debug!(
            address = address,
            status = response.status_code().unwrap_or_default(),
            "Received response"
        );
        Ok(response)
    }

    async fn connect(&self, address: &str) -> Result<TcpStream> {
        let mut last_error: Option<io::Error> = None;

        for attempt in 1..=self.attempts {
            let error = match tokio::time::timeout(self.io_timeout, TcpStream::connect(address)).await
            {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(e)) => e,
                Err(_) => io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            };

            logging::log_connect_retry(address, attempt, &error);
            last_error = Some(error);

            if attempt < self.attempts {
                tokio::time::sleep(self.retry_interval).await;
            }
        }

        let builder = ErrorBuilder::retries_exhausted(address).attempts(self.attempts);
        Err(match &last_error {
            Some(e) => builder.last_error(e).build(),
            None => builder.build(),
        })
    }
}

fn timed_out(operation: &str, address: &str) -> HarnessError {
    HarnessError::io_error(
        format!("{operation} ({address})"),
        io::Error::new(io::ErrorKind::TimedOut, "no progress within the I/O timeout"),
    )
}

use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging based on verbosity level
pub fn init_logging(verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("rawhttp_harness=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("rawhttp_harness=info,warn,error"))
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    if verbose {
        tracing::info!("Verbose logging enabled");
    }

    Ok(())
}

/// Log a child process launch
pub fn log_process_launched(command: &str, pid: Option<u32>) {
    tracing::info!(command = command, pid = pid, "Launched process");
}

/// Log a process that had to be force-killed
pub fn log_process_timeout(process: &str, timeout: Duration) {
    tracing::error!(
        process = process,
        timeout_ms = timeout.as_millis() as u64,
        "Process not completed within the timeout, killed"
    );
}

/// Log a connection accepted by the fixture server
pub fn log_connection_accepted(peer: SocketAddr) {
    tracing::info!(peer = %peer, "Accepted connection from client");
}

/// Log a request parsed by the fixture server
pub fn log_request_received(request_line: &str, status: u16) {
    tracing::info!(
        request = request_line,
        status = status,
        "Received request"
    );
}

/// Log a failed connection attempt that will be retried
pub fn log_connect_retry(address: &str, attempt: u32, error: &std::io::Error) {
    tracing::warn!(
        address = address,
        attempt = attempt,
        error = %error,
        "Connection to server failed, retry attempt number {}",
        attempt
    );
}

/// Log the fixture server shutting down
pub fn log_fixture_stopped(addr: SocketAddr) {
    tracing::info!(addr = %addr, "Fixture HTTP server stopped");
}

//! Minimal HTTP responder the CLI under test talks to
//!
//! One request per connection, connections served one at a time, two canned
//! responses. Each [`FixtureHandle`] owns its own accept loop, so independent
//! fixtures can run side by side on different ports.

pub mod canned;

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

pub use canned::{FixtureRoute, FixtureRoutes};

use crate::config::HarnessSettings;
use crate::error::{HarnessError, Result};
use crate::http::{read_request, RawMessage};
use crate::logging;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    Stopped,
    Starting,
    Accepting,
}

/// A fixture server that has not been started yet
#[derive(Debug, Clone)]
pub struct FixtureServer {
    host: String,
    port: u16,
    routes: FixtureRoutes,
    io_timeout: Duration,
}

impl FixtureServer {
    /// Standard routes on the configured host and port
    pub fn new(settings: &HarnessSettings) -> Result<Self> {
        Ok(Self {
            host: settings.fixture_host.clone(),
            port: settings.fixture_port,
            routes: FixtureRoutes::standard()?,
            io_timeout: settings.io_timeout,
        })
    }

    /// Overrides the port; 0 picks a free one
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn routes(mut self, routes: FixtureRoutes) -> Self {
        self.routes = routes;
        self
    }

    pub fn state(&self) -> FixtureState {
        FixtureState::Stopped
    }

    /// Binds the listening socket and starts the accept loop on its own task.
    pub async fn start(self) -> Result<FixtureHandle> {
        let (state_tx, state_rx) = watch::channel(FixtureState::Starting);

        let address = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(address.as_str())
            .await
            .map_err(|e| HarnessError::io_error(format!("binding fixture server to {address}"), e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| HarnessError::io_error("reading fixture server address", e))?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        state_tx.send_replace(FixtureState::Accepting);
        tracing::info!(addr = %local_addr, "Fixture HTTP server accepting connections");

        let task = tokio::spawn(accept_loop(
            listener,
            self.routes,
            self.io_timeout,
            shutdown_rx,
            state_tx,
        ));

        Ok(FixtureHandle {
            local_addr,
            shutdown: Some(shutdown_tx),
            state: state_rx,
            task: Some(task),
        })
    }
}

/// Owner of a running fixture server; dropping it stops the server too
#[derive(Debug)]
pub struct FixtureHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    state: watch::Receiver<FixtureState>,
    task: Option<JoinHandle<()>>,
}

impl FixtureHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn state(&self) -> FixtureState {
        *self.state.borrow()
    }

    /// Stops accepting and waits for the accept loop to exit.
    ///
    /// A connection being served when this is called is finished first.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| anyhow::anyhow!("fixture server task failed: {e}"))?;
        }
        Ok(())
    }
}

impl Drop for FixtureHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    routes: FixtureRoutes,
    io_timeout: Duration,
    mut shutdown: oneshot::Receiver<()>,
    state: watch::Sender<FixtureState>,
) {
    loop {
        tokio::select! {
            biased;

            // an explicit stop or a dropped handle both end the loop
            _ = &mut shutdown => break,

            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    logging::log_connection_accepted(peer);
                    if let Err(e) = serve_connection(stream, &routes, io_timeout).await {
                        tracing::warn!(peer = %peer, error = %e, "Failed to serve connection");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Fixture HTTP server failed to accept, stopping");
                    break;
                }
            },
        }
    }

    state.send_replace(FixtureState::Stopped);
    if let Ok(addr) = listener.local_addr() {
        logging::log_fixture_stopped(addr);
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    routes: &FixtureRoutes,
    io_timeout: Duration,
) -> Result<()> {
    let request = tokio::time::timeout(io_timeout, read_request(&mut stream))
        .await
        .map_err(|_| timed_out("reading request"))??;

    let path = request.path().unwrap_or_default();
    let response: &RawMessage = routes.route(&path);
    logging::log_request_received(
        &request.start_line().to_string(),
        response.status_code().unwrap_or_default(),
    );
    tracing::debug!("Received Request:\n{request}");

    let bytes = response.to_bytes();
    tokio::time::timeout(io_timeout, async {
        stream.write_all(&bytes).await?;
        stream.shutdown().await
    })
    .await
    .map_err(|_| timed_out("writing response"))?
    .map_err(|e| HarnessError::io_error("writing response", e))?;

    Ok(())
}

fn timed_out(operation: &str) -> HarnessError {
    HarnessError::io_error(
        operation,
        std::io::Error::new(std::io::ErrorKind::TimedOut, "connection timed out"),
    )
}

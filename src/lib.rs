//! Black-box test harness for command-line tools that speak raw HTTP
//!
//! The harness launches the tool under test, captures its output byte for
//! byte, gives it a fixture HTTP server to talk to and probes endpoints with
//! raw requests.

pub mod assertions;
pub mod config;
pub mod error;
pub mod fixture;
pub mod http;
pub mod logging;
pub mod probe;
pub mod process;
pub mod scenarios;

pub use config::{CliExecutable, ExecutableLocator, HarnessSettings};
pub use error::{HarnessError, Result};
pub use fixture::{FixtureHandle, FixtureServer, FixtureState};
pub use http::RawMessage;
pub use probe::ProbeClient;
pub use process::{CapturedProcess, ProcessController, ProcessOutput};
pub use scenarios::{Scenario, Suite, SuiteReport};

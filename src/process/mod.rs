//! Launching the CLI under test and capturing what it writes

pub mod capture;
pub mod controller;

pub use capture::{CapturedStreams, Drained, OutputCapture, StreamPump};
pub use controller::{CapturedProcess, ProcessController, ProcessOutput};

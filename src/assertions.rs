//! Comparison helpers over captured process output and probe responses
//!
//! Every check comes in two forms: `check_*` returns an [`AssertionFailure`]
//! so callers such as the scenario suite can report and carry on, and
//! `assert_*` panics with the same message for use inside `#[test]`s.

use std::fmt;

use crate::fixture::canned::{
    logged_exchange, NOT_FOUND_HTTP_RESPONSE, SUCCESS_HTTP_RESPONSE,
};
use crate::http::RawMessage;
use crate::process::ProcessOutput;

/// A failed check, with everything needed to diagnose it in the message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure {
    message: String,
}

impl AssertionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for AssertionFailure {}

pub type CheckResult = std::result::Result<(), AssertionFailure>;

/// Informational first lines of stderr that do not count as error output.
///
/// Only the first line is ever considered, and only when it starts with one
/// of the listed prefixes. The default list holds the notice a JVM prints
/// when it picks up `_JAVA_OPTIONS` from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StderrAllowList {
    first_line_prefixes: Vec<String>,
}

impl StderrAllowList {
    pub const JVM_OPTIONS_NOTICE: &'static str = "Picked up _JAVA_OPTIONS";

    /// Tolerates nothing
    pub fn empty() -> Self {
        Self {
            first_line_prefixes: Vec::new(),
        }
    }

    pub fn jvm() -> Self {
        Self::empty().allow_first_line(Self::JVM_OPTIONS_NOTICE)
    }

    pub fn allow_first_line(mut self, prefix: impl Into<String>) -> Self {
        self.first_line_prefixes.push(prefix.into());
        self
    }

    /// `stderr` without its first line if that line is allowed
    pub fn strip<'a>(&self, stderr: &'a str) -> &'a str {
        let (first, rest) = match stderr.split_once('\n') {
            Some((first, rest)) => (first, rest),
            None => (stderr, ""),
        };
        let allowed = self
            .first_line_prefixes
            .iter()
            .any(|prefix| first.starts_with(prefix.as_str()));
        if allowed {
            rest
        } else {
            stderr
        }
    }
}

impl Default for StderrAllowList {
    fn default() -> Self {
        Self::jvm()
    }
}

fn streams(output: &ProcessOutput) -> String {
    format!(
        "stdout: {:?}\nstderr: {:?}",
        output.stdout_text(),
        output.stderr_text()
    )
}

pub fn check_exit_code(output: &ProcessOutput, expected: i32) -> CheckResult {
    if output.exit_code == expected {
        return Ok(());
    }
    println!("Process stdout:\n{}", output.stdout_text());
    println!("Process stderr:\n{}", output.stderr_text());
    Err(AssertionFailure::new(format!(
        "Process exited with code {} but expected {}\n{}",
        output.exit_code,
        expected,
        streams(output)
    )))
}

/// Exact comparison, line terminators included
pub fn check_text_eq(what: &str, actual: &str, expected: &str) -> CheckResult {
    if actual == expected {
        return Ok(());
    }
    Err(AssertionFailure::new(format!(
        "{what} does not match\nexpected: {expected:?}\n  actual: {actual:?}"
    )))
}

pub fn check_stdout_eq(output: &ProcessOutput, expected: &str) -> CheckResult {
    check_text_eq("stdout", &output.stdout_text(), expected).map_err(|failure| {
        AssertionFailure::new(format!(
            "{failure}\nstderr: {:?}",
            output.stderr_text()
        ))
    })
}

/// Compares the response's wire bytes with `expected`
pub fn check_response_eq(response: &RawMessage, expected: &str) -> CheckResult {
    check_text_eq("response", &response.to_text(), expected)
}

pub fn check_no_stderr(output: &ProcessOutput, allow: &StderrAllowList) -> CheckResult {
    let stderr = output.stderr_text();
    let remaining = allow.strip(&stderr);
    if remaining.is_empty() {
        return Ok(());
    }
    Err(AssertionFailure::new(format!(
        "Expected no error output\n{}",
        streams(output)
    )))
}

fn check_clean_run(output: &ProcessOutput, expected_stdout: &str) -> CheckResult {
    check_exit_code(output, 0)?;
    check_stdout_eq(output, expected_stdout)?;
    check_no_stderr(output, &StderrAllowList::default())
}

/// Exit code 0, the exact success response and nothing on stderr
pub fn check_success_response(output: &ProcessOutput) -> CheckResult {
    check_clean_run(output, SUCCESS_HTTP_RESPONSE)
}

pub fn check_not_found_response(output: &ProcessOutput) -> CheckResult {
    check_clean_run(output, NOT_FOUND_HTTP_RESPONSE)
}

/// The logged `request`, the exact separator, then the success response
pub fn check_logged_request_then_success(output: &ProcessOutput, request: &str) -> CheckResult {
    check_clean_run(output, &logged_exchange(request, SUCCESS_HTTP_RESPONSE))
}

fn or_panic(result: CheckResult) {
    if let Err(failure) = result {
        panic!("{failure}");
    }
}

pub fn assert_exit_code(output: &ProcessOutput, expected: i32) {
    or_panic(check_exit_code(output, expected));
}

pub fn assert_text_eq(what: &str, actual: &str, expected: &str) {
    or_panic(check_text_eq(what, actual, expected));
}

pub fn assert_stdout_eq(output: &ProcessOutput, expected: &str) {
    or_panic(check_stdout_eq(output, expected));
}

pub fn assert_response_eq(response: &RawMessage, expected: &str) {
    or_panic(check_response_eq(response, expected));
}

pub fn assert_no_stderr(output: &ProcessOutput) {
    or_panic(check_no_stderr(output, &StderrAllowList::default()));
}

pub fn assert_success_response(output: &ProcessOutput) {
    or_panic(check_success_response(output));
}

pub fn assert_not_found_response(output: &ProcessOutput) {
    or_panic(check_not_found_response(output));
}

pub fn assert_logged_request_then_success(output: &ProcessOutput, request: &str) {
    or_panic(check_logged_request_then_success(output, request));
}

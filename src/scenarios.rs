//! Canned end-to-end checks of a rawhttp-style CLI against the fixture server

use std::io::Write;
use std::time::{Duration, Instant};

use colored::Colorize;

use crate::assertions::{
    check_logged_request_then_success, check_not_found_response, check_success_response,
    CheckResult,
};
use crate::config::HarnessSettings;
use crate::error::{HarnessError, Result};
use crate::fixture::canned::{request_for, SUCCESS_PATH};
use crate::fixture::FixtureServer;
use crate::process::{ProcessController, ProcessOutput};

/// How the request text reaches the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestInput {
    /// Appended as the last argument
    Argument,
    /// Written to a temporary file whose path is the last argument
    File,
    Stdin,
}

/// What the CLI's output must be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    Success,
    NotFound,
    LoggedRequestThenSuccess,
}

impl Expectation {
    pub fn check(self, output: &ProcessOutput, request: &str) -> CheckResult {
        match self {
            Self::Success => check_success_response(output),
            Self::NotFound => check_not_found_response(output),
            Self::LoggedRequestThenSuccess => check_logged_request_then_success(output, request),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub args: Vec<String>,
    pub input: RequestInput,
    pub request: String,
    pub expectation: Expectation,
}

impl Scenario {
    pub fn new(
        name: impl Into<String>,
        args: &[&str],
        input: RequestInput,
        request: impl Into<String>,
        expectation: Expectation,
    ) -> Self {
        Self {
            name: name.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
            input,
            request: request.into(),
            expectation,
        }
    }

    /// The standard `send` checks, with requests addressed to `authority`
    pub fn builtins(authority: &str) -> Vec<Scenario> {
        let success = request_for(SUCCESS_PATH, authority);
        let not_found = request_for("/does/not/exist", authority);

        vec![
            Scenario::new(
                "send request text",
                &["send", "-t"],
                RequestInput::Argument,
                success.clone(),
                Expectation::Success,
            ),
            Scenario::new(
                "send request text to unknown path",
                &["send", "-t"],
                RequestInput::Argument,
                not_found,
                Expectation::NotFound,
            ),
            Scenario::new(
                "send request from stdin",
                &["send"],
                RequestInput::Stdin,
                success.clone(),
                Expectation::Success,
            ),
            Scenario::new(
                "send request from file",
                &["send", "-f"],
                RequestInput::File,
                success.clone(),
                Expectation::Success,
            ),
            Scenario::new(
                "send request text and log it",
                &["send", "-l", "-t"],
                RequestInput::Argument,
                success,
                Expectation::LoggedRequestThenSuccess,
            ),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub name: String,
    pub failure: Option<String>,
    pub elapsed: Duration,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SuiteReport {
    pub outcomes: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    pub fn print(&self) {
        for outcome in &self.outcomes {
            match &outcome.failure {
                None => println!(
                    "  {} {} ({} ms)",
                    "✓".green(),
                    outcome.name,
                    outcome.elapsed.as_millis()
                ),
                Some(failure) => {
                    println!("  {} {}", "✗".red(), outcome.name.bold());
                    for line in failure.lines() {
                        println!("      {line}");
                    }
                }
            }
        }

        println!();
        let summary = format!("{} passed, {} failed", self.passed(), self.failed());
        if self.all_passed() {
            println!("{}", summary.green().bold());
        } else {
            println!("{}", summary.red().bold());
        }
    }
}

/// Runs scenarios one after another against a fixture server it owns
pub struct Suite {
    controller: ProcessController,
    settings: HarnessSettings,
    scenarios: Option<Vec<Scenario>>,
}

impl Suite {
    pub fn new(controller: ProcessController, settings: HarnessSettings) -> Self {
        Self {
            controller,
            settings,
            scenarios: None,
        }
    }

    /// Replaces the built-in scenarios
    pub fn with_scenarios(mut self, scenarios: Vec<Scenario>) -> Self {
        self.scenarios = Some(scenarios);
        self
    }

    /// Starts the fixture server, runs every scenario and stops the server.
    ///
    /// A failing scenario does not stop the run; only a fixture that cannot
    /// be started or stopped is an error.
    pub async fn run(&self) -> Result<SuiteReport> {
        let fixture = FixtureServer::new(&self.settings)?.start().await?;
        let authority = fixture.local_addr().to_string();

        let scenarios = match &self.scenarios {
            Some(scenarios) => scenarios.clone(),
            None => Scenario::builtins(&authority),
        };

        let mut report = SuiteReport::default();
        for scenario in &scenarios {
            tracing::info!(scenario = %scenario.name, "Running scenario");
            report.outcomes.push(self.run_scenario(scenario).await);
        }

        fixture.stop().await?;
        Ok(report)
    }

    async fn run_scenario(&self, scenario: &Scenario) -> ScenarioOutcome {
        let started = Instant::now();
        let failure = match self.execute(scenario).await {
            Ok(Ok(())) => None,
            Ok(Err(failure)) => Some(failure.to_string()),
            Err(e) => Some(e.to_string()),
        };
        ScenarioOutcome {
            name: scenario.name.clone(),
            failure,
            elapsed: started.elapsed(),
        }
    }

    async fn execute(&self, scenario: &Scenario) -> Result<CheckResult> {
        let mut args = scenario.args.clone();

        // kept alive until the process is done with it
        let mut request_file = None;

        let mut process = match scenario.input {
            RequestInput::Argument => {
                args.push(scenario.request.clone());
                self.controller.launch(&args)?
            }
            RequestInput::File => {
                let file = write_request_file(&scenario.request)?;
                args.push(file.path().to_string_lossy().into_owned());
                request_file = Some(file);
                self.controller.launch(&args)?
            }
            RequestInput::Stdin => {
                self.controller
                    .launch_with_input(&args, scenario.request.as_bytes())
                    .await?
            }
        };

        let output = process.await_completion().await?;
        let result = scenario.expectation.check(output, &scenario.request);
        drop(request_file);
        Ok(result)
    }
}

fn write_request_file(request: &str) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("rawhttp-request-")
        .suffix(".req")
        .tempfile()
        .map_err(|e| HarnessError::io_error("creating request file", e))?;
    file.write_all(request.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| HarnessError::io_error("writing request file", e))?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_address_the_fixture() {
        let scenarios = Scenario::builtins("127.0.0.1:9999");
        assert_eq!(scenarios.len(), 5);
        for scenario in &scenarios {
            assert!(scenario.request.contains("Host: 127.0.0.1:9999"));
            assert_eq!(scenario.args[0], "send");
        }
        assert_eq!(
            scenarios
                .iter()
                .filter(|s| s.expectation == Expectation::NotFound)
                .count(),
            1
        );
    }

    #[test]
    fn test_report_counts() {
        let report = SuiteReport {
            outcomes: vec![
                ScenarioOutcome {
                    name: "a".into(),
                    failure: None,
                    elapsed: Duration::ZERO,
                },
                ScenarioOutcome {
                    name: "b".into(),
                    failure: Some("boom".into()),
                    elapsed: Duration::ZERO,
                },
            ],
        };
        assert_eq!(report.passed(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.all_passed());
    }

    #[test]
    fn test_request_file_holds_the_exact_text() {
        let file = write_request_file("GET / HTTP/1.1\r\nHost: x").unwrap();
        let written = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(written, "GET / HTTP/1.1\r\nHost: x");
    }
}

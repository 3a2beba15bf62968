#![cfg(unix)]

mod common;

use assert_cmd::Command;
use common::{fast_settings, stub_fixed_output_cli, stub_rawhttp_cli};
use predicates::prelude::*;
use rawhttp_harness::assertions::{assert_logged_request_then_success, assert_success_response};
use rawhttp_harness::fixture::canned::{request_for, SUCCESS_PATH};
use rawhttp_harness::scenarios::{Expectation, RequestInput, Scenario};
use rawhttp_harness::{
    CliExecutable, ExecutableLocator, FixtureServer, HarnessSettings, ProcessController, Suite,
};

#[tokio::test(flavor = "multi_thread")]
async fn test_stub_cli_passes_every_builtin_scenario() {
    let (_dir, cli) = stub_rawhttp_cli();
    let settings = fast_settings();
    let controller = ProcessController::new(CliExecutable::native(&cli), &settings);

    let report = Suite::new(controller, settings).run().await.unwrap();
    for outcome in &report.outcomes {
        assert!(outcome.passed(), "{}: {:?}", outcome.name, outcome.failure);
    }
    assert_eq!(report.passed(), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_wrong_output_fails_the_scenarios() {
    let (_dir, cli) = stub_fixed_output_cli("HTTP/1.1 500 Internal Server Error\r\n\r\n");
    let settings = fast_settings();
    let controller = ProcessController::new(CliExecutable::native(&cli), &settings);

    let report = Suite::new(controller, settings).run().await.unwrap();
    assert_eq!(report.passed(), 0);
    assert!(!report.all_passed());
    for outcome in &report.outcomes {
        let failure = outcome.failure.as_deref().unwrap_or_default();
        assert!(failure.contains("stdout does not match"), "{failure}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_custom_scenarios_replace_the_builtins() {
    let (_dir, cli) = stub_rawhttp_cli();
    let settings = fast_settings();
    let controller = ProcessController::new(CliExecutable::native(&cli), &settings);

    let unreachable = Scenario::new(
        "unknown command",
        &["fetch"],
        RequestInput::Argument,
        "GET / HTTP/1.1",
        Expectation::Success,
    );
    let report = Suite::new(controller, settings)
        .with_scenarios(vec![unreachable])
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 1);
    let failure = report.outcomes[0].failure.as_deref().unwrap_or_default();
    assert!(failure.contains("exited with code 2"), "{failure}");
    assert!(failure.contains("unknown command: fetch"), "{failure}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_driving_the_stub_cli_by_hand() {
    let (_dir, cli) = stub_rawhttp_cli();
    let settings = fast_settings();
    let fixture = FixtureServer::new(&settings).unwrap().start().await.unwrap();
    let request = request_for(SUCCESS_PATH, &fixture.local_addr().to_string());
    let controller = ProcessController::new(CliExecutable::native(&cli), &settings);

    let mut plain = controller.launch(&["send", "-t", &request]).unwrap();
    assert_success_response(plain.await_completion().await.unwrap());

    let mut logged = controller.launch(&["send", "-l", "-t", &request]).unwrap();
    assert_logged_request_then_success(logged.await_completion().await.unwrap(), &request);

    fixture.stop().await.unwrap();
}

#[test]
fn test_check_command_reports_success() {
    let (_dir, cli) = stub_rawhttp_cli();
    Command::cargo_bin("rawhttp-harness")
        .unwrap()
        .env_remove("RAWHTTP_HARNESS_CONFIG")
        .env("RAWHTTP_HARNESS_PORT", "0")
        .env("RUST_LOG", "off")
        .args(["check", "--executable"])
        .arg(&cli)
        .assert()
        .success()
        .stdout(predicate::str::contains("5 passed, 0 failed"));
}

#[test]
fn test_check_command_fails_on_wrong_output() {
    let (_dir, cli) = stub_fixed_output_cli("nope");
    Command::cargo_bin("rawhttp-harness")
        .unwrap()
        .env_remove("RAWHTTP_HARNESS_CONFIG")
        .env("RAWHTTP_HARNESS_PORT", "0")
        .env("RUST_LOG", "off")
        .args(["check", "--executable"])
        .arg(&cli)
        .assert()
        .failure()
        .stdout(predicate::str::contains("0 passed, 5 failed"));
}

/// Runs the suite against a real rawhttp CLI when `RAWHTTP_CLI` points at one.
#[tokio::test(flavor = "multi_thread")]
async fn test_real_cli_when_configured() {
    if std::env::var_os("RAWHTTP_CLI").is_none() {
        eprintln!("RAWHTTP_CLI not set, skipping");
        return;
    }

    let settings = HarnessSettings {
        fixture_port: 0,
        ..HarnessSettings::default()
    };
    let executable = ExecutableLocator::from_env().unwrap().locate().unwrap();
    let controller = ProcessController::new(executable, &settings);

    let report = Suite::new(controller, settings).run().await.unwrap();
    report.print();
    assert!(report.all_passed());
}

#![cfg(unix)]

mod common;

use common::{fast_settings, shell_controller};
use rawhttp_harness::assertions::{
    assert_exit_code, assert_no_stderr, assert_success_response, check_exit_code,
    check_no_stderr, check_stdout_eq, StderrAllowList,
};
use rawhttp_harness::fixture::canned::SUCCESS_HTTP_RESPONSE;
use rawhttp_harness::ProcessOutput;

async fn run(script: &str) -> ProcessOutput {
    let controller = shell_controller(&fast_settings());
    let mut process = controller.launch(&[script]).unwrap();
    process.await_completion().await.unwrap().clone()
}

#[tokio::test]
async fn test_jvm_options_notice_is_tolerated() {
    let output =
        run("printf 'Picked up _JAVA_OPTIONS: -Djava.awt.headless=true\\n' >&2").await;
    assert_no_stderr(&output);
}

#[tokio::test]
async fn test_anything_after_the_notice_is_reported() {
    let output = run("printf 'Picked up _JAVA_OPTIONS: -Xmx1g\\nException in thread main\\n' >&2").await;
    let failure = check_no_stderr(&output, &StderrAllowList::jvm()).unwrap_err();
    assert!(failure.message().contains("Exception in thread main"));
}

#[tokio::test]
async fn test_custom_allow_list() {
    let output = run("printf 'WARNING: using fallback\\n' >&2").await;
    assert!(check_no_stderr(&output, &StderrAllowList::jvm()).is_err());

    let allow = StderrAllowList::empty().allow_first_line("WARNING:");
    assert!(check_no_stderr(&output, &allow).is_ok());
}

#[tokio::test]
async fn test_exit_code_mismatch_reports_both_streams() {
    let output = run("printf 'half a response'; printf 'connection reset' >&2; exit 1").await;
    assert_exit_code(&output, 1);

    let failure = check_exit_code(&output, 0).unwrap_err();
    assert!(failure.message().contains("half a response"));
    assert!(failure.message().contains("connection reset"));
}

#[tokio::test]
async fn test_stdout_mismatch_names_stderr_too() {
    let output = run("printf 'HTTP/1.1 200 OK\\n'; printf 'oops' >&2").await;
    let failure = check_stdout_eq(&output, "HTTP/1.1 200 OK\r\n").unwrap_err();
    assert!(failure.message().contains("stdout does not match"));
    assert!(failure.message().contains("oops"));
}

#[tokio::test]
async fn test_success_response_from_a_process() {
    let script = format!("printf '%s' '{SUCCESS_HTTP_RESPONSE}'");
    let output = run(&script).await;
    assert_success_response(&output);
}

#[tokio::test]
#[should_panic(expected = "exited with code 3 but expected 0")]
async fn test_assert_exit_code_panics_on_mismatch() {
    let output = run("exit 3").await;
    assert_exit_code(&output, 0);
}

#![allow(dead_code)]

use rawhttp_harness::{CliExecutable, HarnessSettings, ProcessController};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Settings with short waits and an ephemeral fixture port
pub fn fast_settings() -> HarnessSettings {
    HarnessSettings {
        fixture_port: 0,
        exit_timeout: Duration::from_millis(1500),
        stop_grace: Duration::from_millis(100),
        connect_retry_interval: Duration::from_millis(50),
        connect_attempts: 5,
        io_timeout: Duration::from_secs(2),
        ..HarnessSettings::default()
    }
}

/// Controller whose single argument is a `/bin/sh -c` script
pub fn shell_controller(settings: &HarnessSettings) -> ProcessController {
    ProcessController::new(
        CliExecutable::with_prefix("/bin/sh", vec!["-c".to_string()]),
        settings,
    )
}

/// Writes an executable shell script into `dir`
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// A stand-in for the rawhttp CLI built on this crate's `probe` command.
///
/// Understands `send [-l] [-t TEXT | -f FILE]`, reading stdin when neither
/// is given, and prints the request before the response when `-l` is set.
#[cfg(unix)]
pub fn stub_rawhttp_cli() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let harness = env!("CARGO_BIN_EXE_rawhttp-harness");
    let body = format!(
        r#"[ "$1" = "send" ] || {{ echo "unknown command: $1" >&2; exit 2; }}
shift
log=0
if [ "$1" = "-l" ]; then log=1; shift; fi
case "$1" in
  -t) text="$2" ;;
  -f) text="$(cat "$2")" ;;
  *) text="$(cat)" ;;
esac
if [ "$log" = 1 ]; then printf '%s\r\n\r\n\n' "$text"; fi
RUST_LOG=off exec "{harness}" probe --text "$text"
"#
    );
    let path = write_script(dir.path(), "rawhttp", &body);
    (dir, path)
}

/// A CLI that ignores its input and always prints `stdout`
#[cfg(unix)]
pub fn stub_fixed_output_cli(stdout: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("output.txt");
    fs::write(&file, stdout).unwrap();
    let body = format!("cat \"{}\"\n", file.display());
    let path = write_script(dir.path(), "rawhttp", &body);
    (dir, path)
}

/// Common assertion helper for error messages
pub fn assert_error_contains(error_string: &str, expected_messages: &[&str]) {
    for msg in expected_messages {
        assert!(
            error_string.contains(msg),
            "Expected error to contain '{msg}', but got: {error_string}"
        );
    }
}

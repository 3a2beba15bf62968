use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

use super::capture::{CapturedStreams, OutputCapture};
use crate::config::{CliExecutable, HarnessSettings};
use crate::error::{ErrorBuilder, HarnessError, Result};
use crate::logging;

/// Exit code and everything the process wrote, available once it is done
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Launches the CLI under test with the harness's time budget
#[derive(Debug, Clone)]
pub struct ProcessController {
    executable: CliExecutable,
    exit_timeout: Duration,
    stop_grace: Duration,
}

impl ProcessController {
    pub fn new(executable: CliExecutable, settings: &HarnessSettings) -> Self {
        Self {
            executable,
            exit_timeout: settings.exit_timeout,
            stop_grace: settings.stop_grace,
        }
    }

    pub fn executable(&self) -> &CliExecutable {
        &self.executable
    }

    /// Spawns the executable with `args` and returns without waiting.
    ///
    /// Standard input is closed; stdout and stderr are captured from the
    /// first byte on.
    pub fn launch<S: AsRef<str>>(&self, args: &[S]) -> Result<CapturedProcess> {
        self.spawn(args, false)
    }

    /// Like [`launch`](Self::launch), then writes `input` to the process's
    /// standard input and closes it.
    pub async fn launch_with_input<S: AsRef<str>>(
        &self,
        args: &[S],
        input: &[u8],
    ) -> Result<CapturedProcess> {
        let mut process = self.spawn(args, true)?;

        if let Some(mut stdin) = process.child.stdin.take() {
            // both pumps are already running, so the child cannot stall on a full stdout
            match tokio::time::timeout(self.exit_timeout, stdin.write_all(input)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!(
                        process = %process.identity,
                        "Process closed its standard input before reading all of it"
                    );
                }
                Ok(Err(e)) => {
                    return Err(HarnessError::io_error(
                        format!("writing standard input of {}", process.identity),
                        e,
                    ))
                }
                Err(_) => {
                    return Err(HarnessError::io_error(
                        format!("writing standard input of {}", process.identity),
                        std::io::Error::new(
                            std::io::ErrorKind::TimedOut,
                            "process did not consume its standard input",
                        ),
                    ))
                }
            }
        }

        Ok(process)
    }

    fn spawn<S: AsRef<str>>(&self, args: &[S], piped_stdin: bool) -> Result<CapturedProcess> {
        let command_line = self.executable.command_line(args);

        let mut cmd = Command::new(self.executable.program());
        cmd.args(self.executable.argv(args))
            .stdin(if piped_stdin {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| HarnessError::SpawnFailed {
            command: command_line.clone(),
            source,
        })?;
        let capture = OutputCapture::attach(&mut child);

        let pid = child.id();
        logging::log_process_launched(&command_line, pid);

        let identity = match pid {
            Some(pid) => format!("{command_line} (pid {pid})"),
            None => command_line,
        };

        Ok(CapturedProcess {
            child,
            identity,
            pid,
            capture: Some(capture),
            exit_code: None,
            output: None,
            timed_out: None,
            exit_timeout: self.exit_timeout,
            stop_grace: self.stop_grace,
        })
    }
}

/// A launched child process together with its output pumps.
///
/// Output is read in two explicit steps: [`await_completion`] makes sure the
/// process is gone (killing it if it overstays the exit timeout) and joins
/// the pumps, then the returned [`ProcessOutput`] is read.
///
/// [`await_completion`]: CapturedProcess::await_completion
#[derive(Debug)]
pub struct CapturedProcess {
    child: Child,
    identity: String,
    pid: Option<u32>,
    capture: Option<OutputCapture>,
    exit_code: Option<i32>,
    output: Option<ProcessOutput>,
    timed_out: Option<Duration>,
    exit_timeout: Duration,
    stop_grace: Duration,
}

impl CapturedProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Command line and pid, used in diagnostics
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Waits up to `timeout` for the process to exit.
    ///
    /// On timeout the process is killed and a [`HarnessError::ProcessTimeout`]
    /// carrying the output captured so far is returned.
    pub async fn wait_for_exit_code(&mut self, timeout: Duration) -> Result<i32> {
        if let Some(waited) = self.timed_out {
            return Err(self.timeout_error(waited));
        }
        if let Some(code) = self.exit_code {
            return Ok(code);
        }

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                let code = exit_code_of(status);
                tracing::debug!(process = %self.identity, exit_code = code, "Process exited");
                self.exit_code = Some(code);
                Ok(code)
            }
            Ok(Err(e)) => Err(HarnessError::io_error(
                format!("waiting for {}", self.identity),
                e,
            )),
            Err(_) => {
                self.force_kill(timeout).await;
                Err(self.timeout_error(timeout))
            }
        }
    }

    /// Ensures the process has terminated and returns its complete output.
    ///
    /// Waits up to the exit timeout, killing the process and failing if it
    /// is still alive by then. Repeated calls return the same output.
    pub async fn await_completion(&mut self) -> Result<&ProcessOutput> {
        if self.output.is_none() {
            let exit_code = self.wait_for_exit_code(self.exit_timeout).await?;
            let capture = self
                .capture
                .take()
                .ok_or_else(|| unavailable("output was already collected"))?;
            let (stdout, stderr) = capture.collect(self.exit_timeout).await.into_result()?;
            self.output = Some(ProcessOutput {
                exit_code,
                stdout,
                stderr,
            });
        } else if let Some(waited) = self.timed_out {
            return Err(self.timeout_error(waited));
        }

        self.output
            .as_ref()
            .ok_or_else(|| unavailable("output is not available"))
    }

    /// Asks the process to terminate after the grace period.
    ///
    /// The sleep comes first so a long-running server can flush what it has
    /// already produced. A process that is already gone is not an error.
    pub async fn send_stop_signal(&mut self) {
        tokio::time::sleep(self.stop_grace).await;

        if self.exit_code.is_some() {
            return;
        }
        if let Ok(Some(status)) = self.child.try_wait() {
            self.exit_code = Some(exit_code_of(status));
            return;
        }

        tracing::debug!(process = %self.identity, "Sending stop signal");
        request_termination(&mut self.child);
    }

    async fn force_kill(&mut self, waited: Duration) {
        logging::log_process_timeout(&self.identity, waited);

        if let Err(e) = self.child.kill().await {
            tracing::warn!(process = %self.identity, error = %e, "Failed to kill process");
        }
        let exit_code = match self.child.try_wait() {
            Ok(Some(status)) => exit_code_of(status),
            _ => -1,
        };

        // a grandchild may still hold the pipes; keep what was read so far
        let streams = match self.capture.take() {
            Some(capture) => capture.collect(self.stop_grace).await,
            None => CapturedStreams::default(),
        };
        if let Some((stream, message)) = &streams.failure {
            tracing::warn!(process = %self.identity, stream = *stream, message = %message, "Output capture incomplete");
        }
        let CapturedStreams { stdout, stderr, .. } = streams;

        self.exit_code = Some(exit_code);
        self.timed_out = Some(waited);
        self.output = Some(ProcessOutput {
            exit_code,
            stdout,
            stderr,
        });
    }

    fn timeout_error(&self, waited: Duration) -> HarnessError {
        let builder = ErrorBuilder::process_timeout(&self.identity).waited(waited);
        match &self.output {
            Some(output) => builder.stdout(&output.stdout).stderr(&output.stderr).build(),
            None => builder.build(),
        }
    }
}

fn unavailable(message: &str) -> HarnessError {
    HarnessError::CaptureFailed {
        stream: "stdout",
        message: message.to_string(),
        stdout: String::new(),
        stderr: String::new(),
    }
}

#[cfg(unix)]
fn request_termination(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        if let Err(errno) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            // server probably died early
            tracing::debug!(pid, error = %errno, "Stop signal not delivered");
        }
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "Stop signal not delivered");
    }
}

/// Exit code, or `128 + signal` for a process killed by a signal
fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell() -> ProcessController {
        let settings = HarnessSettings {
            exit_timeout: Duration::from_millis(500),
            stop_grace: Duration::from_millis(50),
            ..HarnessSettings::default()
        };
        ProcessController::new(
            CliExecutable::with_prefix("/bin/sh", vec!["-c".to_string()]),
            &settings,
        )
    }

    #[tokio::test]
    async fn test_identity_names_command_and_pid() {
        let mut process = shell().launch(&["exit 0"]).unwrap();
        let pid = process.pid().unwrap();
        assert_eq!(process.identity(), format!("/bin/sh -c exit 0 (pid {pid})"));
        assert_eq!(process.wait_for_exit_code(Duration::from_secs(2)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_await_completion_is_idempotent() {
        let mut process = shell().launch(&["printf out; printf err >&2; exit 3"]).unwrap();
        let first = process.await_completion().await.unwrap().clone();
        let second = process.await_completion().await.unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(first.exit_code, 3);
        assert_eq!(first.stdout, b"out");
        assert_eq!(first.stderr, b"err");
    }

    #[tokio::test]
    async fn test_timeout_is_sticky() {
        let mut process = shell().launch(&["exec sleep 30"]).unwrap();
        let err = process
            .wait_for_exit_code(Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::ProcessTimeout { .. }));

        let err = process.await_completion().await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_spawn_failure_names_the_command() {
        let controller = ProcessController::new(
            CliExecutable::native("/definitely/not/here"),
            &HarnessSettings::default(),
        );
        let err = controller.launch(&["send"]).unwrap_err();
        assert!(matches!(err, HarnessError::SpawnFailed { .. }));
        assert!(err.to_string().contains("/definitely/not/here send"));
    }

    #[test]
    fn test_exit_code_of_signal() {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(exit_code_of(ExitStatus::from_raw(15)), 143);
        assert_eq!(exit_code_of(ExitStatus::from_raw(1 << 8)), 1);
    }
}

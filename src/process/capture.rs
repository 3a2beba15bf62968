//! Background draining of a child's output streams
//!
//! Each stream gets its own task that owns the buffer it appends to. The
//! buffers are handed back only by joining those tasks, so a reader can never
//! observe a partially written buffer. A task asked to stop early still hands
//! back everything it read up to that point.

use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{HarnessError, Result};

const INITIAL_CAPACITY: usize = 1024;
const READ_CHUNK: usize = 8192;

/// How long a stopped pump gets to return its buffer before it is aborted
const STOP_WAIT: Duration = Duration::from_millis(100);

struct PumpResult {
    buf: Vec<u8>,
    error: Option<io::Error>,
    stopped: bool,
}

/// Bytes a pump read, plus why it ended early if it did
#[derive(Debug, Default)]
pub struct Drained {
    pub bytes: Vec<u8>,
    pub failure: Option<String>,
}

/// One stream drained into an in-memory buffer on a dedicated task
#[derive(Debug)]
pub struct StreamPump {
    name: &'static str,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<PumpResult>,
}

impl std::fmt::Debug for PumpResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PumpResult")
            .field("len", &self.buf.len())
            .field("error", &self.error)
            .field("stopped", &self.stopped)
            .finish()
    }
}

impl StreamPump {
    /// Starts draining `stream`; a missing stream yields an empty buffer.
    pub fn spawn<R>(name: &'static str, stream: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(pump(stream, stop_rx));
        Self {
            name,
            stop: Some(stop_tx),
            task,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the stream to reach EOF and returns everything read.
    ///
    /// A pump still running after `limit` is told to stop and hands back what
    /// it has so far, together with a failure. That happens when something
    /// other than the child, such as a grandchild, keeps the pipe open.
    pub async fn join(mut self, limit: Duration) -> Drained {
        let mut task = self.task;

        let joined = match tokio::time::timeout(limit, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                if let Some(stop) = self.stop.take() {
                    let _ = stop.send(());
                }
                match tokio::time::timeout(STOP_WAIT, &mut task).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        task.abort();
                        return Drained {
                            bytes: Vec::new(),
                            failure: Some("stream pump did not stop".to_string()),
                        };
                    }
                }
            }
        };

        match joined {
            Ok(PumpResult {
                buf,
                error: Some(e),
                ..
            }) => Drained {
                bytes: buf,
                failure: Some(e.to_string()),
            },
            Ok(PumpResult {
                buf, stopped: true, ..
            }) => Drained {
                bytes: buf,
                failure: Some(format!(
                    "stream still open {} ms after the process exited",
                    limit.as_millis()
                )),
            },
            Ok(PumpResult { buf, .. }) => Drained {
                bytes: buf,
                failure: None,
            },
            Err(join_error) => Drained {
                bytes: Vec::new(),
                failure: Some(join_error.to_string()),
            },
        }
    }
}

async fn pump<R>(stream: Option<R>, mut stop: oneshot::Receiver<()>) -> PumpResult
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(INITIAL_CAPACITY);
    let Some(mut stream) = stream else {
        return PumpResult {
            buf,
            error: None,
            stopped: false,
        };
    };

    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        tokio::select! {
            // drain whatever is readable before honoring a stop
            biased;

            read = stream.read(&mut chunk) => match read {
                Ok(0) => {
                    return PumpResult { buf, error: None, stopped: false };
                }
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    return PumpResult { buf, error: Some(e), stopped: false };
                }
            },
            _ = &mut stop => {
                return PumpResult { buf, error: None, stopped: true };
            }
        }
    }
}

/// Both streams of a process, plus the first capture failure if any
#[derive(Debug, Default)]
pub struct CapturedStreams {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub failure: Option<(&'static str, String)>,
}

impl CapturedStreams {
    /// The complete streams, or a `CaptureFailed` carrying what was read
    pub fn into_result(self) -> Result<(Vec<u8>, Vec<u8>)> {
        match self.failure {
            None => Ok((self.stdout, self.stderr)),
            Some((stream, message)) => Err(HarnessError::CaptureFailed {
                stream,
                message,
                stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
            }),
        }
    }
}

/// The stdout and stderr pumps of one child process
#[derive(Debug)]
pub struct OutputCapture {
    stdout: StreamPump,
    stderr: StreamPump,
}

impl OutputCapture {
    /// Takes the child's piped stdout and stderr and starts both pumps.
    pub fn attach(child: &mut Child) -> Self {
        Self {
            stdout: StreamPump::spawn("stdout", child.stdout.take()),
            stderr: StreamPump::spawn("stderr", child.stderr.take()),
        }
    }

    pub fn is_drained(&self) -> bool {
        self.stdout.is_finished() && self.stderr.is_finished()
    }

    /// Joins both pumps. Only meaningful once the process has exited.
    pub async fn collect(self, limit: Duration) -> CapturedStreams {
        let (stdout, stderr) = tokio::join!(self.stdout.join(limit), self.stderr.join(limit));
        let failure = stdout
            .failure
            .map(|message| ("stdout", message))
            .or_else(|| stderr.failure.map(|message| ("stderr", message)));
        CapturedStreams {
            stdout: stdout.bytes,
            stderr: stderr.bytes,
            failure,
        }
    }
}

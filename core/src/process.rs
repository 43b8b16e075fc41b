//! Connection to a running main controller process.

use std::ffi::OsStr;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::error::Result;
use crate::error::SessionError;

const READ_CHUNK_SIZE: usize = 8192;
const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// Writes newline-terminated commands to the controller's standard input.
#[async_trait]
pub trait CommandWriter: Send {
    /// Writes `line` in a single call. A failure means the controller can no
    /// longer be reached.
    async fn write_command(&mut self, line: &str) -> std::io::Result<()>;
}

#[async_trait]
impl CommandWriter for ChildStdin {
    async fn write_command(&mut self, line: &str) -> std::io::Result<()> {
        self.write_all(line.as_bytes()).await?;
        self.flush().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub source: OutputSource,
    pub bytes: Vec<u8>,
}

impl OutputChunk {
    pub fn stdout(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            source: OutputSource::Stdout,
            bytes: bytes.into(),
        }
    }

    pub fn stderr(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            source: OutputSource::Stderr,
            bytes: bytes.into(),
        }
    }
}

/// Everything a session needs from a running controller. The output channel
/// closes when both streams have ended; `exit` resolves with the exit code
/// (`None` when killed by a signal).
pub struct ProcessChannel {
    pub writer: Box<dyn CommandWriter>,
    pub output: mpsc::Receiver<OutputChunk>,
    pub exit: oneshot::Receiver<Option<i32>>,
    /// Cancelling this kills the process.
    pub kill: CancellationToken,
}

impl ProcessChannel {
    pub fn from_parts(
        writer: impl CommandWriter + 'static,
        output: mpsc::Receiver<OutputChunk>,
        exit: oneshot::Receiver<Option<i32>>,
    ) -> Self {
        Self {
            writer: Box::new(writer),
            output,
            exit,
            kill: CancellationToken::new(),
        }
    }
}

/// Starts `program` with piped standard streams.
pub fn spawn_main_controller<I, S>(program: impl AsRef<OsStr>, args: I) -> Result<ProcessChannel>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut child = Command::new(program.as_ref())
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(SessionError::spawn)?;
    debug!(pid = ?child.id(), program = ?program.as_ref(), "main controller started");

    let stdin = child.stdin.take().ok_or(SessionError::MissingPipe("stdin"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or(SessionError::MissingPipe("stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or(SessionError::MissingPipe("stderr"))?;

    let (output_tx, output_rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
    tokio::spawn(forward_output(stdout, OutputSource::Stdout, output_tx.clone()));
    tokio::spawn(forward_output(stderr, OutputSource::Stderr, output_tx));

    let (exit_tx, exit_rx) = oneshot::channel();
    let kill = CancellationToken::new();
    let kill_requested = kill.clone();
    tokio::spawn(async move {
        let status = tokio::select! {
            status = child.wait() => status,
            _ = kill_requested.cancelled() => {
                if let Err(err) = child.start_kill() {
                    warn!(%err, "failed to kill main controller");
                }
                child.wait().await
            }
        };
        let code = match status {
            Ok(status) => status.code(),
            Err(err) => {
                warn!(%err, "failed to wait for main controller");
                None
            }
        };
        debug!(?code, "main controller exited");
        let _ = exit_tx.send(code);
    });

    Ok(ProcessChannel {
        writer: Box::new(stdin),
        output: output_rx,
        exit: exit_rx,
        kill,
    })
}

async fn forward_output<R: AsyncRead + Unpin>(
    mut reader: R,
    source: OutputSource,
    tx: mpsc::Sender<OutputChunk>,
) {
    let mut buf = [0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = OutputChunk {
                    source,
                    bytes: buf[..n].to_vec(),
                };
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                warn!(?source, %err, "reading main controller output failed");
                break;
            }
        }
    }
}

//! In-memory stand-in for a main controller process.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use mcctl_core::ProcessChannel;
use mcctl_core::process::CommandWriter;
use mcctl_core::process::OutputChunk;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

/// Records every command written by the session.
pub struct RecordingWriter {
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl CommandWriter for RecordingWriter {
    async fn write_command(&mut self, line: &str) -> io::Result<()> {
        self.tx
            .send(line.to_string())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "controller is gone"))
    }
}

/// Fails every write, like the stdin of a process that already exited.
pub struct FailingWriter;

#[async_trait]
impl CommandWriter for FailingWriter {
    async fn write_command(&mut self, _line: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "controller is gone"))
    }
}

/// The controller side of a fake [`ProcessChannel`].
pub struct FakeController {
    output_tx: Option<mpsc::Sender<OutputChunk>>,
    exit_tx: Option<oneshot::Sender<Option<i32>>>,
    written_rx: mpsc::UnboundedReceiver<String>,
}

impl FakeController {
    /// A channel whose writes are recorded.
    pub fn new() -> (Self, ProcessChannel) {
        let (written_tx, written_rx) = mpsc::unbounded_channel();
        Self::with_writer(RecordingWriter { tx: written_tx }, written_rx)
    }

    /// A channel whose writes all fail.
    pub fn failing() -> (Self, ProcessChannel) {
        let (_, written_rx) = mpsc::unbounded_channel();
        Self::with_writer(FailingWriter, written_rx)
    }

    fn with_writer(
        writer: impl CommandWriter + 'static,
        written_rx: mpsc::UnboundedReceiver<String>,
    ) -> (Self, ProcessChannel) {
        let (output_tx, output_rx) = mpsc::channel(64);
        let (exit_tx, exit_rx) = oneshot::channel();
        let controller = Self {
            output_tx: Some(output_tx),
            exit_tx: Some(exit_tx),
            written_rx,
        };
        (
            controller,
            ProcessChannel::from_parts(writer, output_rx, exit_rx),
        )
    }

    /// Emits `text` on standard output. Returns false once the session no
    /// longer reads output.
    pub async fn print(&self, text: &str) -> bool {
        match &self.output_tx {
            Some(tx) => tx.send(OutputChunk::stdout(text)).await.is_ok(),
            None => false,
        }
    }

    pub async fn print_stderr(&self, text: &str) -> bool {
        match &self.output_tx {
            Some(tx) => tx.send(OutputChunk::stderr(text)).await.is_ok(),
            None => false,
        }
    }

    /// Closes both output streams and reports `code` as the exit status.
    pub fn exit(&mut self, code: Option<i32>) {
        self.output_tx = None;
        if let Some(tx) = self.exit_tx.take() {
            let _ = tx.send(code);
        }
    }

    /// Next command written by the session, if one arrives within a second.
    pub async fn next_command(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(1), self.written_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Commands written so far that were not read yet.
    pub fn drain_commands(&mut self) -> Vec<String> {
        std::iter::from_fn(|| self.written_rx.try_recv().ok()).collect()
    }
}

//! The session actor.
//!
//! One task owns the [`SessionEngine`]. Controller output, the process exit
//! notification, watchdog ticks and requests made through [`SessionHandle`]
//! all arrive at that task, so state changes and queue operations never race
//! with each other. Commands are written from the same task.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::trace;

use crate::config::SessionConfig;
use crate::engine::SessionEngine;
use crate::error::Result;
use crate::error::SessionError;
use crate::events::SessionEvent;
use crate::events::TerminationReason;
use crate::info_tree::InfoTree;
use crate::process::CommandWriter;
use crate::process::OutputChunk;
use crate::process::OutputSource;
use crate::process::ProcessChannel;
use crate::results::TestcaseResults;
use crate::sequencer::ExecutionRequest;
use crate::state::McState;
use crate::watchdog::Watchdog;

#[derive(Debug)]
enum SessionInput {
    Enqueue {
        request: ExecutionRequest,
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        reply: oneshot::Sender<Result<()>>,
    },
    CancelAll {
        reply: oneshot::Sender<usize>,
    },
    RefreshStatus,
    Terminate,
}

/// Client side of a running session. Every request fails with
/// [`SessionError::SessionTerminated`] once the session has ended.
#[derive(Debug)]
pub struct SessionHandle {
    input_tx: mpsc::UnboundedSender<SessionInput>,
    events_tx: broadcast::Sender<SessionEvent>,
    state_rx: watch::Receiver<McState>,
    info_rx: watch::Receiver<Arc<InfoTree>>,
    results: TestcaseResults,
    task: JoinHandle<TerminationReason>,
}

/// Starts the actor for `channel`. The returned receiver sees every event
/// from the first one on.
pub fn start_session(
    channel: ProcessChannel,
    config: &SessionConfig,
) -> (SessionHandle, broadcast::Receiver<SessionEvent>) {
    let results = TestcaseResults::new();
    let engine = SessionEngine::new(results.clone()).with_auto_shutdown(config.auto_shutdown);

    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = broadcast::channel(config.event_capacity.max(1));
    let (state_tx, state_rx) = watch::channel(engine.state());
    let (info_tx, info_rx) = watch::channel(engine.info_tree());

    let actor = SessionActor {
        engine,
        watchdog: Watchdog::new(config.watchdog_delay()),
        events_tx: events_tx.clone(),
        state_tx,
        info_tx,
        termination: None,
    };
    let task = tokio::spawn(actor.run(channel, input_rx));

    let handle = SessionHandle {
        input_tx,
        events_tx,
        state_rx,
        info_rx,
        results,
        task,
    };
    (handle, events_rx)
}

impl SessionHandle {
    pub async fn enqueue(&self, request: ExecutionRequest) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(SessionInput::Enqueue { request, reply })?;
        response.await.map_err(|_| SessionError::SessionTerminated)?
    }

    /// Terminates the MTC once the queue is empty, then exits the controller.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(SessionInput::Shutdown { reply })?;
        response.await.map_err(|_| SessionError::SessionTerminated)?
    }

    /// Drops queued requests that were not dispatched yet.
    pub async fn cancel_all(&self) -> Result<usize> {
        let (reply, response) = oneshot::channel();
        self.send(SessionInput::CancelAll { reply })?;
        response.await.map_err(|_| SessionError::SessionTerminated)
    }

    /// Sends `info` right away instead of waiting for the watchdog.
    pub fn refresh_status(&self) -> Result<()> {
        self.send(SessionInput::RefreshStatus)
    }

    /// Ends the session and kills the controller.
    pub fn terminate(&self) -> Result<()> {
        self.send(SessionInput::Terminate)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    pub fn state(&self) -> McState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<McState> {
        self.state_rx.clone()
    }

    pub fn info_tree(&self) -> Arc<InfoTree> {
        Arc::clone(&self.info_rx.borrow())
    }

    pub fn watch_info_tree(&self) -> watch::Receiver<Arc<InfoTree>> {
        self.info_rx.clone()
    }

    /// Finished test cases. The returned handle stays valid after the session
    /// ends.
    pub fn results(&self) -> TestcaseResults {
        self.results.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the session to end.
    pub async fn wait(self) -> Result<TerminationReason> {
        self.task.await.map_err(|source| {
            debug!(%source, "session task failed");
            SessionError::TaskFailed { source }
        })
    }

    fn send(&self, input: SessionInput) -> Result<()> {
        self.input_tx
            .send(input)
            .map_err(|_| SessionError::SessionTerminated)
    }
}

struct SessionActor {
    engine: SessionEngine,
    watchdog: Watchdog,
    events_tx: broadcast::Sender<SessionEvent>,
    state_tx: watch::Sender<McState>,
    info_tx: watch::Sender<Arc<InfoTree>>,
    termination: Option<TerminationReason>,
}

impl SessionActor {
    async fn run(
        mut self,
        channel: ProcessChannel,
        mut input_rx: mpsc::UnboundedReceiver<SessionInput>,
    ) -> TerminationReason {
        let ProcessChannel {
            mut writer,
            mut output,
            mut exit,
            kill,
        } = channel;

        let (tick_tx, mut tick_rx) = mpsc::channel::<()>(1);
        self.watchdog.start(move || {
            // A tick still waiting to be handled covers this one.
            let _ = tick_tx.try_send(());
        });

        let mut output_open = true;
        let mut exit_pending = true;
        let mut inputs_open = true;
        let mut exit_code = None;

        let reason = loop {
            tokio::select! {
                chunk = output.recv(), if output_open => match chunk {
                    Some(chunk) => {
                        self.watchdog.reset();
                        self.feed(chunk);
                    }
                    None => {
                        output_open = false;
                        self.engine.finish_stream();
                        if !exit_pending {
                            self.engine.terminate(closed_reason(exit_code));
                        }
                    }
                },
                code = &mut exit, if exit_pending => {
                    exit_pending = false;
                    // Output still in the pipes is applied before the session ends.
                    exit_code = code.ok();
                    if !output_open {
                        self.engine.terminate(closed_reason(exit_code));
                    }
                },
                input = input_rx.recv(), if inputs_open => match input {
                    Some(input) => self.handle_input(input),
                    None => inputs_open = false,
                },
                Some(()) = tick_rx.recv() => {
                    trace!(state = %self.engine.state(), "watchdog requesting status");
                    self.engine.request_status();
                },
            }

            self.flush(&mut *writer).await;
            if let Some(reason) = self.termination.clone() {
                break reason;
            }
        };

        self.watchdog.cancel();
        if !matches!(
            reason,
            TerminationReason::ShutdownComplete | TerminationReason::ProcessExited { .. }
        ) {
            kill.cancel();
        }
        // Pending requests learn that the session is gone.
        input_rx.close();
        while let Ok(input) = input_rx.try_recv() {
            self.handle_input(input);
        }
        reason
    }

    fn feed(&mut self, chunk: OutputChunk) {
        match chunk.source {
            OutputSource::Stdout => self.engine.handle_output_bytes(&chunk.bytes),
            OutputSource::Stderr => self.engine.handle_stderr_bytes(&chunk.bytes),
        }
    }

    fn handle_input(&mut self, input: SessionInput) {
        match input {
            SessionInput::Enqueue { request, reply } => {
                let _ = reply.send(self.engine.enqueue(request));
            }
            SessionInput::Shutdown { reply } => {
                let _ = reply.send(self.engine.request_shutdown());
            }
            SessionInput::CancelAll { reply } => {
                let _ = reply.send(self.engine.cancel_all());
            }
            SessionInput::RefreshStatus => self.engine.request_status(),
            SessionInput::Terminate => self.engine.terminate(TerminationReason::Requested),
        }
    }

    /// Writes pending commands, then publishes what changed.
    async fn flush(&mut self, writer: &mut dyn CommandWriter) {
        for command in self.engine.take_commands() {
            if self.engine.is_terminated() {
                break;
            }
            let line = command.to_line();
            trace!(command = %command, "writing command");
            if let Err(err) = writer.write_command(&line).await {
                self.engine.write_failed(err);
                break;
            }
        }

        for event in self.engine.take_events() {
            match &event {
                SessionEvent::StateChanged(change) => {
                    self.state_tx.send_replace(change.current);
                }
                SessionEvent::InfoTreeUpdated(tree) => {
                    self.info_tx.send_replace(Arc::clone(tree));
                }
                SessionEvent::Terminated { reason } => {
                    self.termination = Some(reason.clone());
                }
                _ => {}
            }
            // No subscribers is fine.
            let _ = self.events_tx.send(event);
        }
    }
}

fn closed_reason(exit_code: Option<Option<i32>>) -> TerminationReason {
    match exit_code {
        Some(code) => TerminationReason::ProcessExited { code },
        None => TerminationReason::OutputClosed,
    }
}

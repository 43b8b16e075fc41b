//! Ordered queue of execution requests and the commands that drive them.

use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroU32;

use tracing::debug;

use crate::state::McState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionKind {
    Testcase,
    ControlPart,
    /// The `[EXECUTE]` section of the configuration file the MC was started
    /// with.
    ConfigFile,
}

/// One unit of scheduled work. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    kind: ExecutionKind,
    name: Option<String>,
    repeat_count: NonZeroU32,
}

impl ExecutionRequest {
    pub fn new(kind: ExecutionKind, name: Option<String>, repeat_count: NonZeroU32) -> Self {
        Self {
            kind,
            name,
            repeat_count,
        }
    }

    pub fn testcase(name: impl Into<String>) -> Self {
        Self::new(ExecutionKind::Testcase, Some(name.into()), NonZeroU32::MIN)
    }

    pub fn control_part(module: impl Into<String>) -> Self {
        Self::new(ExecutionKind::ControlPart, Some(module.into()), NonZeroU32::MIN)
    }

    pub fn config_file() -> Self {
        Self::new(ExecutionKind::ConfigFile, None, NonZeroU32::MIN)
    }

    pub fn with_repeat(self, repeat_count: NonZeroU32) -> Self {
        Self {
            repeat_count,
            ..self
        }
    }

    pub fn kind(&self) -> ExecutionKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn repeat_count(&self) -> NonZeroU32 {
        self.repeat_count
    }
}

/// Commands understood by the MC's command line interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McCommand {
    CreateMtc,
    StartExecution {
        kind: ExecutionKind,
        target: Option<String>,
    },
    TerminateMtc,
    Exit,
    Info,
}

impl McCommand {
    /// The exact text written to the MC's standard input.
    pub fn to_line(&self) -> String {
        match self {
            McCommand::CreateMtc => "cmtc\n".to_string(),
            McCommand::StartExecution { target, .. } => {
                format!("smtc {}\n", target.as_deref().unwrap_or_default())
            }
            McCommand::TerminateMtc => "emtc\n".to_string(),
            McCommand::Exit => "exit\n".to_string(),
            McCommand::Info => "info\n".to_string(),
        }
    }

    /// State the MC is expected to enter once it has accepted this command.
    pub fn assumed_state(&self) -> Option<McState> {
        match self {
            McCommand::CreateMtc => Some(McState::CreatingMtc),
            McCommand::StartExecution { .. } => Some(McState::ExecutingTestcase),
            McCommand::TerminateMtc => Some(McState::TerminatingMtc),
            McCommand::Exit => Some(McState::ShuttingDown),
            McCommand::Info => None,
        }
    }
}

impl fmt::Display for McCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_line().trim_end())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ShutdownStage {
    #[default]
    NotRequested,
    Requested,
    MtcTerminationSent,
    ExitSent,
}

#[derive(Debug, Clone)]
struct PendingRequest {
    request: ExecutionRequest,
    remaining: u32,
}

#[derive(Debug, Default)]
pub struct ExecutionSequencer {
    queue: VecDeque<PendingRequest>,
    shutdown: ShutdownStage,
    auto_shutdown: bool,
    config_run_in_progress: bool,
    dispatched: u64,
    halted: bool,
}

impl ExecutionSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown as soon as the queue drains after at least one
    /// execution was started.
    pub fn with_auto_shutdown(mut self, auto_shutdown: bool) -> Self {
        self.auto_shutdown = auto_shutdown;
        self
    }

    pub fn enqueue(&mut self, request: ExecutionRequest) {
        if self.halted {
            debug!(?request, "ignoring request for halted sequencer");
            return;
        }
        let remaining = request.repeat_count.get();
        self.queue.push_back(PendingRequest { request, remaining });
    }

    pub fn request_shutdown(&mut self) {
        if self.shutdown == ShutdownStage::NotRequested {
            self.shutdown = ShutdownStage::Requested;
        }
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown != ShutdownStage::NotRequested
    }

    /// Drops every queued request without dispatching anything. Returns the
    /// number of requests removed.
    pub fn cancel_all(&mut self) -> usize {
        let removed = self.queue.len();
        self.queue.clear();
        removed
    }

    /// Stops the sequencer for good; nothing is dispatched afterwards.
    pub fn halt(&mut self) -> usize {
        self.halted = true;
        self.config_run_in_progress = false;
        self.cancel_all()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn config_run_in_progress(&self) -> bool {
        self.config_run_in_progress
    }

    pub fn finish_config_run(&mut self) {
        self.config_run_in_progress = false;
    }

    /// Snapshot of queued requests in dispatch order.
    pub fn queued(&self) -> Vec<ExecutionRequest> {
        self.queue.iter().map(|p| p.request.clone()).collect()
    }

    /// Number of `smtc` commands still to be sent.
    pub fn pending_executions(&self) -> u64 {
        self.queue.iter().map(|p| u64::from(p.remaining)).sum()
    }

    /// Decides what to send for the MC being in `state`, consuming one
    /// repetition of the head request when an execution is started.
    pub fn next_command(&mut self, state: McState) -> Option<McCommand> {
        if self.halted {
            return None;
        }
        if self.auto_shutdown && self.dispatched > 0 && self.queue.is_empty() {
            self.request_shutdown();
        }
        match state {
            McState::Ready => {
                if let Some(command) = self.pop_execution() {
                    return Some(command);
                }
                if self.shutdown == ShutdownStage::Requested {
                    self.shutdown = ShutdownStage::MtcTerminationSent;
                    return Some(McCommand::TerminateMtc);
                }
                None
            }
            McState::HcConnected | McState::Active => {
                if !self.queue.is_empty() {
                    // Work queued after `emtc` runs on a new MTC, which has
                    // to be terminated again.
                    if self.shutdown == ShutdownStage::MtcTerminationSent {
                        self.shutdown = ShutdownStage::Requested;
                    }
                    return Some(McCommand::CreateMtc);
                }
                self.exit_if_requested()
            }
            McState::Listening | McState::ListeningConfigured => self.exit_if_requested(),
            _ => None,
        }
    }

    fn exit_if_requested(&mut self) -> Option<McCommand> {
        match self.shutdown {
            ShutdownStage::Requested | ShutdownStage::MtcTerminationSent => {
                self.shutdown = ShutdownStage::ExitSent;
                Some(McCommand::Exit)
            }
            ShutdownStage::NotRequested | ShutdownStage::ExitSent => None,
        }
    }

    fn pop_execution(&mut self) -> Option<McCommand> {
        let head = self.queue.front_mut()?;
        head.remaining -= 1;
        let request = if head.remaining == 0 {
            self.queue.pop_front()?.request
        } else {
            head.request.clone()
        };
        if request.kind == ExecutionKind::ConfigFile {
            self.config_run_in_progress = true;
        }
        self.dispatched += 1;
        Some(McCommand::StartExecution {
            kind: request.kind,
            target: request.name,
        })
    }
}

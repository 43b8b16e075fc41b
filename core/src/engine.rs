//! Synchronous core of a session.
//!
//! [`SessionEngine`] turns controller output and user requests into state
//! changes, commands to write and [`SessionEvent`]s. It performs no I/O: the
//! caller writes the commands returned by [`SessionEngine::take_commands`] and
//! forwards the events returned by [`SessionEngine::take_events`].

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::classifier::LineAction;
use crate::classifier::StatusLineClassifier;
use crate::error::Result;
use crate::error::SessionError;
use crate::events::Notification;
use crate::events::SessionEvent;
use crate::events::Severity;
use crate::events::TerminationReason;
use crate::info_tree::DefaultIdentity;
use crate::info_tree::IdentityRule;
use crate::info_tree::InfoTree;
use crate::info_tree::InfoTreeParser;
use crate::info_tree::ParseStep;
use crate::info_tree::merge_trees;
use crate::line_assembler::LineAssembler;
use crate::process::OutputSource;
use crate::results::ExecutedTestcaseRecord;
use crate::results::TestcaseResults;
use crate::sequencer::ExecutionRequest;
use crate::sequencer::ExecutionSequencer;
use crate::sequencer::McCommand;
use crate::state::McState;
use crate::state::StateChange;
use crate::state::StateTracker;

/// States in which a newly connected host controller moves the MC to
/// [`McState::HcConnected`]. Later connections leave the state alone.
const HC_CONNECT_STATES: &[McState] = &[
    McState::Inactive,
    McState::Listening,
    McState::ListeningConfigured,
    McState::Configuring,
    McState::HcConnected,
];

const TESTCASE_START_STATES: &[McState] = &[
    McState::Ready,
    McState::ExecutingControl,
    McState::ExecutingTestcase,
];

pub struct SessionEngine {
    assembler: LineAssembler,
    stderr_assembler: LineAssembler,
    classifier: StatusLineClassifier,
    tracker: StateTracker,
    sequencer: ExecutionSequencer,
    info_parser: Option<InfoTreeParser>,
    /// For every `info` written and not yet answered, the number of
    /// state-changing commands sent before it.
    status_requests: VecDeque<u64>,
    state_commands: u64,
    /// The response being read was requested before the last state-changing
    /// command, so its reported state is out of date.
    stale_response: bool,
    info_tree: Arc<InfoTree>,
    identity: Box<dyn IdentityRule + Send>,
    results: TestcaseResults,
    commands: Vec<McCommand>,
    events: Vec<SessionEvent>,
    terminated: bool,
}

impl Default for SessionEngine {
    fn default() -> Self {
        Self::new(TestcaseResults::new())
    }
}

impl SessionEngine {
    pub fn new(results: TestcaseResults) -> Self {
        Self {
            assembler: LineAssembler::new(),
            stderr_assembler: LineAssembler::new(),
            classifier: StatusLineClassifier::new(),
            tracker: StateTracker::new(),
            sequencer: ExecutionSequencer::new(),
            info_parser: None,
            status_requests: VecDeque::new(),
            state_commands: 0,
            stale_response: false,
            info_tree: Arc::new(InfoTree::default()),
            identity: Box::new(DefaultIdentity),
            results,
            commands: Vec::new(),
            events: Vec::new(),
            terminated: false,
        }
    }

    pub fn with_auto_shutdown(mut self, auto_shutdown: bool) -> Self {
        self.sequencer = std::mem::take(&mut self.sequencer).with_auto_shutdown(auto_shutdown);
        self
    }

    /// Replaces the rule deciding which info tree entries survive a refresh.
    pub fn with_identity_rule(mut self, identity: impl IdentityRule + Send + 'static) -> Self {
        self.identity = Box::new(identity);
        self
    }

    pub fn state(&self) -> McState {
        self.tracker.current()
    }

    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    pub fn info_tree(&self) -> Arc<InfoTree> {
        Arc::clone(&self.info_tree)
    }

    pub fn results(&self) -> &TestcaseResults {
        &self.results
    }

    pub fn sequencer(&self) -> &ExecutionSequencer {
        &self.sequencer
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Commands to write to the controller, in order.
    pub fn take_commands(&mut self) -> Vec<McCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn handle_output_bytes(&mut self, chunk: &[u8]) {
        let lines = self.assembler.feed_bytes(chunk);
        self.handle_lines(lines, OutputSource::Stdout);
    }

    /// Standard error is reassembled separately so its fragments never split
    /// a standard output line. Its lines never take part in an info response.
    pub fn handle_stderr_bytes(&mut self, chunk: &[u8]) {
        let lines = self.stderr_assembler.feed_bytes(chunk);
        self.handle_lines(lines, OutputSource::Stderr);
    }

    pub fn handle_output(&mut self, chunk: &str) {
        let lines = self.assembler.feed(chunk);
        self.handle_lines(lines, OutputSource::Stdout);
    }

    /// Flushes the trailing fragment and any half-read info response once the
    /// output stream has ended.
    pub fn finish_stream(&mut self) {
        let stdout = self.assembler.finish();
        self.handle_lines(stdout.into_iter().collect(), OutputSource::Stdout);
        let stderr = self.stderr_assembler.finish();
        self.handle_lines(stderr.into_iter().collect(), OutputSource::Stderr);
        if let Some(parser) = self.info_parser.take() {
            debug!("output ended inside an info response");
            self.publish_info_tree(parser.finish());
        }
    }

    pub fn enqueue(&mut self, request: ExecutionRequest) -> Result<()> {
        if self.terminated {
            return Err(SessionError::SessionTerminated);
        }
        debug!(?request, "execution request queued");
        self.sequencer.enqueue(request);
        self.dispatch();
        Ok(())
    }

    pub fn request_shutdown(&mut self) -> Result<()> {
        if self.terminated {
            return Err(SessionError::SessionTerminated);
        }
        self.sequencer.request_shutdown();
        self.dispatch();
        Ok(())
    }

    /// Drops every queued request. Returns the number removed.
    pub fn cancel_all(&mut self) -> usize {
        self.sequencer.cancel_all()
    }

    /// Asks the controller for an `info` response.
    pub fn request_status(&mut self) {
        if self.terminated {
            return;
        }
        self.status_requests.push_back(self.state_commands);
        self.commands.push(McCommand::Info);
        self.events
            .push(SessionEvent::CommandSent(McCommand::Info.to_string()));
    }

    pub fn write_failed(&mut self, error: std::io::Error) {
        if self.terminated {
            return;
        }
        let error = SessionError::write(error);
        warn!(%error, "main controller is unreachable");
        self.notify(Severity::Error, error.to_string());
        self.terminate(TerminationReason::WriteFailed {
            message: error.to_string(),
        });
    }

    /// Ends the session. Only the first call has an effect.
    pub fn terminate(&mut self, reason: TerminationReason) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        let dropped = self.sequencer.halt();
        self.info_parser = None;
        self.status_requests.clear();
        self.commands.clear();
        info!(%reason, dropped, "main controller session terminated");
        let change = self.tracker.reset_to_inactive();
        self.record_change(change);
        self.events.push(SessionEvent::Terminated { reason });
    }

    fn handle_lines(&mut self, lines: Vec<String>, source: OutputSource) {
        for line in lines {
            if self.terminated {
                break;
            }
            match source {
                OutputSource::Stdout => self.handle_stdout_line(&line),
                OutputSource::Stderr => self.classify_and_apply(&line, source),
            }
        }
    }

    fn handle_stdout_line(&mut self, line: &str) {
        let severity = Severity::Info;
        if let Some(parser) = self.info_parser.as_mut() {
            match parser.feed(line) {
                ParseStep::Consumed => {
                    self.notify(severity, line);
                    return;
                }
                ParseStep::Finished {
                    tree,
                    unconsumed: None,
                } => {
                    self.info_parser = None;
                    self.notify(severity, line);
                    self.publish_info_tree(tree);
                    return;
                }
                ParseStep::Finished {
                    tree,
                    unconsumed: Some(_),
                } => {
                    self.info_parser = None;
                    self.publish_info_tree(tree);
                }
            }
        }
        self.classify_and_apply(line, OutputSource::Stdout);
    }

    fn classify_and_apply(&mut self, line: &str, source: OutputSource) {
        let classified = self.classifier.classify(line);
        let text = classified.text;
        let severity = match (&classified.action, source) {
            (LineAction::StartupError(_) | LineAction::McError(_), _) => Severity::Error,
            (_, OutputSource::Stdout) => Severity::Info,
            (_, OutputSource::Stderr) => Severity::Warning,
        };
        self.notify(severity, text.clone());

        let change = match classified.action {
            LineAction::Listening { address, port } => {
                debug!(?address, ?port, "main controller is listening");
                self.tracker
                    .observe(&[McState::Inactive], McState::Listening, &text)
            }
            LineAction::HcConnected { from } => {
                debug!(from = %from, "host controller connected");
                self.tracker
                    .observe(HC_CONNECT_STATES, McState::HcConnected, &text)
            }
            LineAction::MtcCreated => self.tracker.observe(&[], McState::Ready, &text),
            LineAction::TestcaseStarted { name } => {
                debug!(name = %name, "test case started");
                self.tracker
                    .observe(TESTCASE_START_STATES, McState::ExecutingTestcase, &text)
            }
            LineAction::TestcaseFinished {
                name,
                verdict,
                reason,
            } => {
                let record = ExecutedTestcaseRecord::now(name, verdict, reason);
                self.results.push(record.clone());
                self.events.push(SessionEvent::TestcaseFinished(record));
                None
            }
            LineAction::ExecutionFinished => {
                if self.sequencer.config_run_in_progress() {
                    debug!("execution finished inside a config file run");
                    None
                } else {
                    self.tracker.observe(&[], McState::Ready, &text)
                }
            }
            LineAction::ExecuteSectionFinished => {
                self.sequencer.finish_config_run();
                self.tracker.observe(&[], McState::Ready, &text)
            }
            LineAction::TerminatingMtc => {
                self.tracker.observe(&[], McState::TerminatingMtc, &text)
            }
            LineAction::MtcTerminated => self.tracker.observe(&[], McState::Active, &text),
            LineAction::ShuttingDown => self.tracker.observe(&[], McState::ShuttingDown, &text),
            LineAction::ShutdownComplete => {
                self.terminate(TerminationReason::ShutdownComplete);
                return;
            }
            LineAction::InfoBegin if source == OutputSource::Stdout => {
                self.stale_response = self
                    .status_requests
                    .pop_front()
                    .is_some_and(|sent_after| sent_after < self.state_commands);
                self.info_parser = Some(InfoTreeParser::new());
                None
            }
            LineAction::InfoBegin
            | LineAction::StartupError(_)
            | LineAction::McError(_)
            | LineAction::Banner
            | LineAction::PassThrough => None,
        };
        if change.is_some() {
            self.record_change(change);
            self.dispatch();
        }
    }

    fn publish_info_tree(&mut self, tree: InfoTree) {
        let merged = merge_trees(&self.info_tree, tree, self.identity.as_ref());
        let reported = merged.state_info.clone();
        self.info_tree = Arc::new(merged);
        self.events
            .push(SessionEvent::InfoTreeUpdated(Arc::clone(&self.info_tree)));
        if std::mem::take(&mut self.stale_response) {
            debug!(?reported, "ignoring state of a response requested before the last command");
            return;
        }
        if let Some(name) = reported {
            let change = self.tracker.report(&name);
            self.record_change(change);
            self.dispatch();
        }
    }

    fn dispatch(&mut self) {
        if self.terminated {
            return;
        }
        let state = self.tracker.current();
        let Some(command) = self.sequencer.next_command(state) else {
            return;
        };
        debug!(%command, %state, "dispatching command");
        self.events.push(SessionEvent::CommandSent(command.to_string()));
        if let Some(next) = command.assumed_state() {
            let change = self.tracker.assume(state, next);
            self.record_change(change);
        }
        self.state_commands += 1;
        self.commands.push(command);
    }

    fn record_change(&mut self, change: Option<StateChange>) {
        if let Some(change) = change {
            self.events.push(SessionEvent::StateChanged(change));
        }
    }

    fn notify(&mut self, severity: Severity, text: impl Into<String>) {
        self.events
            .push(SessionEvent::Notification(Notification::new(severity, text)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use std::num::NonZeroU32;

    use crate::state::StateSource;

    fn lines(commands: Vec<McCommand>) -> Vec<String> {
        commands.iter().map(McCommand::to_line).collect()
    }

    fn terminations(events: &[SessionEvent]) -> usize {
        events
            .iter()
            .filter(|event| matches!(event, SessionEvent::Terminated { .. }))
            .count()
    }

    fn ready_engine() -> SessionEngine {
        let mut engine = SessionEngine::default();
        engine.handle_output(" MTC is created.\n");
        engine.take_events();
        engine
    }

    #[test]
    fn hc_connected_line_moves_to_hc_connected() {
        let mut engine = SessionEngine::default();
        engine.handle_output("MC@host: New HC connected from 1.2.3.4\n");
        assert_eq!(engine.state(), McState::HcConnected);
        assert!(engine.take_commands().is_empty());
    }

    #[test]
    fn enqueue_in_ready_writes_one_smtc_and_assumes_execution() {
        let mut engine = SessionEngine::default();
        engine.handle_output(" MTC is created.\n");
        assert_eq!(engine.state(), McState::Ready);

        engine
            .enqueue(ExecutionRequest::testcase("tc1"))
            .expect("session is running");
        assert_eq!(lines(engine.take_commands()), vec!["smtc tc1\n"]);
        assert_eq!(engine.state(), McState::ExecutingTestcase);
        assert_eq!(engine.tracker().source(), StateSource::Assumed);
    }

    #[test]
    fn finished_testcase_is_recorded() {
        let mut engine = SessionEngine::default();
        engine.handle_output("MTC@host: Test case tc1 finished. Verdict: pass\n");
        let records = engine.results().snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "tc1");
        assert_eq!(records[0].verdict, "pass");
        assert_eq!(records[0].reason, "");
        assert!(
            engine
                .take_events()
                .iter()
                .any(|event| matches!(event, SessionEvent::TestcaseFinished(r) if r.name == "tc1"))
        );
    }

    #[test]
    fn info_response_with_one_host_and_no_components() {
        let mut engine = SessionEngine::default();
        engine.handle_output(concat!(
            "MC information:\n",
            " host information:\n",
            "  - hc1.example.com [10.0.0.5]:\n",
            "     operating system: Linux 6.1\n",
            "     HC state: active\n",
            "     no components on this host.\n",
            "MC2> ",
        ));
        // The prompt stays buffered; the response ends on the next line.
        engine.handle_output("MC@host: Test execution finished.\n");

        let tree = engine.info_tree();
        assert_eq!(tree.hosts.len(), 1);
        assert!(tree.hosts[0].components.is_empty());
        assert_eq!(tree.hosts[0].ip_address, "10.0.0.5");
        assert_eq!(tree.state_info, None);
        assert_eq!(tree.pause_info, None);
        assert_eq!(tree.console_logging_info, None);
        // Without a reported state name the tracked state is untouched by
        // the response; the line that ended it was still classified.
        assert_eq!(engine.state(), McState::Ready);
    }

    #[test]
    fn write_failure_clears_queue_and_terminates_once() {
        let mut engine = ready_engine();
        engine
            .enqueue(ExecutionRequest::testcase("tc1"))
            .expect("session is running");
        engine
            .enqueue(ExecutionRequest::testcase("tc2"))
            .expect("session is running");
        engine
            .enqueue(ExecutionRequest::testcase("tc3"))
            .expect("session is running");
        let sent = engine.take_commands();
        assert_eq!(lines(sent), vec!["smtc tc1\n"]);
        assert_eq!(engine.sequencer().pending_executions(), 2);

        let error = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "process gone");
        engine.write_failed(error);
        engine.write_failed(std::io::Error::other("still gone"));
        engine.terminate(TerminationReason::OutputClosed);

        assert!(engine.is_terminated());
        assert_eq!(engine.state(), McState::Inactive);
        assert_eq!(engine.sequencer().pending_executions(), 0);
        let events = engine.take_events();
        assert_eq!(terminations(&events), 1);
        assert_matches!(
            events.last(),
            Some(SessionEvent::Terminated {
                reason: TerminationReason::WriteFailed { .. }
            })
        );
        assert_matches!(
            engine.enqueue(ExecutionRequest::testcase("tc4")),
            Err(SessionError::SessionTerminated)
        );
        assert!(engine.take_commands().is_empty());
    }

    #[test]
    fn reported_state_wins_over_assumed_state() {
        let mut engine = ready_engine();
        engine
            .enqueue(ExecutionRequest::testcase("tc1").with_repeat(NonZeroU32::MIN))
            .expect("session is running");
        engine.take_commands();
        assert_eq!(engine.state(), McState::ExecutingTestcase);

        engine.handle_output("MC information:\n MC state: paused after testcase\n");
        engine.handle_output(" pause function: on\n console logging: on\n");
        assert_eq!(engine.state(), McState::Paused);
        assert_eq!(engine.tracker().source(), StateSource::Reported);
        assert_eq!(
            engine.info_tree().pause_info.as_deref(),
            Some("on")
        );

        // A queued request cannot push the state back from paused.
        engine
            .enqueue(ExecutionRequest::testcase("tc2"))
            .expect("session is running");
        assert!(engine.take_commands().is_empty());
        assert_eq!(engine.state(), McState::Paused);
    }

    #[test]
    fn full_run_drains_queue_and_shuts_down() {
        let mut engine = SessionEngine::default().with_auto_shutdown(true);
        engine.handle_output("MC2> Listening on TCP port 7339.\n");
        assert_eq!(engine.state(), McState::Listening);
        engine
            .enqueue(ExecutionRequest::control_part("Demo"))
            .expect("session is running");
        assert!(engine.take_commands().is_empty());

        engine.handle_output("MC@mc: New HC connected from hc1.\n");
        assert_eq!(lines(engine.take_commands()), vec!["cmtc\n"]);
        assert_eq!(engine.state(), McState::CreatingMtc);

        engine.handle_output("MC@mc: MTC is created.\n");
        assert_eq!(lines(engine.take_commands()), vec!["smtc Demo\n"]);

        engine.handle_output("MTC@mc: Test case tc finished. Verdict: fail reason: boom\n");
        engine.handle_output("MC@mc: Test execution finished.\n");
        assert_eq!(lines(engine.take_commands()), vec!["emtc\n"]);

        engine.handle_output("MC@mc: Terminating MTC.\nMC@mc: MTC terminated.\n");
        assert_eq!(lines(engine.take_commands()), vec!["exit\n"]);
        assert_eq!(engine.state(), McState::ShuttingDown);

        engine.handle_output("MC@mc: Shutdown complete.\n");
        assert!(engine.is_terminated());
        assert_eq!(engine.results().snapshot()[0].reason, "boom");
        let events = engine.take_events();
        assert_eq!(terminations(&events), 1);
        assert_matches!(
            events.last(),
            Some(SessionEvent::Terminated {
                reason: TerminationReason::ShutdownComplete
            })
        );
    }

    #[test]
    fn config_run_waits_for_execute_section_to_finish() {
        let mut engine = ready_engine();
        engine
            .enqueue(ExecutionRequest::config_file())
            .expect("session is running");
        engine
            .enqueue(ExecutionRequest::testcase("after"))
            .expect("session is running");
        assert_eq!(lines(engine.take_commands()), vec!["smtc \n"]);

        engine.handle_output("MC@mc: Test execution finished.\n");
        assert_eq!(engine.state(), McState::ExecutingTestcase);
        assert!(engine.take_commands().is_empty());

        engine.handle_output("MC@mc: Execution of [EXECUTE] section finished.\n");
        assert_eq!(lines(engine.take_commands()), vec!["smtc after\n"]);
    }

    #[test]
    fn status_request_writes_info_without_changing_state() {
        let mut engine = ready_engine();
        engine.request_status();
        assert_eq!(engine.take_commands(), vec![McCommand::Info]);
        assert_eq!(engine.state(), McState::Ready);
    }

    #[test]
    fn stream_end_flushes_fragment_and_partial_response() {
        let mut engine = SessionEngine::default();
        engine.handle_output("MC information:\n MC state: ready\n host information:\n");
        engine.handle_output("  - 10.0.0.1:\n     HC state: active");
        engine.finish_stream();

        let tree = engine.info_tree();
        assert_eq!(tree.state_info.as_deref(), Some("ready"));
        assert_eq!(tree.hosts.len(), 1);
        assert_eq!(tree.hosts[0].state.as_deref(), Some("active"));
        assert_eq!(engine.state(), McState::Ready);
    }

    #[test]
    fn stderr_line_inside_info_response_leaves_it_intact() {
        let mut engine = SessionEngine::default();
        engine.handle_output_bytes(
            b"MC information:\n MC state: ready\n host information:\n  - hc1 [10.0.0.1]:\n",
        );
        engine.handle_stderr_bytes(b"some warning on stderr\n");
        engine.handle_output_bytes(concat!(
            "     operating system: Linux\n",
            "     HC state: active\n",
            "     no components on this host.\n",
            " pause function: off\n",
            " console logging: on\n",
        ).as_bytes());

        let tree = engine.info_tree();
        assert_eq!(tree.hosts.len(), 1);
        assert_eq!(tree.hosts[0].operating_system.as_deref(), Some("Linux"));
        assert_eq!(tree.pause_info.as_deref(), Some("off"));
        assert_eq!(tree.console_logging_info.as_deref(), Some("on"));

        let warnings: Vec<_> = engine
            .take_events()
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::Notification(n) if n.severity == Severity::Warning => Some(n.text),
                _ => None,
            })
            .collect();
        assert_eq!(warnings, vec!["some warning on stderr".to_string()]);
    }

    #[test]
    fn stderr_lines_are_classified_but_never_open_a_response() {
        let mut engine = SessionEngine::default();
        engine.handle_stderr_bytes(b"MC information:\nMC@mc: Error: Connection refused\n");
        engine.handle_stderr_bytes(b"MC@mc: MTC is created.\n");
        assert_eq!(engine.state(), McState::Ready);

        let severities: Vec<_> = engine
            .take_events()
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::Notification(n) => Some(n.severity),
                _ => None,
            })
            .collect();
        assert_eq!(
            severities,
            vec![Severity::Warning, Severity::Error, Severity::Warning]
        );
    }

    #[test]
    fn finished_line_with_trailing_whitespace_is_recorded() {
        let mut engine = SessionEngine::default();
        engine.handle_output("MTC@host: Test case tc1 finished. Verdict: pass \n");
        engine.handle_output("MTC@host: Test case tc2 finished. Verdict: fail reason: boom  \n");
        let records = engine.results().snapshot();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].verdict, "pass");
        assert_eq!(records[1].verdict, "fail");
        assert_eq!(records[1].reason, "boom");
    }

    #[test]
    fn response_requested_before_a_dispatch_does_not_dispatch_again() {
        let mut engine = ready_engine();
        engine.request_status();
        engine
            .enqueue(ExecutionRequest::testcase("tc1"))
            .expect("session is running");
        engine
            .enqueue(ExecutionRequest::testcase("tc2"))
            .expect("session is running");
        assert_eq!(lines(engine.take_commands()), vec!["info\n", "smtc tc1\n"]);

        engine.handle_output("MC information:\n MC state: ready\n pause function: off\n");
        engine.handle_output(" console logging: on\n");
        assert!(engine.take_commands().is_empty());
        assert_eq!(engine.state(), McState::ExecutingTestcase);
        assert_eq!(engine.info_tree().state_info.as_deref(), Some("ready"));

        // A status requested after the dispatch is current again.
        engine.request_status();
        engine.handle_output("MC information:\n MC state: ready\n console logging: on\n");
        assert_eq!(
            lines(engine.take_commands()),
            vec!["info\n", "smtc tc2\n"]
        );
    }

    #[test]
    fn lines_after_termination_are_ignored() {
        let mut engine = SessionEngine::default();
        engine.terminate(TerminationReason::Requested);
        engine.handle_output(" MTC is created.\n");
        assert_eq!(engine.state(), McState::Inactive);
    }
}

use std::ffi::OsString;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use mcctl_core::ExecutedTestcaseRecord;
use mcctl_core::ExecutionRequest;
use mcctl_core::SessionConfig;
use mcctl_core::SessionEvent;
use mcctl_core::Severity;
use mcctl_core::TerminationReason;
use mcctl_core::spawn_main_controller;
use mcctl_core::start_session;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing::warn;

/// Runs test cases through a TTCN-3 main controller started in command line
/// mode.
#[derive(Debug, Parser)]
#[command(name = "mcctl", version)]
pub struct Cli {
    /// TOML file with session settings.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Seconds of controller silence before its status is queried. 0 turns
    /// the query off.
    #[arg(long, value_name = "SECS")]
    pub watchdog_secs: Option<u64>,

    /// Terminate the MTC and exit the controller once everything ran.
    #[arg(long)]
    pub auto_shutdown: bool,

    /// Run the `[EXECUTE]` section of the controller's configuration file.
    /// Runs before any control part or test case.
    #[arg(long)]
    pub execute_config: bool,

    /// Module whose control part should run. May be repeated.
    #[arg(long = "control-part", value_name = "MODULE")]
    pub control_parts: Vec<String>,

    /// Test case to run, as `module.testcase`. May be repeated.
    #[arg(long = "testcase", value_name = "NAME")]
    pub testcases: Vec<String>,

    /// How many times each requested element runs.
    #[arg(long, value_name = "N", default_value_t = NonZeroU32::MIN)]
    pub repeat: NonZeroU32,

    /// Controller program followed by its arguments.
    #[arg(last = true, required = true, value_name = "MC_COMMAND")]
    pub command: Vec<OsString>,
}

impl Cli {
    fn session_config(&self) -> Result<SessionConfig> {
        let mut config = match &self.settings {
            Some(path) => SessionConfig::load(path)?,
            None => SessionConfig::default(),
        };
        if let Some(secs) = self.watchdog_secs {
            config.watchdog_delay_secs = secs;
        }
        config.auto_shutdown |= self.auto_shutdown;
        Ok(config)
    }

    fn requests(&self) -> Vec<ExecutionRequest> {
        let config_run = self
            .execute_config
            .then(ExecutionRequest::config_file)
            .into_iter();
        let control_parts = self
            .control_parts
            .iter()
            .map(|module| ExecutionRequest::control_part(module.as_str()));
        let testcases = self
            .testcases
            .iter()
            .map(|name| ExecutionRequest::testcase(name.as_str()));
        config_run
            .chain(control_parts)
            .chain(testcases)
            .map(|request| request.with_repeat(self.repeat))
            .collect()
    }
}

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.session_config()?;
    let Some((program, args)) = cli.command.split_first() else {
        anyhow::bail!("no main controller command given");
    };
    let channel = spawn_main_controller(program, args)
        .with_context(|| format!("could not start {}", program.to_string_lossy()))?;
    let (handle, mut events) = start_session(channel, &config);

    for request in cli.requests() {
        handle.enqueue(request).await?;
    }

    let reason = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::Terminated { reason }) => break reason,
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event printer fell behind");
                }
                Err(RecvError::Closed) => break TerminationReason::OutputClosed,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, terminating main controller");
                let _ = handle.terminate();
            }
        }
    };
    info!(%reason, "session ended");

    let results = handle.results().snapshot();
    print_summary(&results);
    Ok(if succeeded(&reason, &results) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Notification(notification) => match notification.severity {
            Severity::Info => println!("{}", notification.text),
            Severity::Warning | Severity::Error => eprintln!("{}", notification.text),
        },
        SessionEvent::StateChanged(change) => {
            info!(from = %change.previous, to = %change.current, "state");
        }
        SessionEvent::CommandSent(command) => info!(command = %command, "sent"),
        SessionEvent::InfoTreeUpdated(tree) => {
            info!(hosts = tree.hosts.len(), "status refreshed");
        }
        SessionEvent::TestcaseFinished(_) | SessionEvent::Terminated { .. } => {}
    }
}

fn print_summary(results: &[ExecutedTestcaseRecord]) {
    if results.is_empty() {
        return;
    }
    println!();
    println!("Executed test cases:");
    for record in results {
        if record.reason.is_empty() {
            println!("  {}: {}", record.name, record.verdict);
        } else {
            println!("  {}: {} ({})", record.name, record.verdict, record.reason);
        }
    }
}

/// A run succeeds when the controller ended normally and no test case
/// failed.
fn succeeded(reason: &TerminationReason, results: &[ExecutedTestcaseRecord]) -> bool {
    let normal_end = match reason {
        TerminationReason::ShutdownComplete | TerminationReason::Requested => true,
        TerminationReason::ProcessExited { code } => *code == Some(0),
        TerminationReason::OutputClosed | TerminationReason::WriteFailed { .. } => false,
    };
    normal_end
        && !results
            .iter()
            .any(|record| matches!(record.verdict.as_str(), "fail" | "error"))
}

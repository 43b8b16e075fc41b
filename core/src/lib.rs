//! Supervision of a TTCN-3 Main Controller (MC) process over its text
//! console.
//!
//! The MC has no structured protocol. Its state is inferred from the lines it
//! prints, work is fed to it one `smtc` at a time, and an `info` probe is
//! sent whenever it has been quiet for a while. Start with
//! [`session::start_session`] for a running process, or drive a
//! [`engine::SessionEngine`] directly.

pub mod classifier;
pub mod config;
pub mod engine;
mod error;
pub mod events;
pub mod info_tree;
pub mod line_assembler;
pub mod process;
pub mod results;
pub mod sequencer;
pub mod session;
pub mod state;
pub mod watchdog;

pub use config::SessionConfig;
pub use engine::SessionEngine;
pub use error::Result;
pub use error::SessionError;
pub use events::Notification;
pub use events::SessionEvent;
pub use events::Severity;
pub use events::TerminationReason;
pub use info_tree::InfoTree;
pub use process::ProcessChannel;
pub use process::spawn_main_controller;
pub use results::ExecutedTestcaseRecord;
pub use results::TestcaseResults;
pub use sequencer::ExecutionKind;
pub use sequencer::ExecutionRequest;
pub use session::SessionHandle;
pub use session::start_session;
pub use state::McState;

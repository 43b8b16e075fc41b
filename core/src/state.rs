//! The assumed main controller state and the rules for changing it.
//!
//! Three kinds of transitions exist:
//!
//! * observed: a lifecycle line was read from the controller output;
//! * reported: the controller printed its own state name in the `info`
//!   response. This is authoritative and always overwrites;
//! * assumed: a command was written and the state it will most likely cause
//!   is recorded ahead of confirmation. An assumed transition only applies
//!   when the current state equals the command's precondition, so it can
//!   never replace a state that something else has since established.

use std::fmt;

use tracing::debug;
use tracing::warn;

/// State used when the controller reports a state name this crate does not
/// know. Unknown names have historically been treated as `ready` so that
/// queued work keeps flowing; keep it that way unless the controller's state
/// vocabulary changes.
pub const UNKNOWN_STATE_FALLBACK: McState = McState::Ready;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum McState {
    #[default]
    Inactive,
    Listening,
    ListeningConfigured,
    Configuring,
    HcConnected,
    Active,
    CreatingMtc,
    Ready,
    ExecutingControl,
    ExecutingTestcase,
    TerminatingTestcase,
    Paused,
    TerminatingMtc,
    ShuttingDown,
}

impl McState {
    pub const ALL: [McState; 14] = [
        McState::Inactive,
        McState::Listening,
        McState::ListeningConfigured,
        McState::Configuring,
        McState::HcConnected,
        McState::Active,
        McState::CreatingMtc,
        McState::Ready,
        McState::ExecutingControl,
        McState::ExecutingTestcase,
        McState::TerminatingTestcase,
        McState::Paused,
        McState::TerminatingMtc,
        McState::ShuttingDown,
    ];

    /// The name the controller itself uses for this state.
    pub fn mc_name(self) -> &'static str {
        match self {
            McState::Inactive => "inactive",
            McState::Listening => "listening",
            McState::ListeningConfigured => "listening (configured)",
            McState::Configuring => "configuring...",
            McState::HcConnected => "HC connected",
            McState::Active => "active",
            McState::CreatingMtc => "creating MTC...",
            McState::Ready => "ready",
            McState::ExecutingControl => "executing control part",
            McState::ExecutingTestcase => "executing testcase",
            McState::TerminatingTestcase => "terminating testcase...",
            McState::Paused => "paused after testcase",
            McState::TerminatingMtc => "terminating MTC...",
            McState::ShuttingDown => "shutting down...",
        }
    }

    /// Looks up a controller state name. Case and a trailing `...` are
    /// ignored.
    pub fn from_mc_name(name: &str) -> Option<McState> {
        let wanted = normalize_name(name);
        McState::ALL
            .into_iter()
            .find(|state| normalize_name(state.mc_name()) == wanted)
    }

    /// Like [`McState::from_mc_name`] but falls back to
    /// [`UNKNOWN_STATE_FALLBACK`].
    pub fn from_mc_name_or_fallback(name: &str) -> McState {
        McState::from_mc_name(name).unwrap_or_else(|| {
            warn!(
                reported = name,
                fallback = %UNKNOWN_STATE_FALLBACK,
                "unknown main controller state name"
            );
            UNKNOWN_STATE_FALLBACK
        })
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().trim_end_matches('.').trim().to_ascii_lowercase()
}

impl fmt::Display for McState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mc_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSource {
    /// Initial value or set by a terminal event.
    Initial,
    /// Derived from a lifecycle line.
    Observed,
    /// Reported verbatim by the controller.
    Reported,
    /// Guessed from a command that was just written.
    Assumed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub previous: McState,
    pub current: McState,
    pub source: StateSource,
}

#[derive(Debug, Clone)]
pub struct StateTracker {
    current: McState,
    previous: McState,
    source: StateSource,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self {
            current: McState::Inactive,
            previous: McState::Inactive,
            source: StateSource::Initial,
        }
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> McState {
        self.current
    }

    pub fn previous(&self) -> McState {
        self.previous
    }

    pub fn source(&self) -> StateSource {
        self.source
    }

    /// Applies a transition caused by a lifecycle line. `allowed_from` lists
    /// the states in which the line is expected; an empty slice accepts any
    /// state. Lines arriving in other states are ignored.
    pub fn observe(
        &mut self,
        allowed_from: &[McState],
        next: McState,
        line: &str,
    ) -> Option<StateChange> {
        if !allowed_from.is_empty() && !allowed_from.contains(&self.current) {
            debug!(
                state = %self.current,
                line,
                "ignoring lifecycle line in unexpected state"
            );
            return None;
        }
        self.set(next, StateSource::Observed)
    }

    /// Applies the state name printed by the controller. Always wins.
    pub fn report(&mut self, mc_name: &str) -> Option<StateChange> {
        let next = McState::from_mc_name_or_fallback(mc_name);
        self.set(next, StateSource::Reported)
    }

    /// Records the expected effect of a command that is being written. Only
    /// applies when the tracker is still in `precondition`.
    pub fn assume(&mut self, precondition: McState, next: McState) -> Option<StateChange> {
        if self.current != precondition {
            debug!(
                state = %self.current,
                expected = %precondition,
                assumed = %next,
                "not applying assumed transition"
            );
            return None;
        }
        self.set(next, StateSource::Assumed)
    }

    /// Forces the terminal state after the session ended.
    pub fn reset_to_inactive(&mut self) -> Option<StateChange> {
        self.set(McState::Inactive, StateSource::Initial)
    }

    fn set(&mut self, next: McState, source: StateSource) -> Option<StateChange> {
        self.source = source;
        if next == self.current {
            return None;
        }
        let change = StateChange {
            previous: self.current,
            current: next,
            source,
        };
        debug!(previous = %self.current, current = %next, ?source, "main controller state changed");
        self.previous = self.current;
        self.current = next;
        Some(change)
    }
}

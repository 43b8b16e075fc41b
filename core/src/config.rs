use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;
use crate::error::SessionError;

pub const DEFAULT_WATCHDOG_DELAY_SECS: u64 = 10;
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Session settings, usually read from a TOML file:
///
/// ```toml
/// watchdog_delay_secs = 30
/// auto_shutdown = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Seconds without controller output before an `info` probe is sent.
    /// Zero disables the probe.
    pub watchdog_delay_secs: u64,
    /// Terminate the MTC and exit once every queued request has run.
    pub auto_shutdown: bool,
    /// Buffered events per subscriber before slow subscribers lag.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            watchdog_delay_secs: DEFAULT_WATCHDOG_DELAY_SECS,
            auto_shutdown: false,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| SessionError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| SessionError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn watchdog_delay(&self) -> Duration {
        Duration::from_secs(self.watchdog_delay_secs)
    }
}

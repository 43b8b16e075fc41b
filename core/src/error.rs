use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to spawn main controller: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },
    #[error("main controller process has no {0} pipe")]
    MissingPipe(&'static str),
    #[error("failed to write command to main controller: {source}")]
    Write {
        #[source]
        source: std::io::Error,
    },
    #[error("session is terminated")]
    SessionTerminated,
    #[error("session task failed: {source}")]
    TaskFailed {
        #[source]
        source: tokio::task::JoinError,
    },
    #[error("failed to read config file {}: {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl SessionError {
    pub(crate) fn spawn(source: std::io::Error) -> Self {
        Self::Spawn { source }
    }

    pub(crate) fn write(source: std::io::Error) -> Self {
        Self::Write { source }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

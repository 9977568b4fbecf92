// src/errors.rs

//! Crate-wide error type and result alias.

use std::time::Duration;

use thiserror::Error;

use crate::background::CancelReason;

#[derive(Error, Debug)]
pub enum ExecwatchError {
    /// The remote command could not be launched. Fatal to the caller; never
    /// retried here.
    #[error("failed to start `{command}` on {target}: {source}")]
    Start {
        target: String,
        command: String,
        #[source]
        source: anyhow::Error,
    },

    /// A bounded wait expired without success.
    #[error("timed out after {waited:?}: {description}")]
    Timeout { description: String, waited: Duration },

    /// An in-flight wait was cancelled by its handle or scope.
    #[error("cancelled ({reason}): {description}")]
    Cancelled {
        description: String,
        reason: CancelReason,
    },

    /// The output stream closed before the expected line appeared.
    #[error("stream ended (exit code {exit_code:?}) before: {description}")]
    StreamEnded {
        description: String,
        exit_code: Option<i32>,
    },

    /// A probe reported an error while polling with `abort_on_error`.
    #[error("probe aborted: {description}: {source}")]
    ProbeAborted {
        description: String,
        #[source]
        source: anyhow::Error,
    },

    /// A one-shot command exited unsuccessfully.
    #[error("command `{command}` failed with exit code {exit_code:?}: {stderr}")]
    Command {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("invalid pattern: {0}")]
    RegexError(#[from] regex::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExecwatchError {
    /// True for the cancellation kind, which callers tearing down a scope
    /// should not report as a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecwatchError::Cancelled { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecwatchError::Timeout { .. })
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ExecwatchError>;

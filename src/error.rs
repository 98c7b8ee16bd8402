//! Error taxonomy for the project store and its collaborators.
//!
//! Malformed project files never show up here: the extractor reports them as
//! "value not found". Only conflicts, exhaustion, persistence failures and
//! external process failures are surfaced to the caller.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("project already exists: {0}")]
    ProjectExists(String),

    #[error("invalid project name {0:?}: use letters, digits, `-` and `_`")]
    InvalidName(String),

    #[error("port {0} is outside 1-65535")]
    InvalidPort(u16),

    #[error("cache database {index} is outside the configured range {min}-{max}")]
    CacheDbOutOfRange { index: u32, min: u32, max: u32 },

    #[error("port {port} is already in use by {holder}")]
    PortConflict { port: u16, holder: String },

    #[error("cache database {index} is already in use by {holder}")]
    CacheDbConflict { index: u32, holder: String },

    #[error("no cache databases available in range {min}-{max}")]
    CacheDbExhausted { min: u32, max: u32 },

    #[error("failed to persist projects to {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("command `{command}` failed with exit code {code}")]
    CommandFailed {
        command: String,
        code: i32,
        output: String,
    },

    #[error("required tool not found on PATH: {0}")]
    MissingTool(String),

    #[error("no frontend directory with a package.json found for {0}")]
    NoFrontendDir(String),

    #[error("failed to move {} to the trash: {reason}", path.display())]
    Trash { path: PathBuf, reason: String },

    #[error("failed to signal process {pid}: {reason}")]
    ProcessSignal { pid: u32, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

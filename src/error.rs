use thiserror::Error;

/// Conditions that abort a run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid locate state '{0}' (expected on/off)")]
    InvalidState(String),

    #[error("unknown locate tool '{0}' (expected storcli, sas3ircu or sas2ircu)")]
    UnknownTool(String),

    #[error("locate tool '{0}' not found in PATH")]
    ToolUnavailable(&'static str),

    #[error("no enclosure management tool found (storcli, sas3ircu, sas2ircu)")]
    NoLocateTool,

    #[error("no such drive: {0}")]
    UnknownDrive(String),

    #[error("drive {drive} at '{location}' has no controller:enclosure:slot address")]
    NotLocatable { drive: String, location: String },

    #[error("{program} exited with status {code}")]
    CommandFailed { program: String, code: i32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

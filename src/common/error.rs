//! Error types for doc-check
//!
//! Error messages are meant to be read in CI logs, so they name the host,
//! path or attempt count involved and hint at how to fix the problem.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for doc-check
#[derive(Error, Debug)]
pub enum Error {
    // === Connection Errors ===
    #[error("Failed to connect to script server at {host}:{port} after {attempts} attempts")]
    ConnectionExhausted {
        host: String,
        port: u16,
        attempts: u32,
    },

    #[error("Script server closed the connection")]
    ServerClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Server request '{command}' failed: {message}")]
    RequestFailed { command: String, message: String },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    // === Launcher Errors ===
    #[error("Failed to launch server command: {0}")]
    LaunchFailed(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Run Outcome ===
    #[error("Errors were found in the following files:\n{}", format_paths(.0))]
    FilesFailed(Vec<PathBuf>),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a file read error for a path
    pub fn file_read(path: &std::path::Path, error: &io::Error) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Create a request failed error
    pub fn request_failed(command: &str, message: &str) -> Self {
        Self::RequestFailed {
            command: command.to_string(),
            message: message.to_string(),
        }
    }
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Outcome of submitting one snippet to a session
///
/// `Execution` is the server rejecting the script itself; everything else
/// that goes wrong on the way is `Transport`. An expected-failure snippet
/// only passes on `Execution`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Script execution failed: {0}")]
    Execution(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<Error> for SubmitError {
    fn from(e: Error) -> Self {
        Self::Transport(e.to_string())
    }
}

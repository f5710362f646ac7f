//! doc-check - documentation snippet test harness
//!
//! This library extracts runnable snippets from source files and Markdown
//! documents, submits them to a remote script server, and classifies each
//! file as skipped, succeeded or failed.

pub mod cli;
pub mod commands;
pub mod common;
pub mod extract;
pub mod files;
pub mod launcher;
pub mod runner;
pub mod session;

// Re-export commonly used types for tests
pub use common::{Error, Result, SubmitError};
pub use runner::{FileOutcome, RunConfig, RunState, Runner};
pub use session::{ServerTarget, SessionKind};

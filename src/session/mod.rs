//! Sessions against the remote script server
//!
//! The run orchestrator only sees the [`Session`] and [`Connector`]
//! capabilities; [`client::ScriptClient`] is the TCP implementation used by
//! the CLI, and tests substitute fakes.

pub mod client;
pub mod codec;
pub mod connect;
pub mod types;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::{Result, SubmitError};

pub use client::{ScriptClient, TcpConnector};
pub use connect::{connect_with_retry, RetryPolicy};

/// Scripting language of the server session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Python,
    Groovy,
}

impl SessionKind {
    /// Language name sent to the server and used as the fence info string
    pub fn language(&self) -> &'static str {
        match self {
            SessionKind::Python => "python",
            SessionKind::Groovy => "groovy",
        }
    }

    /// Extension of plain code files run whole
    pub fn code_extension(&self) -> &'static str {
        match self {
            SessionKind::Python => ".py",
            SessionKind::Groovy => ".groovy",
        }
    }

    /// Line prefix that opens a runnable Markdown block
    pub fn fence_start(&self) -> String {
        format!("```{}", self.language())
    }

    /// Line prefix that closes a Markdown block
    pub fn fence_end(&self) -> &'static str {
        "```"
    }
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.language())
    }
}

/// Where to find the server and what kind of session to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTarget {
    pub host: String,
    pub port: u16,
    pub kind: SessionKind,
}

impl ServerTarget {
    pub fn new(host: impl Into<String>, port: u16, kind: SessionKind) -> Self {
        Self {
            host: host.into(),
            port,
            kind,
        }
    }
}

impl std::fmt::Display for ServerTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} ({})", self.host, self.port, self.kind)
    }
}

/// A live, exclusively owned connection to the script server
///
/// One session must never see overlapping submissions; `&mut self` enforces
/// that. Dropping a session releases it without a close handshake.
#[async_trait]
pub trait Session: Send {
    /// Run a script, distinguishing server-side script failures from
    /// transport faults
    async fn run(&mut self, code: &str) -> std::result::Result<(), SubmitError>;
}

/// Opens sessions; a single attempt, retries live in [`connect_with_retry`]
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &ServerTarget) -> Result<Box<dyn Session>>;
}

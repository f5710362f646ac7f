//! Common utilities shared across the crate

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result, SubmitError};

/// Parse a "listening at:" address from server output.
/// Handles IPv6 format [::]:PORT by converting to 127.0.0.1:PORT
pub fn parse_listen_address(line: &str) -> Option<String> {
    let addr_start = line.find("listening at:")?;
    let addr = line[addr_start + "listening at:".len()..].trim();
    if let Some(port) = addr.strip_prefix("[::]:") {
        Some(format!("127.0.0.1:{port}"))
    } else {
        Some(addr.to_string())
    }
}

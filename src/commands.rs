//! CLI argument definitions
//!
//! Long options keep their underscore spelling; hyphenated aliases and the
//! abbreviations `--mr`, `--rbf`, `--dc` and `--ip` are accepted too.

use clap::Args;
use std::path::PathBuf;

use crate::session::SessionKind;

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Script server host
    pub host: String,

    /// Script server port
    pub port: u16,

    /// Session type, which also selects the Markdown fence language and code file extension
    #[arg(value_enum)]
    pub session_kind: SessionKind,

    /// Directory to run, or a file listing files/directories to run, one per line
    pub run_path: PathBuf,

    /// Maximum consecutive connection attempts [default: 25, or the config file value]
    #[arg(long = "max_retries", visible_aliases = ["max-retries", "mr"])]
    pub max_retries: Option<u32>,

    /// Restart the server after this many snippets have run on one session.
    /// Use 0 to restart after every snippet. Requires --docker_compose
    #[arg(long = "reset_between_files", visible_aliases = ["reset-between-files", "rbf"])]
    pub reset_between_files: Option<u32>,

    /// Compose command that starts and stops the server, e.g. "docker compose -f <path>"
    #[arg(long = "docker_compose", visible_aliases = ["docker-compose", "dc"])]
    pub docker_compose: Option<String>,

    /// Directory to ignore, or a file listing files/directories to ignore
    #[arg(long = "ignore_path", visible_aliases = ["ignore-path", "ip"])]
    pub ignore_path: Option<PathBuf>,

    /// Only run files tagged with this docker-config profile ("default" for untagged files)
    #[arg(long)]
    pub profile: Option<String>,

    /// Configuration file to use instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,
}

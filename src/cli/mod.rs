//! CLI entry point
//!
//! Merges command-line options over the configuration file, wires the
//! real collaborators into the runner, and reports the outcome.

use std::time::Duration;

use crate::commands::RunArgs;
use crate::common::config::Config;
use crate::common::Result;
use crate::files::WalkDirLister;
use crate::launcher::ComposeLauncher;
use crate::runner::{self, RunConfig, Runner};
use crate::session::{RetryPolicy, ServerTarget, TcpConnector};

/// Build the run parameters from arguments and configuration
pub fn run_config(args: &RunArgs, config: &Config) -> RunConfig {
    let retry = RetryPolicy::new(
        args.max_retries.unwrap_or(config.connection.max_retries),
        config.connection.retry_interval(),
    );
    RunConfig {
        target: ServerTarget::new(args.host.clone(), args.port, args.session_kind),
        run_path: args.run_path.clone(),
        ignore_path: args.ignore_path.clone(),
        retry,
        reset_threshold: args.reset_between_files,
        profile: args.profile.clone(),
        markers: config.markers.clone(),
    }
}

/// The compose command, from the command line or the configuration file
pub fn compose_command(args: &RunArgs, config: &Config) -> Option<String> {
    args.docker_compose
        .clone()
        .or_else(|| config.launcher.compose.clone())
}

/// Run one pass and report it
pub async fn dispatch(args: RunArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let run_config = run_config(&args, &config);
    let connector = TcpConnector {
        connect_timeout: Duration::from_secs(config.connection.connect_timeout_secs),
        request_timeout: Duration::from_secs(config.connection.request_timeout_secs),
    };
    let launcher = compose_command(&args, &config).map(ComposeLauncher::new);

    let mut runner = Runner::new(&connector, &WalkDirLister);
    if let Some(launcher) = &launcher {
        runner = runner.with_launcher(launcher);
    }

    let state = runner.run(&run_config).await?;
    runner::report(&state)
}

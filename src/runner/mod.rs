//! Run orchestration
//!
//! Drives one pass over the resolved files: extract each file, submit its
//! snippets to the session one at a time, and classify the file once all
//! of its snippets have been tried. A bad snippet never hides the results
//! of its siblings.
//!
//! Only connection exhaustion, launcher spawn failures and configuration
//! errors abort the pass; everything that goes wrong with a single file is
//! recorded against that file.

pub mod report;
mod state;

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::common::config::MarkerConfig;
use crate::common::{Error, Result, SubmitError};
use crate::extract::{self, FenceSyntax, SourceKind};
use crate::files::{self, FileLister};
use crate::launcher::ProcessLauncher;
use crate::session::{connect_with_retry, Connector, RetryPolicy, ServerTarget, Session};

pub use report::report;
pub use state::{FileOutcome, RunState};

/// Parameters of one pass
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub target: ServerTarget,
    pub run_path: PathBuf,
    pub ignore_path: Option<PathBuf>,
    pub retry: RetryPolicy,
    /// Reset the server once more than this many snippets ran on a session
    pub reset_threshold: Option<u32>,
    /// Only run files of this server profile
    pub profile: Option<String>,
    pub markers: MarkerConfig,
}

impl RunConfig {
    pub fn new(target: ServerTarget, run_path: impl Into<PathBuf>, retry: RetryPolicy) -> Self {
        Self {
            target,
            run_path: run_path.into(),
            ignore_path: None,
            retry,
            reset_threshold: None,
            profile: None,
            markers: MarkerConfig::default(),
        }
    }
}

/// The orchestrator, wired to its collaborators
pub struct Runner<'a> {
    connector: &'a dyn Connector,
    lister: &'a dyn FileLister,
    launcher: Option<&'a dyn ProcessLauncher>,
}

impl<'a> Runner<'a> {
    pub fn new(connector: &'a dyn Connector, lister: &'a dyn FileLister) -> Self {
        Self {
            connector,
            lister,
            launcher: None,
        }
    }

    pub fn with_launcher(mut self, launcher: &'a dyn ProcessLauncher) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Run every resolved, non-ignored file and return the outcome buckets
    pub async fn run(&self, config: &RunConfig) -> Result<RunState> {
        if config.reset_threshold.is_some() && self.launcher.is_none() {
            return Err(Error::Config(
                "--reset_between_files requires --docker_compose to restart the server".to_string(),
            ));
        }

        let started = Instant::now();

        let run_files = files::resolve(Some(config.run_path.as_path()), self.lister)?;
        let ignored = files::resolve(config.ignore_path.as_deref(), self.lister)?;
        if run_files.is_empty() {
            tracing::warn!("No files found under {}", config.run_path.display());
        }

        if let Some(launcher) = self.launcher {
            launcher.start().await?;
        }
        let mut session = connect_with_retry(self.connector, &config.target, &config.retry).await?;

        let syntax = FenceSyntax::new(config.target.kind, config.markers.clone());
        let code_extension = config.target.kind.code_extension();
        let mut state = RunState::default();

        for path in run_files {
            if ignored.contains(&path) {
                tracing::info!("{} flagged to skip. Skipping", path.display());
                state.record(path, FileOutcome::Skipped);
                continue;
            }

            let Some(kind) = SourceKind::classify(&path, code_extension) else {
                tracing::info!(
                    "{} does not end with a supported extension. Skipping",
                    path.display()
                );
                state.record(path, FileOutcome::Skipped);
                continue;
            };

            if let Some(profile) = &config.profile {
                match extract::file_profile(&path, kind) {
                    Ok(p) if p == *profile => {}
                    Ok(p) => {
                        tracing::info!("{} belongs to profile {}. Skipping", path.display(), p);
                        state.record(path, FileOutcome::Skipped);
                        continue;
                    }
                    Err(e) => {
                        tracing::error!("{}", e);
                        state.record(path, FileOutcome::Failed);
                        continue;
                    }
                }
            }

            tracing::info!("Reading file {}", path.display());
            let outcome = self
                .run_file(&path, kind, &syntax, &mut session, &mut state, config)
                .await?;
            state.record(path, outcome);
        }

        state.elapsed = started.elapsed();
        Ok(state)
    }

    async fn run_file(
        &self,
        path: &Path,
        kind: SourceKind,
        syntax: &FenceSyntax,
        session: &mut Box<dyn Session>,
        state: &mut RunState,
        config: &RunConfig,
    ) -> Result<FileOutcome> {
        let group = match extract::extract(path, kind, syntax) {
            Ok(group) => group,
            Err(e) => {
                tracing::error!("{}", e);
                return Ok(FileOutcome::Failed);
            }
        };

        if group.is_empty() {
            tracing::info!("No code found in {}, skipping", path.display());
            return Ok(FileOutcome::Skipped);
        }

        let mut failed = false;

        for script in &group.should_run {
            match session.run(script).await {
                Ok(()) => {}
                Err(SubmitError::Execution(message)) => {
                    tracing::error!("Script error running code in {}: {}", path.display(), message);
                    failed = true;
                }
                Err(SubmitError::Transport(message)) => {
                    tracing::error!(
                        "Unexpected error running code in {}: {}",
                        path.display(),
                        message
                    );
                    failed = true;
                }
            }
            self.after_submission(session, state, config).await?;
        }

        for script in &group.should_fail {
            match session.run(script).await {
                Err(SubmitError::Execution(message)) => {
                    tracing::debug!("Failed as expected in {}: {}", path.display(), message);
                }
                Ok(()) => {
                    tracing::error!(
                        "Code in {} marked should-fail ran without error",
                        path.display()
                    );
                    failed = true;
                }
                Err(SubmitError::Transport(message)) => {
                    tracing::error!(
                        "Unexpected error running code in {}: {}",
                        path.display(),
                        message
                    );
                    failed = true;
                }
            }
            self.after_submission(session, state, config).await?;
        }

        Ok(if failed {
            FileOutcome::Failed
        } else {
            FileOutcome::Succeeded
        })
    }

    /// Count a submission and reset the server once past the threshold
    async fn after_submission(
        &self,
        session: &mut Box<dyn Session>,
        state: &mut RunState,
        config: &RunConfig,
    ) -> Result<()> {
        state.submissions += 1;
        state.submissions_since_reset += 1;

        let Some(threshold) = config.reset_threshold else {
            return Ok(());
        };
        if state.submissions_since_reset <= threshold {
            return Ok(());
        }
        let launcher = self
            .launcher
            .ok_or_else(|| Error::Internal("reset requested without a launcher".to_string()))?;

        tracing::info!(
            "Resetting script server after {} snippets",
            state.submissions_since_reset
        );
        launcher.stop().await?;
        launcher.start().await?;
        *session = connect_with_retry(self.connector, &config.target, &config.retry).await?;
        state.submissions_since_reset = 0;
        state.resets += 1;
        Ok(())
    }
}

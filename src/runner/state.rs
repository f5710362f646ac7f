//! Per-run bookkeeping

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Terminal classification of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Not runnable, ignored, or no snippet to submit
    Skipped,
    /// Every submitted snippet met its expected outcome
    Succeeded,
    /// At least one snippet violated its expected outcome
    Failed,
}

/// Counters and outcome buckets of one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    pub skipped: Vec<PathBuf>,
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
    /// Submissions since the session was last (re)established
    pub submissions_since_reset: u32,
    /// Submissions over the whole pass
    pub submissions: usize,
    /// Server resets performed
    pub resets: u32,
    pub elapsed: Duration,
}

impl RunState {
    pub fn record(&mut self, path: PathBuf, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Skipped => self.skipped.push(path),
            FileOutcome::Succeeded => self.succeeded.push(path),
            FileOutcome::Failed => self.failed.push(path),
        }
    }

    pub fn outcome_of(&self, path: &Path) -> Option<FileOutcome> {
        if self.failed.iter().any(|p| p == path) {
            Some(FileOutcome::Failed)
        } else if self.succeeded.iter().any(|p| p == path) {
            Some(FileOutcome::Succeeded)
        } else if self.skipped.iter().any(|p| p == path) {
            Some(FileOutcome::Skipped)
        } else {
            None
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Number of classified files
    pub fn file_count(&self) -> usize {
        self.skipped.len() + self.succeeded.len() + self.failed.len()
    }
}

//! End-of-run summary and exit status

use std::path::PathBuf;

use colored::Colorize;

use crate::common::{Error, Result};

use super::RunState;

/// Render the summary: timing, then each non-empty bucket
pub fn render(state: &RunState) -> String {
    let mut out = format!(
        "{} {} files, {} snippets in {:.1}s",
        "Ran".blue().bold(),
        state.file_count(),
        state.submissions,
        state.elapsed.as_secs_f64()
    );
    if state.resets > 0 {
        out.push_str(&format!(" ({} server resets)", state.resets));
    }
    out.push('\n');

    section(&mut out, &"The following files were skipped:".dimmed().to_string(), &state.skipped);
    section(
        &mut out,
        &"The following files ran without error:".green().to_string(),
        &state.succeeded,
    );
    section(
        &mut out,
        &"Errors were found in the following files:".red().bold().to_string(),
        &state.failed,
    );
    out
}

fn section(out: &mut String, title: &str, files: &[PathBuf]) {
    if files.is_empty() {
        return;
    }
    out.push_str(title);
    out.push('\n');
    for file in files {
        out.push_str(&format!("  {}\n", file.display()));
    }
}

/// Print the summary and turn failures into an error carrying the failed files
pub fn report(state: &RunState) -> Result<()> {
    print!("{}", render(state));

    if state.has_failures() {
        Err(Error::FilesFailed(state.failed.clone()))
    } else {
        Ok(())
    }
}

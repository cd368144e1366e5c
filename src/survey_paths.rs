//! Home-based storage paths for survey diagnostics.
//!
//! Everything lives under `~/.modelx-survey/` (or `$SURVEY_HOME`):
//! - `logs/survey.log` - tracing output
//! - `logs/<log-id>/events.jsonl` - structured state machine log
//!
//! Survey answers are never written here.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

const SURVEY_DIR: &str = ".modelx-survey";

/// Overrides the home directory, mainly for tests and sandboxes.
pub const SURVEY_HOME_ENV: &str = "SURVEY_HOME";

/// Returns the survey home directory, creating it if needed.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined or the
/// directory cannot be created.
pub fn survey_home_dir() -> Result<PathBuf> {
    let dir = match std::env::var(SURVEY_HOME_ENV) {
        Ok(custom) if !custom.trim().is_empty() => PathBuf::from(custom),
        _ => dirs::home_dir()
            .context("Could not determine home directory for survey logs")?
            .join(SURVEY_DIR),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create survey directory: {}", dir.display()))?;
    Ok(dir)
}

/// Returns `<home>/logs/`, creating it if needed.
pub fn logs_dir() -> Result<PathBuf> {
    let dir = survey_home_dir()?.join("logs");
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;
    Ok(dir)
}

/// Returns the tracing log path: `<home>/logs/survey.log`
pub fn tracing_log_path() -> Result<PathBuf> {
    Ok(logs_dir()?.join("survey.log"))
}

/// Returns the structured log directory for one process run:
/// `<home>/logs/<log-id>/`
pub fn run_logs_dir(log_id: &str) -> Result<PathBuf> {
    let dir = logs_dir()?.join(log_id);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create run log directory: {}", dir.display()))?;
    Ok(dir)
}

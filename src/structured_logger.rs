//! JSONL trail of everything the survey did, one object per line.
//!
//! Entries carry a monotonic `seq`, a microsecond UTC timestamp and the
//! process-level `log_id`, which also names the log directory. `run_id`
//! starts at 1 and moves on every reset, and `survey_session_id` follows the
//! survey session the state machine is on, so one file can hold several
//! respondents back to back. Answer values never appear here, only their
//! shape; this file is never read back by the survey.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::errors::SurveyError;
use crate::state_machine::{SurveyCommand, SurveyEvent};

const LOG_FILE_NAME: &str = "events.jsonl";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

const MACHINE: &str = "StateMachine";
const TUI: &str = "TUI";
const GENERATION: &str = "Generation";

/// One line of `events.jsonl`.
#[derive(Serialize, Deserialize)]
pub struct LogEntry {
    pub seq: u64,
    pub ts: String,
    pub log_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_session_id: Option<String>,
    pub run_id: u64,
    pub component: String,
    pub event: Value,
}

/// What the state machine saw for one `apply` call.
#[derive(Serialize)]
#[serde(tag = "type")]
enum MachineRecord<'a> {
    Command { machine_seq: u64, command: Value },
    Event { machine_seq: u64, event: &'a SurveyEvent },
    Rejected { machine_seq: u64, error: String },
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum FrontEndRecord<'a> {
    UserInput { key: &'a str, context: &'a str },
    Finished { ticket: u64, success: bool, elapsed_ms: u128 },
}

pub struct StructuredLogger {
    log_id: String,
    survey_session_id: Mutex<Option<String>>,
    run_id: AtomicU64,
    seq: AtomicU64,
    sink: Mutex<File>,
    log_path: PathBuf,
}

impl StructuredLogger {
    /// Opens (or appends to) `<logs_dir>/events.jsonl`, creating the
    /// directory when needed.
    pub fn new(log_id: &str, logs_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(logs_dir)?;
        let log_path = logs_dir.join(LOG_FILE_NAME);
        let sink = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            log_id: log_id.to_string(),
            survey_session_id: Mutex::new(None),
            run_id: AtomicU64::new(1),
            seq: AtomicU64::new(0),
            sink: Mutex::new(sink),
            log_path,
        })
    }

    pub fn increment_run_id(&self) {
        self.run_id.fetch_add(1, Ordering::SeqCst);
    }

    /// Stamps later entries with the survey session they belong to.
    pub fn set_survey_session(&self, session_id: &str) {
        if let Ok(mut current) = self.survey_session_id.lock() {
            *current = Some(session_id.to_string());
        }
    }

    /// Writes one entry. Safe to call from any thread; write failures are
    /// swallowed since the log never drives behavior.
    pub fn log(&self, component: &str, event: impl Serialize) {
        let entry = LogEntry {
            seq: self.seq.fetch_add(1, Ordering::SeqCst) + 1,
            ts: Utc::now().format(TIMESTAMP_FORMAT).to_string(),
            log_id: self.log_id.clone(),
            survey_session_id: self
                .survey_session_id
                .lock()
                .ok()
                .and_then(|current| current.clone()),
            run_id: self.run_id.load(Ordering::SeqCst),
            component: component.to_string(),
            event: serde_json::to_value(event).unwrap_or(Value::Null),
        };
        let Ok(line) = serde_json::to_string(&entry) else {
            return;
        };
        if let Ok(mut sink) = self.sink.lock() {
            let _ = writeln!(sink, "{}", line);
            let _ = sink.flush();
        }
    }

    pub fn log_command(&self, machine_seq: u64, command: &SurveyCommand) {
        self.log(
            MACHINE,
            MachineRecord::Command {
                machine_seq,
                command: command.log_value(),
            },
        );
    }

    pub fn log_event(&self, machine_seq: u64, event: &SurveyEvent) {
        self.log(MACHINE, MachineRecord::Event { machine_seq, event });
    }

    pub fn log_rejection(&self, machine_seq: u64, error: &SurveyError) {
        self.log(
            MACHINE,
            MachineRecord::Rejected {
                machine_seq,
                error: error.to_string(),
            },
        );
    }

    /// `context` names the screen the key was pressed on.
    pub fn log_user_input(&self, key: &str, context: &str) {
        self.log(TUI, FrontEndRecord::UserInput { key, context });
    }

    pub fn log_generation(&self, ticket: u64, success: bool, elapsed_ms: u128) {
        self.log(
            GENERATION,
            FrontEndRecord::Finished {
                ticket,
                success,
                elapsed_ms,
            },
        );
    }

    pub fn path(&self) -> &PathBuf {
        &self.log_path
    }
}

#[cfg(test)]
#[path = "tests/structured_logger_tests.rs"]
mod tests;

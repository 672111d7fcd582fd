use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Severity of a job log entry, least severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Append-only log shared between a job and its observers.
///
/// Every entry is also emitted through `tracing`, tagged with the job id.
#[derive(Debug, Clone)]
pub struct JobLog {
    job: Option<Uuid>,
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Default for JobLog {
    fn default() -> Self {
        Self::new()
    }
}

impl JobLog {
    /// A log not attached to any job, used by dry runs.
    pub fn new() -> Self {
        Self {
            job: None,
            entries: Arc::default(),
        }
    }

    pub(crate) fn for_job(id: Uuid) -> Self {
        Self {
            job: Some(id),
            entries: Arc::default(),
        }
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        let job = self.job.map(|id| id.to_string()).unwrap_or_default();
        match level {
            LogLevel::Debug => tracing::debug!(%job, "{message}"),
            LogLevel::Info => tracing::info!(%job, "{message}"),
            LogLevel::Warn => tracing::warn!(%job, "{message}"),
            LogLevel::Error => tracing::error!(%job, "{message}"),
        }
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogEntry {
                timestamp: Utc::now(),
                level,
                message,
            });
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Entries at `level` or more severe.
    pub fn logs_from(&self, level: LogLevel) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.level >= level)
            .cloned()
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        !self.logs_from(LogLevel::Error).is_empty()
    }
}

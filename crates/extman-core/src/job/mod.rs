//! Jobs: a request, its state, its log and its outcome.
//!
//! A [`Job`] is a cheap handle. Clones observe the same job, so the
//! executor's worker and the caller share state through it.

mod group;
mod log;

pub use group::JobGroupPath;
pub use log::{JobLog, LogEntry, LogLevel};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::apply::InstalledSet;
use crate::error::JobError;
use crate::request::JobRequest;

/// What a finished job produced.
pub type JobOutcome = std::result::Result<InstalledSet, Vec<JobError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Submitted, waiting for its group path.
    Pending,
    Running,
    Finished,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Cooperative cancellation flag, checked between planning and apply steps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A point-in-time view of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub id: Uuid,
    pub request: JobRequest,
    pub group: JobGroupPath,
    pub state: JobState,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub log: Vec<LogEntry>,
    /// Errors of a finished job, empty on success.
    #[serde(skip)]
    pub errors: Vec<JobError>,
}

#[derive(Debug)]
struct Progress {
    state: JobState,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    outcome: Option<JobOutcome>,
}

#[derive(Debug)]
struct JobInner {
    id: Uuid,
    request: JobRequest,
    group: JobGroupPath,
    submitted_at: DateTime<Utc>,
    log: JobLog,
    cancel: CancelToken,
    progress: Mutex<Progress>,
    changed: Condvar,
}

#[derive(Debug, Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

impl Job {
    pub(crate) fn new(request: JobRequest) -> Self {
        let id = Uuid::new_v4();
        let group = request.group_path();
        Self {
            inner: Arc::new(JobInner {
                id,
                request,
                group,
                submitted_at: Utc::now(),
                log: JobLog::for_job(id),
                cancel: CancelToken::new(),
                progress: Mutex::new(Progress {
                    state: JobState::Pending,
                    started_at: None,
                    finished_at: None,
                    outcome: None,
                }),
                changed: Condvar::new(),
            }),
        }
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.inner
            .progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn request(&self) -> &JobRequest {
        &self.inner.request
    }

    pub fn group(&self) -> &JobGroupPath {
        &self.inner.group
    }

    pub fn state(&self) -> JobState {
        self.progress().state
    }

    pub fn log(&self) -> &JobLog {
        &self.inner.log
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.inner.cancel
    }

    /// Ask the job to stop before its next step. A job that already applied
    /// changes reverts them.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
        self.inner.log.warn("cancellation requested");
    }

    pub fn status(&self) -> JobStatus {
        let progress = self.progress();
        JobStatus {
            id: self.inner.id,
            request: self.inner.request.clone(),
            group: self.inner.group.clone(),
            state: progress.state,
            submitted_at: self.inner.submitted_at,
            started_at: progress.started_at,
            finished_at: progress.finished_at,
            log: self.inner.log.entries(),
            errors: match &progress.outcome {
                Some(Err(errors)) => errors.clone(),
                _ => Vec::new(),
            },
        }
    }

    /// Block until the job finishes and return its outcome.
    pub fn join(&self) -> JobOutcome {
        let mut progress = self.progress();
        loop {
            if let Some(outcome) = &progress.outcome {
                return outcome.clone();
            }
            progress = self
                .inner
                .changed
                .wait(progress)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub(crate) fn start(&self) {
        let mut progress = self.progress();
        progress.state = JobState::Running;
        progress.started_at = Some(Utc::now());
        drop(progress);
        self.inner.log.info(format!("started {}", self.inner.request));
        self.inner.changed.notify_all();
    }

    pub(crate) fn finish(&self, outcome: JobOutcome) {
        match &outcome {
            Ok(set) => self
                .inner
                .log
                .info(format!("finished, {} action(s) applied", set.len())),
            Err(errors) => self
                .inner
                .log
                .error(format!("finished with {} error(s)", errors.len())),
        }
        let mut progress = self.progress();
        progress.state = JobState::Finished;
        progress.finished_at = Some(Utc::now());
        progress.outcome = Some(outcome);
        drop(progress);
        self.inner.changed.notify_all();
    }
}

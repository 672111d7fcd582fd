//! Runs jobs on worker threads with group-path mutual exclusion.
//!
//! Each job holds its [`JobGroupPath`] while running. A job whose path
//! conflicts with a running one either waits, in state `Pending`, or is
//! rejected at submission, depending on the [`ConflictPolicy`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use extman_extension::ConflictPolicy;
use tracing::debug;

use crate::error::{ExecutorError, JobError};
use crate::job::{Job, JobGroupPath, JobOutcome, JobState};
use crate::request::JobRequest;

#[derive(Debug, Default)]
struct Shared {
    /// Groups held by running jobs, and under `Reject`, by accepted ones.
    active: Mutex<Vec<Job>>,
    released: Condvar,
    jobs: Mutex<Vec<Job>>,
}

impl Shared {
    fn active(&self) -> MutexGuard<'_, Vec<Job>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, job: &Job) {
        self.active().retain(|j| j.id() != job.id());
        self.released.notify_all();
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobExecutor {
    policy: ConflictPolicy,
    shared: Arc<Shared>,
}

impl JobExecutor {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self {
            policy,
            shared: Arc::default(),
        }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Start `work` for `request` on its own thread.
    ///
    /// # Errors
    ///
    /// [`ExecutorError::GroupBusy`] under [`ConflictPolicy::Reject`] when a
    /// conflicting job is active.
    pub fn submit<F>(&self, request: JobRequest, work: F) -> std::result::Result<Job, ExecutorError>
    where
        F: FnOnce(&Job) -> JobOutcome + Send + 'static,
    {
        let job = Job::new(request);

        if self.policy == ConflictPolicy::Reject {
            let mut active = self.shared.active();
            if Self::conflicting_job(&active, job.group()).is_some() {
                return Err(ExecutorError::GroupBusy {
                    group: job.group().clone(),
                });
            }
            active.push(job.clone());
        }

        let shared = Arc::clone(&self.shared);
        let worker = job.clone();
        let policy = self.policy;
        thread::Builder::new()
            .name(format!("extman-job-{}", job.id()))
            .spawn(move || run(&shared, &worker, policy, work))
            .map_err(|e| {
                self.shared.release(&job);
                ExecutorError::Spawn {
                    message: e.to_string(),
                }
            })?;

        debug!(job = %job.id(), group = %job.group(), "Submitted job");
        self.shared
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(job.clone());
        Ok(job)
    }

    fn conflicting_job<'j>(active: &'j [Job], group: &JobGroupPath) -> Option<&'j Job> {
        active.iter().find(|j| j.group().conflicts_with(group))
    }

    /// The running job holding `group` or a path conflicting with it.
    pub fn current_job(&self, group: &JobGroupPath) -> Option<Job> {
        Self::conflicting_job(&self.shared.active(), group)
            .filter(|j| j.state() == JobState::Running)
            .cloned()
    }

    /// Every job submitted to this executor, oldest first.
    pub fn jobs(&self) -> Vec<Job> {
        self.shared
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn run<F>(shared: &Shared, job: &Job, policy: ConflictPolicy, work: F)
where
    F: FnOnce(&Job) -> JobOutcome,
{
    if policy == ConflictPolicy::Wait {
        let mut active = shared.active();
        while JobExecutor::conflicting_job(&active, job.group()).is_some() {
            job.log().debug(format!("waiting for job group {}", job.group()));
            active = shared
                .released
                .wait(active)
                .unwrap_or_else(PoisonError::into_inner);
        }
        active.push(job.clone());
    }

    job.start();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(job))).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic".to_string());
        Err(vec![JobError::Aborted { message }])
    });
    shared.release(job);
    job.finish(outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::InstalledSet;
    use crate::request::InstallRequest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    fn request(namespace: &str) -> JobRequest {
        InstallRequest::new().with_namespace(namespace).into()
    }

    #[test]
    fn test_same_group_jobs_never_overlap() {
        let executor = JobExecutor::new(ConflictPolicy::Wait);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs: Vec<Job> = (0..4)
            .map(|_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                executor
                    .submit(request("wiki"), move |_| {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok(InstalledSet::default())
                    })
                    .unwrap()
            })
            .collect();

        for job in &jobs {
            assert!(job.join().is_ok());
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(executor.jobs().len(), 4);
    }

    #[test]
    fn test_reject_policy_refuses_conflicting_job() {
        let executor = JobExecutor::new(ConflictPolicy::Reject);
        let (release, wait) = mpsc::channel::<()>();
        let first = executor
            .submit(request("wiki"), move |_| {
                let _ = wait.recv();
                Ok(InstalledSet::default())
            })
            .unwrap();

        let err = executor
            .submit(JobRequest::Install(InstallRequest::new()), |_| Ok(InstalledSet::default()))
            .unwrap_err();
        assert_eq!(
            err,
            ExecutorError::GroupBusy {
                group: JobGroupPath::root()
            }
        );

        let other = executor
            .submit(request("other"), |_| Ok(InstalledSet::default()))
            .unwrap();
        assert!(other.join().is_ok());

        release.send(()).unwrap();
        assert!(first.join().is_ok());
        assert!(executor.submit(request("wiki"), |_| Ok(InstalledSet::default())).is_ok());
    }

    #[test]
    fn test_waiting_job_stays_pending() {
        let executor = JobExecutor::new(ConflictPolicy::Wait);
        let (release, wait) = mpsc::channel::<()>();
        let (started, on_start) = mpsc::channel::<()>();
        let first = executor
            .submit(request("wiki"), move |_| {
                started.send(()).unwrap();
                let _ = wait.recv();
                Ok(InstalledSet::default())
            })
            .unwrap();
        on_start.recv().unwrap();

        let second = executor
            .submit(request("wiki"), |_| Ok(InstalledSet::default()))
            .unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(first.state(), JobState::Running);
        assert_eq!(second.state(), JobState::Pending);
        let current = executor.current_job(&JobGroupPath::namespace("wiki")).unwrap();
        assert_eq!(current.id(), first.id());

        release.send(()).unwrap();
        assert!(second.join().is_ok());
        assert!(first.join().is_ok());
        assert_eq!(first.state(), JobState::Finished);
    }

    #[test]
    fn test_panicking_job_releases_group() {
        let executor = JobExecutor::new(ConflictPolicy::Wait);
        let failed = executor
            .submit(request("wiki"), |_| panic!("boom"))
            .unwrap();
        assert_eq!(
            failed.join(),
            Err(vec![JobError::Aborted {
                message: "boom".into()
            }])
        );

        let next = executor
            .submit(request("wiki"), |_| Ok(InstalledSet::default()))
            .unwrap();
        assert!(next.join().is_ok());
    }
}

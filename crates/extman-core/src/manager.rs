//! The extension manager facade.

use std::sync::Arc;

use extman_extension::{
    ConflictPolicy, CoreExtensionRepository, DirectoryExtensionRepository,
    ExtensionManagerConfig, ExtensionRepositoryManager, LocalExtension, LocalExtensionRepository,
};
use tracing::info;

use crate::apply::PlanApplier;
use crate::error::{Error, JobError, ResolutionError, Result};
use crate::executor::JobExecutor;
use crate::job::{CancelToken, Job, JobLog, JobOutcome};
use crate::plan::{ExtensionPlan, InstallPlanner, UninstallPlanner};
use crate::request::{InstallRequest, JobRequest, UninstallRequest};

/// Entry point tying the repositories to the job executor.
///
/// Collaborators are explicit: a core repository, the local repository and
/// the manager over remote repositories. Cloning is cheap and clones share
/// the executor.
#[derive(Debug, Clone)]
pub struct ExtensionManager {
    core: Arc<CoreExtensionRepository>,
    local: Arc<LocalExtensionRepository>,
    remote: Arc<ExtensionRepositoryManager>,
    executor: JobExecutor,
}

impl ExtensionManager {
    pub fn new(
        core: Arc<CoreExtensionRepository>,
        local: Arc<LocalExtensionRepository>,
        remote: Arc<ExtensionRepositoryManager>,
    ) -> Self {
        Self {
            core,
            local,
            remote,
            executor: JobExecutor::new(ConflictPolicy::default()),
        }
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.executor = JobExecutor::new(policy);
        self
    }

    /// Build every collaborator from configuration.
    pub fn from_config(config: &ExtensionManagerConfig) -> Result<Self> {
        let core = Arc::new(CoreExtensionRepository::from_config(&config.core));
        let root = config
            .local_repository_path()
            .ok_or(Error::NoLocalRepository)?;
        let local = Arc::new(LocalExtensionRepository::open(&root, Arc::clone(&core))?);

        let mut remote = ExtensionRepositoryManager::new();
        for repository in &config.repositories {
            remote.add_repository(Arc::new(DirectoryExtensionRepository::new(
                repository.id.clone(),
                repository.path.clone(),
            )));
        }
        info!(
            local = %root.display(),
            repositories = config.repositories.len(),
            core = core.len(),
            "Extension manager ready"
        );

        Ok(Self::new(core, local, Arc::new(remote)).with_conflict_policy(config.conflict_policy))
    }

    pub fn core_repository(&self) -> &Arc<CoreExtensionRepository> {
        &self.core
    }

    pub fn local_repository(&self) -> &Arc<LocalExtensionRepository> {
        &self.local
    }

    pub fn repository_manager(&self) -> &Arc<ExtensionRepositoryManager> {
        &self.remote
    }

    pub fn executor(&self) -> &JobExecutor {
        &self.executor
    }

    pub fn installed_extensions(&self, namespace: Option<&str>) -> Vec<LocalExtension> {
        self.local.installed_extensions(namespace)
    }

    /// Dry run of an install.
    pub fn plan_install(&self, request: &InstallRequest) -> std::result::Result<ExtensionPlan, Vec<ResolutionError>> {
        InstallPlanner::new(&self.core, &self.local, self.remote.as_ref()).plan(
            request,
            &JobLog::new(),
            &CancelToken::new(),
        )
    }

    /// Dry run of an uninstall.
    pub fn plan_uninstall(&self, request: &UninstallRequest) -> std::result::Result<ExtensionPlan, Vec<ResolutionError>> {
        UninstallPlanner::new(&self.core, &self.local).plan(request, &JobLog::new(), &CancelToken::new())
    }

    /// Submit an install job. Planning and applying both happen on the job's
    /// worker, under its group path.
    pub fn install(&self, request: InstallRequest) -> Result<Job> {
        let this = self.clone();
        let job = self
            .executor
            .submit(JobRequest::Install(request.clone()), move |job| {
                let plan = InstallPlanner::new(&this.core, &this.local, this.remote.as_ref())
                    .plan(&request, job.log(), job.cancel_token());
                this.apply(plan, job)
            })?;
        Ok(job)
    }

    /// Submit an uninstall job.
    pub fn uninstall(&self, request: UninstallRequest) -> Result<Job> {
        let this = self.clone();
        let job = self
            .executor
            .submit(JobRequest::Uninstall(request.clone()), move |job| {
                let plan = UninstallPlanner::new(&this.core, &this.local)
                    .plan(&request, job.log(), job.cancel_token());
                this.apply(plan, job)
            })?;
        Ok(job)
    }

    fn apply(&self, plan: std::result::Result<ExtensionPlan, Vec<ResolutionError>>, job: &Job) -> JobOutcome {
        let plan = plan.map_err(|errors| errors.into_iter().map(JobError::from).collect::<Vec<_>>())?;
        for line in plan.to_string().lines() {
            job.log().debug(format!("plan: {line}"));
        }
        PlanApplier::new(&self.local, self.remote.as_ref())
            .apply(&plan, job.log(), job.cancel_token())
            .map_err(|e| vec![e])
    }
}

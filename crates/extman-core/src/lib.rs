//! Install and uninstall orchestration for Extension Manager
//!
//! This crate turns requests into jobs:
//!
//! - **Planning**: [`InstallPlanner`] expands dependencies, merges the
//!   constraints of every requester and picks versions;
//!   [`UninstallPlanner`] collects installed dependents
//! - **Applying**: [`PlanApplier`] writes a plan to the local repository and
//!   reverts it on the first failure
//! - **Jobs**: [`Job`] with its state, [`JobLog`] and outcome
//! - **Execution**: [`JobExecutor`] runs each job on its own thread, at most
//!   one per conflicting [`JobGroupPath`]
//! - **Facade**: [`ExtensionManager`]
//!
//! # Architecture
//!
//! ```text
//!                  extman-cli
//!                      |
//!                 extman-core
//!                      |
//!              extman-extension
//!                      |
//!         +------------+-----------+
//!         |                        |
//!   extman-version             extman-fs
//! ```
//!
//! # Example
//!
//! ```ignore
//! use extman_core::{ExtensionManager, InstallRequest};
//! use extman_extension::{ConfigLoader, ExtensionId};
//!
//! let config = ConfigLoader::new().load(None)?;
//! let manager = ExtensionManager::from_config(&config)?;
//! let job = manager.install(
//!     InstallRequest::new()
//!         .with_extension(ExtensionId::parse("org.example:macros/2.1")?)
//!         .with_namespace("wiki1"),
//! )?;
//! match job.join() {
//!     Ok(applied) => println!("{} action(s) applied", applied.len()),
//!     Err(errors) => errors.iter().for_each(|e| eprintln!("{e}")),
//! }
//! ```

pub mod apply;
pub mod error;
pub mod executor;
pub mod job;
pub mod manager;
pub mod plan;
pub mod request;

pub use apply::{AppliedAction, InstalledSet, PlanApplier};
pub use error::{Error, ExecutorError, JobError, Requirement, ResolutionError, Result};
pub use executor::JobExecutor;
pub use job::{
    CancelToken, Job, JobGroupPath, JobLog, JobOutcome, JobState, JobStatus, LogEntry, LogLevel,
};
pub use manager::ExtensionManager;
pub use plan::{ExtensionPlan, InstallPlanner, NodeId, PlanAction, PlanNode, UninstallPlanner};
pub use request::{InstallRequest, JobRequest, UninstallRequest};

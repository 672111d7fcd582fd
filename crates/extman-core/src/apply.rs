//! Applying plans to the local repository.

use extman_extension::repository::{ExtensionRepository, LOCAL_REPOSITORY_ID};
use extman_extension::{ExtensionId, LocalExtension, LocalExtensionRepository, namespace_label};
use serde::Serialize;
use tracing::warn;

use crate::error::JobError;
use crate::job::{CancelToken, JobLog};
use crate::plan::{ExtensionPlan, PlanAction, PlanNode};

/// One action applied to the local repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedAction {
    pub action: PlanAction,
    pub extension: ExtensionId,
    /// The version an upgrade replaced.
    pub previous: Option<ExtensionId>,
    pub namespace: Option<String>,
}

/// Everything a successful job changed, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstalledSet {
    actions: Vec<AppliedAction>,
}

impl InstalledSet {
    pub fn actions(&self) -> &[AppliedAction] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn contains(&self, id: &ExtensionId, namespace: Option<&str>) -> bool {
        self.actions
            .iter()
            .any(|a| a.extension == *id && a.namespace.as_deref() == namespace)
    }
}

/// A step that was applied, with what is needed to revert it.
enum Undo {
    /// Uninstall what was installed.
    Installed(ExtensionId),
    /// Restore the `dependency` flag of an extension that was already
    /// installed.
    Flagged { id: ExtensionId, dependency: bool },
    /// Reinstall what was uninstalled.
    Uninstalled(LocalExtension),
}

struct Applied {
    namespace: Option<String>,
    undo: Vec<Undo>,
}

/// Applies a plan, reverting every applied step when one fails.
pub struct PlanApplier<'a> {
    local: &'a LocalExtensionRepository,
    remote: &'a dyn ExtensionRepository,
}

impl<'a> PlanApplier<'a> {
    pub fn new(local: &'a LocalExtensionRepository, remote: &'a dyn ExtensionRepository) -> Self {
        Self { local, remote }
    }

    pub fn apply(
        &self,
        plan: &ExtensionPlan,
        log: &JobLog,
        cancel: &CancelToken,
    ) -> std::result::Result<InstalledSet, JobError> {
        let mut applied: Vec<Applied> = Vec::new();
        let mut set = InstalledSet::default();

        for node in plan.actions() {
            if node.action == PlanAction::None {
                continue;
            }
            if cancel.is_cancelled() {
                log.warn("cancelled, reverting applied actions");
                self.rollback(applied, log);
                return Err(JobError::Cancelled);
            }

            let mut undo = Vec::new();
            match self.apply_node(node, &mut undo, log) {
                Ok(()) => {
                    set.actions.push(AppliedAction {
                        action: node.action,
                        extension: node.extension.id.clone(),
                        previous: node
                            .previous
                            .as_ref()
                            .filter(|_| node.action == PlanAction::Upgrade)
                            .map(|p| p.id().clone()),
                        namespace: node.namespace.clone(),
                    });
                    applied.push(Applied {
                        namespace: node.namespace.clone(),
                        undo,
                    });
                }
                Err(e) => {
                    let error = JobError::Apply {
                        id: node.extension.id.clone(),
                        namespace: namespace_label(node.namespace.as_deref()),
                        message: e.to_string(),
                    };
                    log.error(error.to_string());
                    applied.push(Applied {
                        namespace: node.namespace.clone(),
                        undo,
                    });
                    self.rollback(applied, log);
                    return Err(error);
                }
            }
        }
        Ok(set)
    }

    fn apply_node(&self, node: &PlanNode, undo: &mut Vec<Undo>, log: &JobLog) -> extman_extension::Result<()> {
        let namespace = node.namespace.as_deref();
        match node.action {
            PlanAction::Install => self.install(node, undo, log),
            PlanAction::Upgrade => {
                if let Some(previous) = &node.previous {
                    let uninstalled = self.local.uninstall_extension(previous.id(), namespace)?;
                    log.info(format!(
                        "uninstalled {} from {}",
                        uninstalled.id(),
                        namespace_label(namespace)
                    ));
                    undo.push(Undo::Uninstalled(uninstalled));
                }
                self.install(node, undo, log)
            }
            PlanAction::Uninstall => {
                let uninstalled = self.local.uninstall_extension(&node.extension.id, namespace)?;
                log.info(format!(
                    "uninstalled {} from {}",
                    node.extension.id,
                    namespace_label(namespace)
                ));
                undo.push(Undo::Uninstalled(uninstalled));
                Ok(())
            }
            PlanAction::None => Ok(()),
        }
    }

    fn install(&self, node: &PlanNode, undo: &mut Vec<Undo>, log: &JobLog) -> extman_extension::Result<()> {
        let namespace = node.namespace.as_deref();
        let before = self
            .local
            .get_local_extension(&node.extension.id)
            .filter(|l| l.is_installed_exactly(namespace));

        let source: &dyn ExtensionRepository = if node.extension.repository == LOCAL_REPOSITORY_ID {
            self.local
        } else {
            self.remote
        };
        let installed = self
            .local
            .install_extension(&node.extension, source, node.dependency, namespace)?;
        log.info(format!(
            "installed {} in {}",
            installed.id(),
            namespace_label(namespace)
        ));
        match before {
            None => undo.push(Undo::Installed(node.extension.id.clone())),
            Some(before) if before.dependency != installed.dependency => undo.push(Undo::Flagged {
                id: node.extension.id.clone(),
                dependency: before.dependency,
            }),
            Some(_) => {}
        }
        Ok(())
    }

    /// Revert applied steps, latest first. Failures are logged and the
    /// remaining steps still reverted.
    fn rollback(&self, applied: Vec<Applied>, log: &JobLog) {
        for step in applied.into_iter().rev() {
            let namespace = step.namespace.as_deref();
            for undo in step.undo.into_iter().rev() {
                let result = match &undo {
                    Undo::Installed(id) => self
                        .local
                        .uninstall_extension(id, namespace)
                        .map(|_| log.warn(format!("rolled back install of {id}"))),
                    Undo::Flagged { id, dependency } => self
                        .local
                        .set_dependency(id, *dependency)
                        .map(|_| log.warn(format!("restored dependency flag of {id}"))),
                    Undo::Uninstalled(previous) => self
                        .local
                        .install_extension(&previous.extension, self.local, previous.dependency, namespace)
                        .map(|_| log.warn(format!("rolled back uninstall of {}", previous.id()))),
                };
                if let Err(e) = result {
                    warn!(namespace = %namespace_label(namespace), error = %e, "Rollback step failed");
                    log.error(format!("rollback failed: {e}"));
                }
            }
        }
    }
}

use std::collections::HashMap;

use extman_extension::{CoreExtensionRepository, ExtensionId, LocalExtensionRepository, namespace_label};

use super::{ExtensionPlan, NodeId, PlanAction, PlanNode};
use crate::error::ResolutionError;
use crate::job::{CancelToken, JobLog};
use crate::request::UninstallRequest;

/// Computes uninstall plans. Uninstalling an extension also uninstalls
/// every installed extension that depends on it.
pub struct UninstallPlanner<'a> {
    core: &'a CoreExtensionRepository,
    local: &'a LocalExtensionRepository,
}

impl<'a> UninstallPlanner<'a> {
    pub fn new(core: &'a CoreExtensionRepository, local: &'a LocalExtensionRepository) -> Self {
        Self { core, local }
    }

    pub fn plan(
        &self,
        request: &UninstallRequest,
        log: &JobLog,
        cancel: &CancelToken,
    ) -> std::result::Result<ExtensionPlan, Vec<ResolutionError>> {
        let mut plan = ExtensionPlan::default();
        let mut visited = HashMap::new();
        let mut errors = Vec::new();

        'namespaces: for namespace in request.target_namespaces() {
            for id in &request.extensions {
                if cancel.is_cancelled() {
                    errors.push(ResolutionError::Cancelled);
                    break 'namespaces;
                }
                match self.plan_extension(id, namespace, &mut plan, &mut visited, log) {
                    Ok(node) => plan.add_root(node),
                    Err(e) => errors.push(e),
                }
            }
        }

        for error in &errors {
            log.error(error.to_string());
        }
        if errors.is_empty() { Ok(plan) } else { Err(errors) }
    }

    fn plan_extension(
        &self,
        id: &ExtensionId,
        namespace: Option<&str>,
        plan: &mut ExtensionPlan,
        visited: &mut HashMap<(ExtensionId, Option<String>), NodeId>,
        log: &JobLog,
    ) -> std::result::Result<NodeId, ResolutionError> {
        let key = (id.clone(), namespace.map(str::to_string));
        if let Some(node) = visited.get(&key) {
            return Ok(*node);
        }

        if self.core.contains(id.id()) {
            return Err(ResolutionError::CannotUninstallCore {
                id: id.id().to_string(),
            });
        }
        let installed = self
            .local
            .get_local_extension(id)
            .filter(|l| l.is_installed_exactly(namespace))
            .ok_or_else(|| ResolutionError::NotInstalled {
                id: id.clone(),
                namespace: namespace_label(namespace),
            })?;

        log.info(format!("uninstall {id} from {}", namespace_label(namespace)));
        let node = plan.push(PlanNode {
            action: PlanAction::Uninstall,
            extension: installed.extension.clone(),
            previous: Some(installed.clone()),
            namespace: namespace.map(str::to_string),
            dependency: installed.dependency,
            constraint: None,
            requirements: Vec::new(),
            children: Vec::new(),
        });
        visited.insert(key, node);

        let dependents = self
            .local
            .backward_dependencies(id.id(), namespace)
            .unwrap_or_default();
        for (dependent_namespace, dependent) in dependents {
            let child = self.plan_extension(
                dependent.id(),
                dependent_namespace.as_deref(),
                plan,
                visited,
                log,
            )?;
            plan.node_mut(node).children.push(child);
        }
        Ok(node)
    }
}

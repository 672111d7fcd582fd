use std::collections::{BTreeSet, HashMap};

use extman_extension::repository::ExtensionRepository;
use extman_extension::{
    CoreExtensionRepository, Extension, ExtensionDependency, ExtensionId, LocalExtension,
    LocalExtensionRepository, namespace_label,
};
use extman_version::VersionConstraint;
use tracing::debug;

use super::{ExtensionPlan, NodeId, PlanAction, PlanNode};
use crate::error::{Requirement, ResolutionError};
use crate::job::{CancelToken, JobLog};
use crate::request::InstallRequest;

type PlanResult<T> = std::result::Result<T, ResolutionError>;

/// Computes install plans against the core, local and remote repositories.
///
/// Versions are chosen with the precedence core, then installed, then
/// remote, highest satisfying version first.
pub struct InstallPlanner<'a> {
    core: &'a CoreExtensionRepository,
    local: &'a LocalExtensionRepository,
    remote: &'a dyn ExtensionRepository,
}

impl<'a> InstallPlanner<'a> {
    pub fn new(
        core: &'a CoreExtensionRepository,
        local: &'a LocalExtensionRepository,
        remote: &'a dyn ExtensionRepository,
    ) -> Self {
        Self {
            core,
            local,
            remote,
        }
    }

    /// Plan `request`. Errors in one branch do not stop its siblings, and
    /// any error means no plan.
    pub fn plan(
        &self,
        request: &InstallRequest,
        log: &JobLog,
        cancel: &CancelToken,
    ) -> std::result::Result<ExtensionPlan, Vec<ResolutionError>> {
        let mut builder = PlanBuilder {
            planner: self,
            log,
            cancel,
            plan: ExtensionPlan::default(),
            planned: HashMap::new(),
            errors: Vec::new(),
        };

        'namespaces: for namespace in request.target_namespaces() {
            for id in &request.extensions {
                if builder.cancelled() {
                    break 'namespaces;
                }
                match builder.plan_root(id, namespace) {
                    Ok(root) => builder.plan.add_root(root),
                    Err(e) => builder.fail(e),
                }
            }
        }

        if builder.errors.is_empty() {
            Ok(builder.plan)
        } else {
            Err(builder.errors)
        }
    }
}

type PlanKey = (String, Option<String>);

struct PlanBuilder<'p, 'a> {
    planner: &'p InstallPlanner<'a>,
    log: &'p JobLog,
    cancel: &'p CancelToken,
    plan: ExtensionPlan,
    /// Dependency nodes by (id, namespace).
    planned: HashMap<PlanKey, NodeId>,
    errors: Vec<ResolutionError>,
}

/// A version chosen for a dependency.
struct Selection {
    action: PlanAction,
    extension: Extension,
    previous: Option<LocalExtension>,
}

impl PlanBuilder<'_, '_> {
    fn fail(&mut self, error: ResolutionError) {
        self.log.error(error.to_string());
        self.errors.push(error);
    }

    fn cancelled(&mut self) -> bool {
        if !self.cancel.is_cancelled() {
            return false;
        }
        if !self.errors.contains(&ResolutionError::Cancelled) {
            self.fail(ResolutionError::Cancelled);
        }
        true
    }

    fn plan_root(&mut self, id: &ExtensionId, namespace: Option<&str>) -> PlanResult<NodeId> {
        let planner = self.planner;
        if planner.core.contains(id.id()) {
            return Err(ResolutionError::AlreadyCore {
                id: id.id().to_string(),
            });
        }

        let key = (id.id().to_string(), namespace.map(str::to_string));
        if let Some(node) = self.planned.get(&key).copied() {
            return self.promote(node, id, namespace);
        }

        let installed = planner.local.get_installed_extension(id.id(), namespace);
        let mut action = PlanAction::Install;
        if let Some(installed) = &installed {
            let version = installed.id().version();
            if version == id.version() {
                if !installed.dependency || !installed.is_installed_exactly(namespace) {
                    return Err(ResolutionError::AlreadyInstalled {
                        id: id.clone(),
                        namespace: namespace_label(namespace),
                    });
                }
            } else if version > id.version() {
                return Err(ResolutionError::NewerVersionInstalled {
                    id: id.clone(),
                    installed: installed.id().clone(),
                    namespace: namespace_label(namespace),
                });
            } else if installed.is_installed_exactly(namespace) {
                action = PlanAction::Upgrade;
            }
        }

        let extension = self.resolve_root(id)?;
        let previous = installed.filter(|_| action == PlanAction::Upgrade);
        if let Some(previous) = &previous {
            self.check_dependents(previous, &VersionConstraint::exact(id.version().clone()), namespace)?;
        }

        self.log.info(format!(
            "{action} {} in {}",
            extension.id,
            namespace_label(namespace)
        ));
        let node = self.plan.push(PlanNode {
            action,
            extension: extension.clone(),
            previous,
            namespace: namespace.map(str::to_string),
            dependency: false,
            constraint: None,
            requirements: Vec::new(),
            children: Vec::new(),
        });
        self.planned.insert(key, node);
        self.plan_children(node, &extension, namespace, &BTreeSet::new());
        Ok(node)
    }

    /// An extension requested explicitly that an earlier request already
    /// pulled in as a dependency.
    fn promote(&mut self, node: NodeId, id: &ExtensionId, namespace: Option<&str>) -> PlanResult<NodeId> {
        let planned = self.plan.node_mut(node);
        if planned.extension.id != *id {
            return Err(ResolutionError::IncompatibleConstraints {
                id: id.id().to_string(),
                requirements: planned.requirements.clone(),
                reason: format!(
                    "{} is already planned in {}",
                    planned.extension.id,
                    namespace_label(namespace)
                ),
            });
        }
        planned.dependency = false;
        planned.constraint = None;
        Ok(node)
    }

    /// Local storage first, then the remote repositories.
    fn resolve_root(&self, id: &ExtensionId) -> PlanResult<Extension> {
        if let Ok(extension) = self.planner.local.resolve(id) {
            return Ok(extension);
        }
        self.planner
            .remote
            .resolve(id)
            .map_err(|e| ResolutionError::NotFound {
                id: id.id().to_string(),
                message: e.to_string(),
            })
    }

    /// Plan every dependency of `extension` under `parent`. Failures are
    /// recorded and the remaining dependencies still planned.
    fn plan_children(
        &mut self,
        parent: NodeId,
        extension: &Extension,
        namespace: Option<&str>,
        exclusions: &BTreeSet<String>,
    ) {
        for dependency in &extension.dependencies {
            if exclusions.contains(&dependency.id) {
                debug!(dependency = %dependency, requester = %extension.id, "Dependency excluded");
                continue;
            }
            if self.cancelled() {
                return;
            }
            let mut inherited = exclusions.clone();
            inherited.extend(dependency.exclusions.iter().cloned());

            match self.plan_dependency(dependency, &extension.id, namespace, &inherited) {
                Ok(child) => {
                    let children = &mut self.plan.node_mut(parent).children;
                    if !children.contains(&child) {
                        children.push(child);
                    }
                }
                Err(e) => self.fail(e),
            }
        }
    }

    fn plan_dependency(
        &mut self,
        dependency: &ExtensionDependency,
        requester: &ExtensionId,
        namespace: Option<&str>,
        exclusions: &BTreeSet<String>,
    ) -> PlanResult<NodeId> {
        let requirement = Requirement {
            requester: requester.clone(),
            constraint: dependency.constraint.clone(),
        };

        let planner = self.planner;
        if let Some(core) = planner.core.get(&dependency.id) {
            if !dependency.constraint.is_compatible(core.id.version()) {
                return Err(ResolutionError::IncompatibleCoreExtension {
                    id: dependency.id.clone(),
                    version: core.id.version().clone(),
                    constraint: dependency.constraint.clone(),
                    requester: requester.clone(),
                });
            }
            let key = (dependency.id.clone(), None);
            if let Some(node) = self.planned.get(&key).copied() {
                self.plan.node_mut(node).requirements.push(requirement);
                return Ok(node);
            }
            let node = self.plan.push(PlanNode {
                action: PlanAction::None,
                extension: core.clone(),
                previous: None,
                namespace: None,
                dependency: true,
                constraint: Some(dependency.constraint.clone()),
                requirements: vec![requirement],
                children: Vec::new(),
            });
            self.planned.insert(key, node);
            return Ok(node);
        }

        let own_key = (dependency.id.clone(), namespace.map(str::to_string));
        let root_key = (dependency.id.clone(), None);
        let existing = self
            .planned
            .get(&own_key)
            .or_else(|| self.planned.get(&root_key))
            .copied();

        if let Some(node) = existing {
            return self.reuse(node, dependency, requirement, namespace, exclusions);
        }

        let requirements = vec![requirement];
        let selection = self.select(&dependency.id, &dependency.constraint, namespace, &requirements)?;
        let node = self.plan.push(PlanNode {
            action: selection.action,
            extension: selection.extension.clone(),
            previous: selection.previous,
            namespace: namespace.map(str::to_string),
            dependency: true,
            constraint: Some(dependency.constraint.clone()),
            requirements,
            children: Vec::new(),
        });
        self.planned.insert(own_key, node);
        self.log.debug(format!(
            "{} {} for {requester} in {}",
            selection.action,
            selection.extension.id,
            namespace_label(namespace)
        ));
        if selection.action != PlanAction::None {
            self.plan_children(node, &selection.extension, namespace, exclusions);
        }
        Ok(node)
    }

    /// Reuse an already planned node when it satisfies the new requester,
    /// otherwise merge the constraints of every requester and select again,
    /// replacing the node for every parent.
    fn reuse(
        &mut self,
        node: NodeId,
        dependency: &ExtensionDependency,
        requirement: Requirement,
        namespace: Option<&str>,
        exclusions: &BTreeSet<String>,
    ) -> PlanResult<NodeId> {
        let planned = self.plan.node(node);
        let version = planned.extension.id.version();
        let replaceable = planned.dependency && planned.namespace.as_deref() == namespace;

        if dependency.constraint.is_compatible(version) {
            let merged = match &planned.constraint {
                Some(current) if replaceable => current.merge(&dependency.constraint).ok(),
                _ => None,
            };
            let target = self.plan.node_mut(node);
            if merged.is_some() {
                target.constraint = merged;
            }
            target.requirements.push(requirement);
            return Ok(node);
        }

        let mut requirements = planned.requirements.clone();
        requirements.push(requirement);

        if !replaceable || planned.constraint.is_none() {
            return Err(ResolutionError::IncompatibleConstraints {
                id: dependency.id.clone(),
                requirements,
                reason: format!(
                    "{} is already planned in {}",
                    planned.extension.id,
                    namespace_label(planned.namespace.as_deref())
                ),
            });
        }

        let merged = merge_requirements(&requirements).map_err(|reason| {
            ResolutionError::IncompatibleConstraints {
                id: dependency.id.clone(),
                requirements: requirements.clone(),
                reason,
            }
        })?;

        let selection = self.select(&dependency.id, &merged, namespace, &requirements)?;
        let selected = selection.extension.id.version();
        if let Some(unmet) = requirements
            .iter()
            .find(|r| !r.constraint.is_compatible(selected))
        {
            return Err(ResolutionError::IncompatibleConstraints {
                id: dependency.id.clone(),
                reason: format!("{} does not satisfy {unmet}", selection.extension.id),
                requirements,
            });
        }

        debug!(
            dependency = %dependency.id,
            from = %planned.extension.id,
            to = %selection.extension.id,
            constraint = %merged,
            "Re-resolved planned dependency"
        );
        self.log.debug(format!(
            "{} {} replaces {} to satisfy {merged}",
            selection.action, selection.extension.id, planned.extension.id
        ));

        let target = self.plan.node_mut(node);
        target.action = selection.action;
        target.extension = selection.extension.clone();
        target.previous = selection.previous;
        target.constraint = Some(merged);
        target.requirements = requirements;
        target.children.clear();
        if selection.action != PlanAction::None {
            self.plan_children(node, &selection.extension, namespace, exclusions);
        }
        Ok(node)
    }

    /// Choose a version of `id` satisfying `constraint`: the installed one
    /// if it is compatible, else the best remote match, upgrading the
    /// installed one when its dependents allow.
    fn select(
        &self,
        id: &str,
        constraint: &VersionConstraint,
        namespace: Option<&str>,
        requirements: &[Requirement],
    ) -> PlanResult<Selection> {
        let installed = self.planner.local.get_installed_extension(id, namespace);

        let mut effective = constraint.clone();
        if let Some(installed) = &installed {
            if constraint.is_compatible(installed.id().version()) {
                return Ok(Selection {
                    action: PlanAction::None,
                    extension: installed.extension.clone(),
                    previous: None,
                });
            }
            if installed.is_installed_exactly(namespace) {
                effective = self.check_dependents(installed, constraint, namespace)?;
            }
        }

        let dependency = ExtensionDependency::new(id, effective.clone());
        let extension = self
            .planner
            .remote
            .resolve_dependency(&dependency)
            .or_else(|_| self.planner.local.resolve_dependency(&dependency))
            .map_err(|e| {
                debug!(dependency = %dependency, error = %e, "No candidate");
                ResolutionError::Unsatisfiable {
                    id: id.to_string(),
                    constraint: effective.clone(),
                    requirements: requirements.to_vec(),
                }
            })?;

        // An extension inherited from the root install is shadowed, not replaced.
        match installed.filter(|i| i.is_installed_exactly(namespace)) {
            Some(previous) => Ok(Selection {
                action: PlanAction::Upgrade,
                extension,
                previous: Some(previous),
            }),
            None => Ok(Selection {
                action: PlanAction::Install,
                extension,
                previous: None,
            }),
        }
    }

    /// Merge `constraint` with what the installed dependents of `installed`
    /// require, failing when `installed` cannot be replaced in `namespace`.
    fn check_dependents(
        &self,
        installed: &LocalExtension,
        constraint: &VersionConstraint,
        namespace: Option<&str>,
    ) -> PlanResult<VersionConstraint> {
        let id = installed.id().id();
        let dependents = self
            .planner
            .local
            .backward_dependencies(id, namespace)
            .map_err(|_| ResolutionError::NotInstalled {
                id: installed.id().clone(),
                namespace: namespace_label(namespace),
            })?;

        let mut merged = constraint.clone();
        for (_, dependent) in dependents {
            let Some(required) = dependent.extension.dependency_on(id) else {
                continue;
            };
            merged = merged.merge(&required.constraint).map_err(|_| {
                ResolutionError::IncompatibleWithInstalled {
                    installed: installed.id().clone(),
                    constraint: constraint.clone(),
                    dependent: dependent.id().clone(),
                    required: required.constraint.clone(),
                }
            })?;
        }
        Ok(merged)
    }
}

/// Fold the constraints of every requester, left to right.
fn merge_requirements(requirements: &[Requirement]) -> std::result::Result<VersionConstraint, String> {
    let mut constraints = requirements.iter().map(|r| &r.constraint);
    let Some(first) = constraints.next() else {
        return Err("no requesters".to_string());
    };
    constraints.try_fold(first.clone(), |merged, next| {
        merged.merge(next).map_err(|e| e.to_string())
    })
}

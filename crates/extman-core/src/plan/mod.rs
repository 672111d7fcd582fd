//! Install and uninstall plans.
//!
//! A plan is computed before anything is modified. Nodes live in an arena
//! and refer to their children by [`NodeId`], so a dependency shared by
//! several extensions is one node with several parents, and replacing that
//! node updates every parent at once.

mod install;
mod uninstall;

pub use install::InstallPlanner;
pub use uninstall::UninstallPlanner;

use std::collections::HashSet;
use std::fmt;

use extman_extension::{Extension, LocalExtension, namespace_label};
use extman_version::VersionConstraint;
use serde::Serialize;

use crate::error::Requirement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanAction {
    Install,
    /// Replace `previous` with a newer version.
    Upgrade,
    Uninstall,
    /// Already satisfied by an installed or core extension.
    None,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Install => "install",
            Self::Upgrade => "upgrade",
            Self::Uninstall => "uninstall",
            Self::None => "keep",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub struct PlanNode {
    pub action: PlanAction,
    pub extension: Extension,
    /// The installed extension an upgrade or uninstall replaces.
    pub previous: Option<LocalExtension>,
    pub namespace: Option<String>,
    /// Installed only to satisfy another extension.
    pub dependency: bool,
    /// Effective constraint the extension was selected with, `None` for
    /// explicitly requested extensions.
    pub constraint: Option<VersionConstraint>,
    /// Who asked for this dependency.
    pub requirements: Vec<Requirement>,
    pub children: Vec<NodeId>,
}

/// A tree of actions, roots in request order.
#[derive(Debug, Clone, Default)]
pub struct ExtensionPlan {
    nodes: Vec<PlanNode>,
    roots: Vec<NodeId>,
}

impl ExtensionPlan {
    pub(crate) fn push(&mut self, node: PlanNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut PlanNode {
        &mut self.nodes[id.0]
    }

    pub(crate) fn add_root(&mut self, id: NodeId) {
        self.roots.push(id);
    }

    pub fn node(&self, id: NodeId) -> &PlanNode {
        &self.nodes[id.0]
    }

    pub fn roots(&self) -> impl Iterator<Item = &PlanNode> {
        self.roots.iter().map(|id| self.node(*id))
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Reachable nodes in the order they must be applied: children before
    /// parents, each node once.
    pub fn actions(&self) -> Vec<&PlanNode> {
        let mut visited = HashSet::new();
        let mut ordered = Vec::new();
        for root in &self.roots {
            self.post_order(*root, &mut visited, &mut ordered);
        }
        ordered
    }

    fn post_order<'a>(&'a self, id: NodeId, visited: &mut HashSet<NodeId>, out: &mut Vec<&'a PlanNode>) {
        if !visited.insert(id) {
            return;
        }
        let node = self.node(id);
        for child in &node.children {
            self.post_order(*child, visited, out);
        }
        out.push(node);
    }

    fn render(&self, id: NodeId, depth: usize, seen: &mut HashSet<NodeId>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.node(id);
        write!(f, "{:indent$}{} {}", "", node.action, node.extension.id, indent = depth * 2)?;
        if let Some(previous) = node.previous.as_ref().filter(|_| node.action == PlanAction::Upgrade) {
            write!(f, " (from {})", previous.id().version())?;
        }
        if node.dependency {
            f.write_str(" [dependency]")?;
        }
        writeln!(f, " in {}", namespace_label(node.namespace.as_deref()))?;
        if seen.insert(id) {
            for child in &node.children {
                self.render(*child, depth + 1, seen, f)?;
            }
        }
        Ok(())
    }
}

/// One line per node, children indented under their parent. A shared node
/// lists its children the first time only.
impl fmt::Display for ExtensionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut seen = HashSet::new();
        for root in &self.roots {
            self.render(*root, 0, &mut seen, f)?;
        }
        Ok(())
    }
}

//! Extensions as resolved from repositories, and their local installed state.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;

use crate::descriptor::encode_name;
use crate::id::{ExtensionDependency, ExtensionId};

/// Default artifact type.
pub const DEFAULT_TYPE: &str = "jar";

/// An installable unit as described by a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extension {
    pub id: ExtensionId,
    /// Artifact file extension, `jar` unless the descriptor says otherwise.
    #[serde(rename = "type")]
    pub kind: String,
    pub name: Option<String>,
    pub description: Option<String>,
    /// `sha256:<hex>` of the artifact.
    pub checksum: Option<String>,
    pub dependencies: Vec<ExtensionDependency>,
    /// Id of the repository this extension was resolved from.
    pub repository: String,
}

impl Extension {
    pub fn new(id: ExtensionId) -> Self {
        Self {
            id,
            kind: DEFAULT_TYPE.to_string(),
            name: None,
            description: None,
            checksum: None,
            dependencies: Vec::new(),
            repository: String::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: ExtensionDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = repository.into();
        self
    }

    /// `<id>-<version>.<type>`, percent-encoded.
    pub fn artifact_file_name(&self) -> String {
        format!("{}.{}", self.file_stem(), encode_name(&self.kind))
    }

    /// `<id>-<version>`, percent-encoded.
    pub fn file_stem(&self) -> String {
        format!(
            "{}-{}",
            encode_name(self.id.id()),
            encode_name(self.id.version().value())
        )
    }

    /// The dependency on `id`, if this extension declares one.
    pub fn dependency_on(&self, id: &str) -> Option<&ExtensionDependency> {
        self.dependencies.iter().find(|d| d.id == id)
    }
}

/// An extension stored in the local repository.
///
/// `namespaces == None` with `installed == true` is a root install, which
/// covers every namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalExtension {
    #[serde(flatten)]
    pub extension: Extension,
    /// Installed only to satisfy another extension.
    pub dependency: bool,
    pub installed: bool,
    pub namespaces: Option<BTreeSet<String>>,
    /// Artifact file.
    pub file: PathBuf,
    /// Descriptor file.
    pub descriptor: PathBuf,
}

impl LocalExtension {
    pub fn id(&self) -> &ExtensionId {
        &self.extension.id
    }

    /// Whether the extension is usable in `namespace`. Root installs are
    /// usable everywhere.
    pub fn is_installed_in(&self, namespace: Option<&str>) -> bool {
        if !self.installed {
            return false;
        }
        match (&self.namespaces, namespace) {
            (None, _) => true,
            (Some(set), Some(ns)) => set.contains(ns),
            (Some(_), None) => false,
        }
    }

    /// Whether the extension was installed into exactly `namespace`, as
    /// opposed to inherited from a root install.
    pub fn is_installed_exactly(&self, namespace: Option<&str>) -> bool {
        if !self.installed {
            return false;
        }
        match (&self.namespaces, namespace) {
            (None, None) => true,
            (Some(set), Some(ns)) => set.contains(ns),
            _ => false,
        }
    }

    /// Every namespace this extension is installed in, `None` for root.
    pub fn installed_namespaces(&self) -> Vec<Option<String>> {
        if !self.installed {
            return Vec::new();
        }
        match &self.namespaces {
            None => vec![None],
            Some(set) => set.iter().cloned().map(Some).collect(),
        }
    }

    pub(crate) fn mark_installed(&mut self, namespace: Option<&str>) {
        match namespace {
            None => self.namespaces = None,
            Some(ns) => {
                if self.installed && self.namespaces.is_none() {
                    return;
                }
                let mut set = if self.installed {
                    self.namespaces.take().unwrap_or_default()
                } else {
                    BTreeSet::new()
                };
                set.insert(ns.to_string());
                self.namespaces = Some(set);
            }
        }
        self.installed = true;
    }

    pub(crate) fn mark_uninstalled(&mut self, namespace: Option<&str>) {
        match (namespace, self.namespaces.as_mut()) {
            (Some(ns), Some(set)) => {
                set.remove(ns);
                if set.is_empty() {
                    self.installed = false;
                    self.namespaces = None;
                }
            }
            _ => {
                self.installed = false;
                self.namespaces = None;
            }
        }
    }
}

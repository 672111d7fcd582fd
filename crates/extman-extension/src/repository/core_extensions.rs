use std::collections::BTreeMap;
use std::path::Path;

use extman_version::Version;

use super::ExtensionRepository;
use crate::config::CoreExtensionConfig;
use crate::error::{Error, Result};
use crate::extension::Extension;
use crate::id::ExtensionId;

pub const CORE_REPOSITORY_ID: &str = "core";

/// Extensions provided by the environment. They cannot be installed,
/// upgraded or uninstalled, and each id has exactly one version.
#[derive(Debug, Clone, Default)]
pub struct CoreExtensionRepository {
    extensions: BTreeMap<String, Extension>,
}

impl CoreExtensionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(entries: &[CoreExtensionConfig]) -> Self {
        let mut repository = Self::new();
        for entry in entries {
            repository.add(Extension::new(ExtensionId::new(
                entry.id.clone(),
                entry.version.clone(),
            )));
        }
        repository
    }

    /// Register a core extension, replacing any previous version of its id.
    pub fn add(&mut self, mut extension: Extension) {
        extension.repository = CORE_REPOSITORY_ID.to_string();
        self.extensions
            .insert(extension.id.id().to_string(), extension);
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.add(extension);
        self
    }

    /// Whether `id` is provided by the environment, whatever the version.
    pub fn contains(&self, id: &str) -> bool {
        self.extensions.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Extension> {
        self.extensions.get(id)
    }

    pub fn extensions(&self) -> impl Iterator<Item = &Extension> {
        self.extensions.values()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    fn not_found(&self, id: &ExtensionId) -> Error {
        Error::NotFound {
            id: id.to_string(),
            repository: CORE_REPOSITORY_ID.to_string(),
        }
    }
}

impl ExtensionRepository for CoreExtensionRepository {
    fn id(&self) -> &str {
        CORE_REPOSITORY_ID
    }

    fn resolve(&self, id: &ExtensionId) -> Result<Extension> {
        self.get(id.id())
            .filter(|e| e.id.version() == id.version())
            .cloned()
            .ok_or_else(|| self.not_found(id))
    }

    fn exists(&self, id: &ExtensionId) -> bool {
        self.get(id.id())
            .is_some_and(|e| e.id.version() == id.version())
    }

    fn versions(&self, id: &str) -> Result<Vec<Version>> {
        Ok(self
            .get(id)
            .map(|e| vec![e.id.version().clone()])
            .unwrap_or_default())
    }

    /// Core extensions ship with the environment and have no artifact to copy.
    fn download(&self, extension: &Extension, _target: &Path) -> Result<()> {
        Err(self.not_found(&extension.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ExtensionDependency;

    #[test]
    fn test_from_config() {
        let core = CoreExtensionRepository::from_config(&[CoreExtensionConfig {
            id: "platform".into(),
            version: Version::new("3.0"),
        }]);

        assert!(core.contains("platform"));
        assert!(!core.contains("lib"));
        assert!(core.exists(&ExtensionId::new("platform", "3.0")));
        assert!(!core.exists(&ExtensionId::new("platform", "2.0")));
        assert_eq!(core.get("platform").unwrap().repository, "core");
        assert_eq!(core.len(), 1);
    }

    #[test]
    fn test_resolve_dependency_on_core() {
        let core = CoreExtensionRepository::new()
            .with_extension(Extension::new(ExtensionId::new("platform", "3.0")));

        let resolved = core
            .resolve_dependency(&ExtensionDependency::parse("platform", "[2.0,)"))
            .unwrap();
        assert_eq!(resolved.id, ExtensionId::new("platform", "3.0"));

        assert!(core
            .resolve_dependency(&ExtensionDependency::parse("platform", "[4.0,)"))
            .is_err());
    }
}

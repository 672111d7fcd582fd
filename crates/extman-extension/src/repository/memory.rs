use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use extman_version::Version;

use super::ExtensionRepository;
use crate::error::{Error, Result};
use crate::extension::Extension;
use crate::id::ExtensionId;

/// An in-memory catalog, mostly useful for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryExtensionRepository {
    id: String,
    extensions: HashMap<String, BTreeMap<Version, (Extension, Vec<u8>)>>,
}

impl MemoryExtensionRepository {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extensions: HashMap::new(),
        }
    }

    /// Add an extension with its artifact bytes, replacing an equal version.
    pub fn add(&mut self, mut extension: Extension, artifact: impl Into<Vec<u8>>) {
        extension.repository = self.id.clone();
        self.extensions
            .entry(extension.id.id().to_string())
            .or_default()
            .insert(extension.id.version().clone(), (extension, artifact.into()));
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        let artifact = extension.id.to_string().into_bytes();
        self.add(extension, artifact);
        self
    }

    fn entry(&self, id: &ExtensionId) -> Option<&(Extension, Vec<u8>)> {
        self.extensions.get(id.id())?.get(id.version())
    }
}

impl ExtensionRepository for MemoryExtensionRepository {
    fn id(&self) -> &str {
        &self.id
    }

    fn resolve(&self, id: &ExtensionId) -> Result<Extension> {
        self.entry(id)
            .map(|(extension, _)| extension.clone())
            .ok_or_else(|| Error::NotFound {
                id: id.to_string(),
                repository: self.id.clone(),
            })
    }

    fn exists(&self, id: &ExtensionId) -> bool {
        self.entry(id).is_some()
    }

    fn versions(&self, id: &str) -> Result<Vec<Version>> {
        Ok(self
            .extensions
            .get(id)
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn download(&self, extension: &Extension, target: &Path) -> Result<()> {
        let (_, artifact) = self.entry(&extension.id).ok_or_else(|| Error::NotFound {
            id: extension.id.to_string(),
            repository: self.id.clone(),
        })?;
        extman_fs::io::write_atomic(target, artifact)?;
        Ok(())
    }
}

use std::path::Path;
use std::sync::Arc;

use extman_version::Version;
use tracing::{debug, warn};

use super::ExtensionRepository;
use crate::error::{Error, Result};
use crate::extension::Extension;
use crate::id::{ExtensionDependency, ExtensionId};

pub const REMOTE_REPOSITORY_ID: &str = "remote";

/// An ordered set of remote repositories queried as one.
#[derive(Clone, Default)]
pub struct ExtensionRepositoryManager {
    repositories: Vec<Arc<dyn ExtensionRepository>>,
}

impl std::fmt::Debug for ExtensionRepositoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.repositories.iter().map(|r| r.id()))
            .finish()
    }
}

impl ExtensionRepositoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a repository. Earlier repositories take precedence.
    pub fn add_repository(&mut self, repository: Arc<dyn ExtensionRepository>) {
        self.repositories.push(repository);
    }

    pub fn with_repository(mut self, repository: Arc<dyn ExtensionRepository>) -> Self {
        self.add_repository(repository);
        self
    }

    pub fn repositories(&self) -> &[Arc<dyn ExtensionRepository>] {
        &self.repositories
    }

    pub fn repository(&self, id: &str) -> Option<&Arc<dyn ExtensionRepository>> {
        self.repositories.iter().find(|r| r.id() == id)
    }
}

fn is_miss(error: &Error) -> bool {
    matches!(error, Error::NotFound { .. } | Error::NoMatchingVersion { .. })
}

impl ExtensionRepository for ExtensionRepositoryManager {
    fn id(&self) -> &str {
        REMOTE_REPOSITORY_ID
    }

    /// The first repository that has the extension wins.
    fn resolve(&self, id: &ExtensionId) -> Result<Extension> {
        let mut failure = None;
        for repository in &self.repositories {
            match repository.resolve(id) {
                Ok(extension) => return Ok(extension),
                Err(e) if is_miss(&e) => {}
                Err(e) => {
                    warn!(repository = repository.id(), extension = %id, error = %e, "Repository failed to resolve");
                    failure.get_or_insert(e);
                }
            }
        }
        Err(failure.unwrap_or_else(|| Error::NotFound {
            id: id.to_string(),
            repository: REMOTE_REPOSITORY_ID.to_string(),
        }))
    }

    fn exists(&self, id: &ExtensionId) -> bool {
        self.repositories.iter().any(|r| r.exists(id))
    }

    fn versions(&self, id: &str) -> Result<Vec<Version>> {
        let mut versions = Vec::new();
        for repository in &self.repositories {
            versions.extend(repository.versions(id)?);
        }
        versions.sort();
        versions.dedup();
        Ok(versions)
    }

    /// Download from the repository the extension was resolved from, or from
    /// the first one that has it.
    fn download(&self, extension: &Extension, target: &Path) -> Result<()> {
        let origin = self
            .repository(&extension.repository)
            .or_else(|| self.repositories.iter().find(|r| r.exists(&extension.id)))
            .ok_or_else(|| Error::NotFound {
                id: extension.id.to_string(),
                repository: REMOTE_REPOSITORY_ID.to_string(),
            })?;
        origin.download(extension, target)
    }

    /// The highest match across all repositories. On equal versions the
    /// earlier repository wins.
    fn resolve_dependency(&self, dependency: &ExtensionDependency) -> Result<Extension> {
        let mut best: Option<Extension> = None;
        let mut failure = None;

        for repository in &self.repositories {
            match repository.resolve_dependency(dependency) {
                Ok(candidate) => {
                    let better = best
                        .as_ref()
                        .is_none_or(|b| candidate.id.version() > b.id.version());
                    if better {
                        best = Some(candidate);
                    }
                }
                Err(e) if is_miss(&e) => {}
                Err(e) => {
                    warn!(repository = repository.id(), dependency = %dependency, error = %e, "Repository failed to resolve");
                    failure.get_or_insert(e);
                }
            }
        }

        if let Some(extension) = best {
            debug!(dependency = %dependency, extension = %extension.id, repository = %extension.repository, "Resolved dependency");
            return Ok(extension);
        }
        Err(failure.unwrap_or_else(|| Error::NoMatchingVersion {
            id: dependency.id.clone(),
            constraint: dependency.constraint.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryExtensionRepository;
    use pretty_assertions::assert_eq;

    fn manager() -> ExtensionRepositoryManager {
        let first = MemoryExtensionRepository::new("first")
            .with_extension(Extension::new(ExtensionId::new("lib", "1.0")))
            .with_extension(Extension::new(ExtensionId::new("lib", "1.5")));
        let second = MemoryExtensionRepository::new("second")
            .with_extension(Extension::new(ExtensionId::new("lib", "1.5")))
            .with_extension(Extension::new(ExtensionId::new("lib", "1.8")))
            .with_extension(Extension::new(ExtensionId::new("other", "1.0")));
        ExtensionRepositoryManager::new()
            .with_repository(Arc::new(first))
            .with_repository(Arc::new(second))
    }

    #[test]
    fn test_resolve_first_hit() {
        let extension = manager().resolve(&ExtensionId::new("lib", "1.5")).unwrap();
        assert_eq!(extension.repository, "first");
        let extension = manager().resolve(&ExtensionId::new("other", "1.0")).unwrap();
        assert_eq!(extension.repository, "second");
    }

    #[test]
    fn test_resolve_dependency_highest_across_repositories() {
        let extension = manager()
            .resolve_dependency(&ExtensionDependency::parse("lib", "[1.0,2.0)"))
            .unwrap();
        assert_eq!(extension.id, ExtensionId::new("lib", "1.8"));
        assert_eq!(extension.repository, "second");
    }

    #[test]
    fn test_resolve_dependency_tie_prefers_earlier_repository() {
        let extension = manager()
            .resolve_dependency(&ExtensionDependency::parse("lib", "[1.5]"))
            .unwrap();
        assert_eq!(extension.repository, "first");
    }

    #[test]
    fn test_versions_merged_and_deduplicated() {
        let versions: Vec<String> = manager()
            .versions("lib")
            .unwrap()
            .into_iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(versions, vec!["1.0", "1.5", "1.8"]);
    }

    #[test]
    fn test_missing_dependency() {
        let err = manager()
            .resolve_dependency(&ExtensionDependency::parse("lib", "[3.0,)"))
            .unwrap_err();
        assert!(matches!(err, Error::NoMatchingVersion { .. }));
    }
}

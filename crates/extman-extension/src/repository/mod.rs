//! Sources of extensions.
//!
//! Every source implements [`ExtensionRepository`]. The planner talks to
//! three of them: the [`CoreExtensionRepository`] of extensions provided by
//! the environment, the [`LocalExtensionRepository`] of downloaded and
//! installed extensions, and an [`ExtensionRepositoryManager`] over the
//! remote ones.

mod core_extensions;
mod directory;
mod local;
mod manager;
mod memory;

pub use core_extensions::{CORE_REPOSITORY_ID, CoreExtensionRepository};
pub use directory::DirectoryExtensionRepository;
pub use local::{LOCAL_REPOSITORY_ID, LocalExtensionRepository};
pub use manager::{ExtensionRepositoryManager, REMOTE_REPOSITORY_ID};
pub use memory::MemoryExtensionRepository;

use std::path::Path;

use extman_version::{Version, VersionConstraint};
use tracing::debug;

use crate::error::{Error, Result};
use crate::extension::Extension;
use crate::id::{ExtensionDependency, ExtensionId};

/// A source from which extensions can be resolved and downloaded.
pub trait ExtensionRepository: Send + Sync {
    /// Repository identifier, recorded on every extension it resolves.
    fn id(&self) -> &str;

    /// Resolve one exact extension version.
    fn resolve(&self, id: &ExtensionId) -> Result<Extension>;

    fn exists(&self, id: &ExtensionId) -> bool;

    /// Available versions of `id`, ascending.
    fn versions(&self, id: &str) -> Result<Vec<Version>>;

    /// Copy the artifact of `extension` to `target`.
    fn download(&self, extension: &Extension, target: &Path) -> Result<()>;

    /// Resolve the best version for a dependency.
    ///
    /// An exact constraint resolves that version. A range constraint resolves
    /// the highest available version every group contains.
    fn resolve_dependency(&self, dependency: &ExtensionDependency) -> Result<Extension> {
        let no_match = || Error::NoMatchingVersion {
            id: dependency.id.clone(),
            constraint: dependency.constraint.to_string(),
        };

        match &dependency.constraint {
            VersionConstraint::Exact(version) => {
                let id = ExtensionId::new(dependency.id.clone(), version.clone());
                self.resolve(&id).map_err(|e| match e {
                    Error::NotFound { .. } => no_match(),
                    other => other,
                })
            }
            constraint @ VersionConstraint::Ranges(_) => {
                let versions = self.versions(&dependency.id)?;
                let best = versions
                    .into_iter()
                    .rev()
                    .find(|v| constraint.contains_version(v))
                    .ok_or_else(no_match)?;
                debug!(repository = self.id(), dependency = %dependency, version = %best, "Selected version");
                self.resolve(&ExtensionId::new(dependency.id.clone(), best))
            }
        }
    }
}

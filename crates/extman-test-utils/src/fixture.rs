//! [`ExtensionFixture`] for install and uninstall scenarios.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use extman_extension::{
    CoreExtensionRepository, DirectoryExtensionRepository, Extension, ExtensionDependency,
    ExtensionId, ExtensionRepositoryManager, LocalExtensionRepository,
};
use tempfile::TempDir;

/// A temporary directory holding a `central` directory repository, a local
/// repository and a configuration file pointing at both.
///
/// # Example
///
/// ```rust,no_run
/// use extman_test_utils::ExtensionFixture;
///
/// let fixture = ExtensionFixture::new()
///     .with_core("platform", "3.0")
///     .publish("lib", "1.8", &[])
///     .publish("e1", "1.0", &[("lib", "[1.0,2.0]")]);
/// let local = fixture.open_local();
/// assert!(local.local_extensions().is_empty());
/// ```
pub struct ExtensionFixture {
    temp_dir: TempDir,
    core: Vec<(String, String)>,
}

impl Default for ExtensionFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("ExtensionFixture::new: failed to create temp dir"),
            core: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn central_path(&self) -> PathBuf {
        self.root().join("central")
    }

    pub fn local_path(&self) -> PathBuf {
        self.root().join("local")
    }

    /// Declare a core extension.
    pub fn with_core(mut self, id: &str, version: &str) -> Self {
        self.core.push((id.to_string(), version.to_string()));
        self
    }

    /// Publish `id/version` to the central repository with the given
    /// `(dependency id, constraint)` pairs.
    pub fn publish(self, id: &str, version: &str, dependencies: &[(&str, &str)]) -> Self {
        let mut extension = Extension::new(ExtensionId::new(id, version));
        for (dependency, constraint) in dependencies {
            extension = extension.with_dependency(ExtensionDependency::parse(*dependency, constraint));
        }
        self.publish_extension(extension)
    }

    pub fn publish_extension(self, extension: Extension) -> Self {
        let artifact = format!("artifact of {}", extension.id);
        self.central()
            .publish(&extension, artifact.as_bytes())
            .expect("ExtensionFixture::publish: failed to publish extension");
        self
    }

    pub fn central(&self) -> DirectoryExtensionRepository {
        DirectoryExtensionRepository::new("central", self.central_path())
    }

    pub fn core(&self) -> Arc<CoreExtensionRepository> {
        let mut core = CoreExtensionRepository::new();
        for (id, version) in &self.core {
            core.add(Extension::new(ExtensionId::new(id.clone(), version.as_str())));
        }
        Arc::new(core)
    }

    pub fn remote(&self) -> Arc<ExtensionRepositoryManager> {
        Arc::new(ExtensionRepositoryManager::new().with_repository(Arc::new(self.central())))
    }

    /// Open the local repository. Each call reads the directory afresh, as a
    /// new process would.
    pub fn open_local(&self) -> Arc<LocalExtensionRepository> {
        Arc::new(
            LocalExtensionRepository::open(self.local_path(), self.core())
                .expect("ExtensionFixture::open_local: failed to open local repository"),
        )
    }

    /// Write `config.toml` describing this fixture and return its path.
    pub fn write_config(&self) -> PathBuf {
        let mut config = format!(
            "local_repository = {:?}\n\n[[repositories]]\nid = \"central\"\npath = {:?}\n",
            self.local_path().display().to_string(),
            self.central_path().display().to_string(),
        );
        for (id, version) in &self.core {
            config.push_str(&format!("\n[[core]]\nid = {id:?}\nversion = {version:?}\n"));
        }
        let path = self.root().join("config.toml");
        std::fs::write(&path, config).expect("ExtensionFixture::write_config: failed to write config");
        path
    }
}

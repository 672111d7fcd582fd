//! The local extension repository.
//!
//! Downloaded extensions live flat in one directory: the artifact
//! `<id>-<version>.<type>` next to its descriptor `<id>-<version>.toml`,
//! whose `[install]` table records where the extension is installed.
//!
//! Reads take a shared in-process lock. Mutations take the exclusive lock
//! plus an advisory lock on `<root>/.lock` so that two processes sharing a
//! repository never interleave descriptor writes. Artifacts are downloaded
//! before either lock is taken.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use extman_fs::{DirectoryLock, RobustnessConfig};
use extman_version::Version;
use tracing::{debug, info, warn};

use super::{CoreExtensionRepository, ExtensionRepository};
use crate::descriptor::{ExtensionDescriptor, InstallSection};
use crate::error::{Error, Result, namespace_label};
use crate::extension::{Extension, LocalExtension};
use crate::id::ExtensionId;

pub const LOCAL_REPOSITORY_ID: &str = "local";

type Store = BTreeMap<ExtensionId, LocalExtension>;

/// Directory-backed store of downloaded extensions and their installed state.
#[derive(Debug)]
pub struct LocalExtensionRepository {
    root: PathBuf,
    core: Arc<CoreExtensionRepository>,
    robustness: RobustnessConfig,
    extensions: RwLock<Store>,
}

impl LocalExtensionRepository {
    /// Open (or create) a repository and load its descriptors.
    ///
    /// Broken descriptors and descriptors without an artifact are skipped.
    /// Installs whose dependencies are missing in their namespace are
    /// treated as not installed.
    pub fn open(root: impl AsRef<Path>, core: Arc<CoreExtensionRepository>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|e| extman_fs::Error::io(root, e))?;
        let root = extman_fs::io::canonicalize(root)?;

        let mut store = Store::new();
        for entry in fs::read_dir(&root).map_err(|e| extman_fs::Error::io(&root, e))? {
            let path = entry?.path();
            let is_descriptor = path.is_file()
                && path.extension().is_some_and(|e| e == "toml")
                && !path
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with('.'));
            if !is_descriptor {
                continue;
            }
            match load_local(&root, &path) {
                Ok(local) => {
                    store.insert(local.id().clone(), local);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping broken extension descriptor"),
            }
        }

        validate(&mut store, &core);
        debug!(root = %root.display(), extensions = store.len(), "Opened local repository");

        Ok(Self {
            root,
            core,
            robustness: RobustnessConfig::default(),
            extensions: RwLock::new(store),
        })
    }

    pub fn with_robustness(mut self, robustness: RobustnessConfig) -> Self {
        self.robustness = robustness;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn core(&self) -> &Arc<CoreExtensionRepository> {
        &self.core
    }

    fn read(&self) -> RwLockReadGuard<'_, Store> {
        self.extensions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Store> {
        self.extensions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every stored extension, installed or not.
    pub fn local_extensions(&self) -> Vec<LocalExtension> {
        self.read().values().cloned().collect()
    }

    pub fn get_local_extension(&self, id: &ExtensionId) -> Option<LocalExtension> {
        self.read().get(id).cloned()
    }

    /// The version of `id` usable in `namespace`. A root install counts for
    /// every namespace, but an install made in the namespace itself wins.
    pub fn get_installed_extension(&self, id: &str, namespace: Option<&str>) -> Option<LocalExtension> {
        let store = self.read();
        let candidates = || store.values().rev().filter(|l| l.id().id() == id);
        candidates()
            .find(|l| l.is_installed_exactly(namespace))
            .or_else(|| candidates().find(|l| l.is_installed_in(namespace)))
            .cloned()
    }

    /// Extensions usable in `namespace`.
    pub fn installed_extensions(&self, namespace: Option<&str>) -> Vec<LocalExtension> {
        self.read()
            .values()
            .filter(|l| l.is_installed_in(namespace))
            .cloned()
            .collect()
    }

    /// Installed extensions that depend on `id`, each with the namespace it
    /// is installed in.
    ///
    /// For a namespace this is the extensions installed in that namespace.
    /// For the root it is every dependent, wherever it is installed, since a
    /// root install serves all namespaces.
    pub fn backward_dependencies(
        &self,
        id: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<(Option<String>, LocalExtension)>> {
        if self.get_installed_extension(id, namespace).is_none() {
            return Err(Error::NotInstalled {
                id: id.to_string(),
                namespace: namespace_label(namespace),
            });
        }

        let store = self.read();
        let mut dependents = Vec::new();
        for local in store.values().filter(|l| l.extension.dependency_on(id).is_some()) {
            match namespace {
                Some(ns) => {
                    if local.is_installed_exactly(Some(ns)) {
                        dependents.push((Some(ns.to_string()), local.clone()));
                    }
                }
                None => {
                    for ns in local.installed_namespaces() {
                        dependents.push((ns, local.clone()));
                    }
                }
            }
        }
        Ok(dependents)
    }

    /// Store `extension` if needed, downloading it from `source`, and mark it
    /// installed in `namespace`.
    ///
    /// Installing an extension that is already usable in the namespace only
    /// clears its `dependency` flag when `dependency` is false.
    pub fn install_extension(
        &self,
        extension: &Extension,
        source: &dyn ExtensionRepository,
        dependency: bool,
        namespace: Option<&str>,
    ) -> Result<LocalExtension> {
        if self.core.contains(extension.id.id()) {
            return Err(Error::CoreExtension {
                id: extension.id.id().to_string(),
            });
        }

        // The artifact transfer runs without any lock held.
        let fetched = match self.get_local_extension(&extension.id) {
            Some(_) => None,
            None => Some(self.download(extension, source, dependency)?),
        };

        let mut store = self.write();
        let _lock = DirectoryLock::acquire(&self.root)?;

        let (mut local, downloaded) = match (store.get(&extension.id), fetched) {
            (Some(existing), _) => (existing.clone(), false),
            (None, Some(fetched)) => (fetched, true),
            (None, None) => (self.download(extension, source, dependency)?, true),
        };

        if local.is_installed_in(namespace) {
            if dependency || !local.dependency {
                return Ok(local);
            }
            local.dependency = false;
        } else {
            let was_installed = local.installed;
            local.mark_installed(namespace);
            local.dependency = if was_installed {
                local.dependency && dependency
            } else {
                dependency
            };
        }

        if let Err(e) = save_local(&local) {
            if downloaded {
                extman_fs::io::remove_file(&local.file)?;
            }
            return Err(e);
        }
        info!(extension = %local.id(), namespace = %namespace_label(namespace), dependency = local.dependency, "Installed extension");
        store.insert(local.id().clone(), local.clone());
        Ok(local)
    }

    fn download(
        &self,
        extension: &Extension,
        source: &dyn ExtensionRepository,
        dependency: bool,
    ) -> Result<LocalExtension> {
        let file = self.root.join(extension.artifact_file_name());
        source.download(extension, &file)?;
        debug!(extension = %extension.id, repository = source.id(), "Downloaded extension");
        Ok(LocalExtension {
            extension: extension.clone(),
            dependency,
            installed: false,
            namespaces: None,
            file,
            descriptor: self.root.join(format!("{}.toml", extension.file_stem())),
        })
    }

    /// Set the `dependency` flag of a stored extension.
    pub fn set_dependency(&self, id: &ExtensionId, dependency: bool) -> Result<LocalExtension> {
        let mut store = self.write();
        let _lock = DirectoryLock::acquire(&self.root)?;

        let mut local = store.get(id).cloned().ok_or_else(|| Error::NotFound {
            id: id.to_string(),
            repository: LOCAL_REPOSITORY_ID.to_string(),
        })?;
        if local.dependency == dependency {
            return Ok(local);
        }

        local.dependency = dependency;
        save_local(&local)?;
        debug!(extension = %id, dependency, "Updated dependency flag");
        store.insert(id.clone(), local.clone());
        Ok(local)
    }

    /// Mark `id` as no longer installed in `namespace`. The artifact stays in
    /// the repository.
    pub fn uninstall_extension(&self, id: &ExtensionId, namespace: Option<&str>) -> Result<LocalExtension> {
        let mut store = self.write();
        let _lock = DirectoryLock::acquire(&self.root)?;

        let mut local = store
            .get(id)
            .filter(|l| l.is_installed_exactly(namespace))
            .cloned()
            .ok_or_else(|| Error::NotInstalled {
                id: id.to_string(),
                namespace: namespace_label(namespace),
            })?;

        local.mark_uninstalled(namespace);
        save_local(&local)?;
        info!(extension = %id, namespace = %namespace_label(namespace), "Uninstalled extension");
        store.insert(id.clone(), local.clone());
        Ok(local)
    }
}

fn load_local(root: &Path, path: &Path) -> Result<LocalExtension> {
    let descriptor = ExtensionDescriptor::from_path(path)?;
    let install = descriptor.install.clone().unwrap_or(InstallSection {
        dependency: false,
        installed: false,
        namespaces: None,
        origin: None,
    });
    let origin = install.origin.as_deref().unwrap_or(LOCAL_REPOSITORY_ID);
    let extension = descriptor.to_extension(origin);

    let file = root.join(extension.artifact_file_name());
    if !file.is_file() {
        return Err(Error::DescriptorParse {
            path: path.to_path_buf(),
            message: format!("artifact {} does not exist", file.display()),
        });
    }

    Ok(LocalExtension {
        extension,
        dependency: install.dependency,
        installed: install.installed,
        namespaces: install.namespaces,
        file,
        descriptor: path.to_path_buf(),
    })
}

fn save_local(local: &LocalExtension) -> Result<()> {
    let mut descriptor = ExtensionDescriptor::from_extension(&local.extension);
    descriptor.install = Some(InstallSection {
        dependency: local.dependency,
        installed: local.installed,
        namespaces: local.namespaces.clone(),
        origin: (!local.extension.repository.is_empty()).then(|| local.extension.repository.clone()),
    });
    descriptor.save(&local.descriptor)
}

/// Drop installs that cannot work: core ids, and extensions whose
/// dependencies are neither core nor installed in the same namespace.
/// Repeats until stable since one dropped install can break others.
fn validate(store: &mut Store, core: &CoreExtensionRepository) {
    loop {
        let mut invalid: Vec<(ExtensionId, Option<String>)> = Vec::new();

        for local in store.values() {
            for namespace in local.installed_namespaces() {
                let usable = !core.contains(local.id().id())
                    && local.extension.dependencies.iter().all(|dependency| {
                        core.contains(&dependency.id)
                            || store.values().any(|other| {
                                other.id().id() == dependency.id
                                    && other.is_installed_in(namespace.as_deref())
                            })
                    });
                if !usable {
                    invalid.push((local.id().clone(), namespace));
                }
            }
        }

        if invalid.is_empty() {
            return;
        }
        for (id, namespace) in invalid {
            if let Some(local) = store.get_mut(&id) {
                warn!(extension = %id, namespace = %namespace_label(namespace.as_deref()), "Extension is not usable, marking it uninstalled");
                local.mark_uninstalled(namespace.as_deref());
            }
        }
    }
}

impl ExtensionRepository for LocalExtensionRepository {
    fn id(&self) -> &str {
        LOCAL_REPOSITORY_ID
    }

    fn resolve(&self, id: &ExtensionId) -> Result<Extension> {
        self.get_local_extension(id)
            .map(|l| l.extension)
            .ok_or_else(|| Error::NotFound {
                id: id.to_string(),
                repository: LOCAL_REPOSITORY_ID.to_string(),
            })
    }

    fn exists(&self, id: &ExtensionId) -> bool {
        self.read().contains_key(id)
    }

    fn versions(&self, id: &str) -> Result<Vec<Version>> {
        Ok(self
            .read()
            .keys()
            .filter(|k| k.id() == id)
            .map(|k| k.version().clone())
            .collect())
    }

    fn download(&self, extension: &Extension, target: &Path) -> Result<()> {
        let source = self
            .get_local_extension(&extension.id)
            .map(|l| l.file)
            .ok_or_else(|| Error::NotFound {
                id: extension.id.to_string(),
                repository: LOCAL_REPOSITORY_ID.to_string(),
            })?;
        if source != target {
            extman_fs::io::copy_with_retry(&source, target, self.robustness)?;
        }
        Ok(())
    }
}

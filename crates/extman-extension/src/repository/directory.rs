use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use extman_fs::RobustnessConfig;
use extman_fs::checksum;
use extman_version::Version;
use tracing::{debug, warn};

use super::ExtensionRepository;
use crate::descriptor::{DESCRIPTOR_FILENAME, ExtensionDescriptor, decode_name, encode_name};
use crate::error::{Error, Result};
use crate::extension::Extension;
use crate::id::ExtensionId;

/// A repository laid out on disk as
/// `<root>/<id>/<version>/extension.toml` next to the artifact
/// `<id>-<version>.<type>`. Path segments are percent-encoded.
#[derive(Debug, Clone)]
pub struct DirectoryExtensionRepository {
    id: String,
    root: PathBuf,
    robustness: RobustnessConfig,
}

impl DirectoryExtensionRepository {
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
            robustness: RobustnessConfig::default(),
        }
    }

    pub fn with_robustness(mut self, robustness: RobustnessConfig) -> Self {
        self.robustness = robustness;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn version_dir(&self, id: &ExtensionId) -> PathBuf {
        self.root
            .join(encode_name(id.id()))
            .join(encode_name(id.version().value()))
    }

    /// Store an extension and its artifact. A missing checksum is computed
    /// from the artifact.
    pub fn publish(&self, extension: &Extension, artifact: &[u8]) -> Result<Extension> {
        let mut extension = extension.clone();
        if extension.checksum.is_none() {
            extension.checksum = Some(checksum::compute_bytes_checksum(artifact));
        }
        extension.repository = self.id.clone();

        let dir = self.version_dir(&extension.id);
        extman_fs::io::write_atomic(&dir.join(extension.artifact_file_name()), artifact)?;
        ExtensionDescriptor::from_extension(&extension).save(&dir.join(DESCRIPTOR_FILENAME))?;
        debug!(repository = %self.id, extension = %extension.id, "Published extension");
        Ok(extension)
    }
}

impl ExtensionRepository for DirectoryExtensionRepository {
    fn id(&self) -> &str {
        &self.id
    }

    fn resolve(&self, id: &ExtensionId) -> Result<Extension> {
        let path = self.version_dir(id).join(DESCRIPTOR_FILENAME);
        if !path.is_file() {
            return Err(Error::NotFound {
                id: id.to_string(),
                repository: self.id.clone(),
            });
        }
        let extension = ExtensionDescriptor::from_path(&path)?.to_extension(&self.id);
        if extension.id.id() != id.id() || extension.id.version() != id.version() {
            return Err(Error::DescriptorParse {
                path,
                message: format!("descriptor describes {} instead of {}", extension.id, id),
            });
        }
        Ok(extension)
    }

    fn exists(&self, id: &ExtensionId) -> bool {
        self.version_dir(id).join(DESCRIPTOR_FILENAME).is_file()
    }

    fn versions(&self, id: &str) -> Result<Vec<Version>> {
        let dir = self.root.join(encode_name(id));
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(extman_fs::Error::io(&dir, e).into()),
        };

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.path().join(DESCRIPTOR_FILENAME).is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match decode_name(&name) {
                Some(version) => versions.push(Version::new(version)),
                None => warn!(path = %entry.path().display(), "Skipping undecodable version directory"),
            }
        }
        versions.sort();
        Ok(versions)
    }

    fn download(&self, extension: &Extension, target: &Path) -> Result<()> {
        let source = self
            .version_dir(&extension.id)
            .join(extension.artifact_file_name());
        if !source.is_file() {
            return Err(Error::NotFound {
                id: extension.id.to_string(),
                repository: self.id.clone(),
            });
        }
        extman_fs::io::copy_with_retry(&source, target, self.robustness)?;
        if let Some(expected) = &extension.checksum {
            if let Err(e) = checksum::verify_file_checksum(target, expected) {
                extman_fs::io::remove_file(target)?;
                return Err(e.into());
            }
        }
        Ok(())
    }
}

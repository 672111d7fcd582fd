//! Extension manager configuration.
//!
//! Loaded from an explicit path or from `<config_dir>/extman/config.toml`.
//!
//! ```toml
//! local_repository = "/var/lib/extman/repository"
//! conflict_policy = "wait"
//!
//! [[repositories]]
//! id = "central"
//! path = "/srv/extensions"
//!
//! [[core]]
//! id = "org.example:platform"
//! version = "3.0"
//! ```
//!
//! Relative paths are resolved against the directory of the file they appear in.

use std::path::{Path, PathBuf};

use extman_version::Version;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding `local_repository`.
pub const LOCAL_REPOSITORY_ENV: &str = "EXTMAN_LOCAL_REPOSITORY";

const APP_DIR: &str = "extman";
const CONFIG_FILENAME: &str = "config.toml";

/// What a job does when another job holds a conflicting group path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Queue until the conflicting job finishes.
    #[default]
    Wait,
    /// Refuse the submission.
    Reject,
}

/// A remote directory repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub id: String,
    pub path: PathBuf,
}

/// An extension provided by the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreExtensionConfig {
    pub id: String,
    pub version: Version,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionManagerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_repository: Option<PathBuf>,
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
    #[serde(default)]
    pub core: Vec<CoreExtensionConfig>,
}

impl ExtensionManagerConfig {
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// The configured local repository, or `<data_dir>/extman/repository`.
    pub fn local_repository_path(&self) -> Option<PathBuf> {
        self.local_repository
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join(APP_DIR).join("repository")))
    }

    /// Apply environment overrides, read through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(LOCAL_REPOSITORY_ENV).filter(|p| !p.is_empty()) {
            tracing::debug!(%path, "Local repository overridden from environment");
            self.local_repository = Some(PathBuf::from(path));
        }
    }

    fn resolve_relative(&mut self, base: &Path) {
        if let Some(local) = self.local_repository.as_mut() {
            if local.is_relative() {
                *local = base.join(&*local);
            }
        }
        for repository in &mut self.repositories {
            if repository.path.is_relative() {
                repository.path = base.join(&repository.path);
            }
        }
    }
}

/// Finds and loads the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Used instead of `dirs::config_dir()` when set (tests).
    config_dir_override: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config_dir` as the platform config directory.
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir_override: Some(config_dir.into()),
        }
    }

    /// `<config_dir>/extman/config.toml`.
    pub fn default_path(&self) -> Option<PathBuf> {
        self.config_dir_override
            .clone()
            .or_else(dirs::config_dir)
            .map(|d| d.join(APP_DIR).join(CONFIG_FILENAME))
    }

    /// Load `explicit`, which must exist, or the default file if there is
    /// one. Without either the default configuration is returned.
    pub fn load(&self, explicit: Option<&Path>) -> Result<ExtensionManagerConfig> {
        let path = match explicit {
            Some(path) if !path.is_file() => {
                return Err(Error::ConfigNotFound {
                    path: path.to_path_buf(),
                });
            }
            Some(path) => path.to_path_buf(),
            None => match self.default_path() {
                Some(path) if path.is_file() => path,
                other => {
                    tracing::debug!(path = ?other, "No configuration file, using defaults");
                    return Ok(ExtensionManagerConfig::default());
                }
            },
        };

        tracing::debug!(path = %path.display(), "Loading configuration");
        let content = extman_fs::io::read_text(&path)?;
        let mut config = ExtensionManagerConfig::parse(&content, &path)?;
        if let Some(base) = path.parent() {
            config.resolve_relative(base);
        }
        Ok(config)
    }
}

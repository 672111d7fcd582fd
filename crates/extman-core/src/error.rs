//! Error types for extman-core

use std::fmt;

use extman_extension::ExtensionId;
use extman_version::{Version, VersionConstraint};

use crate::job::JobGroupPath;

/// Result type for extman-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// One requester of a dependency and the constraint it asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub requester: ExtensionId,
    pub constraint: VersionConstraint,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} requires {}", self.requester, self.constraint)
    }
}

/// `a requires x, b requires y`
pub struct Requirements<'a>(pub &'a [Requirement]);

impl fmt::Display for Requirements<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, requirement) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{requirement}")?;
        }
        Ok(())
    }
}

/// Why an install or uninstall plan could not be built.
///
/// Every variant names the extension it is about.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("{id} is a core extension")]
    AlreadyCore { id: String },

    #[error("{id} is already installed in {namespace}")]
    AlreadyInstalled { id: ExtensionId, namespace: String },

    #[error("cannot install {id}: {installed} is already installed in {namespace}")]
    NewerVersionInstalled {
        id: ExtensionId,
        installed: ExtensionId,
        namespace: String,
    },

    #[error("cannot resolve {id}: {message}")]
    NotFound { id: String, message: String },

    #[error("core extension {id} {version} does not satisfy {constraint} ({requester})")]
    IncompatibleCoreExtension {
        id: String,
        version: Version,
        constraint: VersionConstraint,
        requester: ExtensionId,
    },

    /// The requesters of a dependency ask for versions no single version can satisfy.
    #[error("incompatible constraints on {id}: {}: {reason}", Requirements(.requirements))]
    IncompatibleConstraints {
        id: String,
        requirements: Vec<Requirement>,
        reason: String,
    },

    /// An installed extension pins a dependency that would have to change.
    #[error("cannot upgrade {installed} to satisfy {constraint}: installed {dependent} requires {required}")]
    IncompatibleWithInstalled {
        installed: ExtensionId,
        constraint: VersionConstraint,
        dependent: ExtensionId,
        required: VersionConstraint,
    },

    #[error("no version of {id} satisfies {constraint} ({})", Requirements(.requirements))]
    Unsatisfiable {
        id: String,
        constraint: VersionConstraint,
        requirements: Vec<Requirement>,
    },

    #[error("{id} is a core extension and cannot be uninstalled")]
    CannotUninstallCore { id: String },

    #[error("{id} is not installed in {namespace}")]
    NotInstalled { id: ExtensionId, namespace: String },

    #[error("planning cancelled")]
    Cancelled,
}

impl ResolutionError {
    /// The extension identifier the error is about, if any.
    pub fn extension_id(&self) -> Option<&str> {
        match self {
            Self::AlreadyCore { id }
            | Self::NotFound { id, .. }
            | Self::IncompatibleCoreExtension { id, .. }
            | Self::IncompatibleConstraints { id, .. }
            | Self::Unsatisfiable { id, .. }
            | Self::CannotUninstallCore { id } => Some(id),
            Self::AlreadyInstalled { id, .. }
            | Self::NewerVersionInstalled { id, .. }
            | Self::NotInstalled { id, .. } => Some(id.id()),
            Self::IncompatibleWithInstalled { installed, .. } => Some(installed.id()),
            Self::Cancelled => None,
        }
    }
}

/// Why a job did not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Applying the plan failed. Steps already applied were reverted.
    #[error("failed to apply {id} in {namespace}: {message}")]
    Apply {
        id: ExtensionId,
        namespace: String,
        message: String,
    },

    #[error("job cancelled")]
    Cancelled,

    /// The job body panicked.
    #[error("job aborted: {message}")]
    Aborted { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// Another job holds a conflicting group path.
    #[error("job group {group} is busy")]
    GroupBusy { group: JobGroupPath },

    #[error("failed to start job worker: {message}")]
    Spawn { message: String },
}

/// Errors building or driving an [`ExtensionManager`](crate::ExtensionManager).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Neither the configuration nor the platform names a local repository.
    #[error("no local repository configured")]
    NoLocalRepository,

    #[error(transparent)]
    Extension(#[from] extman_extension::Error),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

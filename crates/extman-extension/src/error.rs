use std::path::PathBuf;

/// Errors that can occur while describing, storing or resolving extensions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The repository has no extension with this id and version.
    #[error("extension {id} not found in repository {repository}")]
    NotFound { id: String, repository: String },

    /// No available version satisfies the constraint.
    #[error("no version of {id} matches {constraint}")]
    NoMatchingVersion { id: String, constraint: String },

    /// Text that is not `id/version`.
    #[error("invalid extension id '{text}': {reason}")]
    InvalidExtensionId { text: String, reason: String },

    /// Failed to parse an extension descriptor.
    #[error("failed to parse extension descriptor {path}: {message}")]
    DescriptorParse { path: PathBuf, message: String },

    /// Failed to serialize an extension descriptor.
    #[error("failed to serialize extension descriptor: {0}")]
    DescriptorSerialize(String),

    /// The extension is not installed in the namespace.
    #[error("extension {id} is not installed in {namespace}")]
    NotInstalled { id: String, namespace: String },

    /// Core extensions are provided by the environment and never stored locally.
    #[error("extension {id} is a core extension")]
    CoreExtension { id: String },

    /// Configuration file not found at an explicitly requested path.
    #[error("configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse the configuration file.
    #[error("failed to parse configuration {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error(transparent)]
    Version(#[from] extman_version::Error),

    #[error(transparent)]
    Fs(#[from] extman_fs::Error),

    /// I/O error reading or writing extension files.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Human-readable namespace for log and error messages.
pub fn namespace_label(namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) => format!("namespace {ns}"),
        None => "root namespace".to_string(),
    }
}

//! Extensions and the repositories they come from
//!
//! This crate sits between the version layer and the job layer:
//!
//! - **Identity**: [`ExtensionId`] (`id/version`) and [`ExtensionDependency`]
//!   edges carrying a [`VersionConstraint`](extman_version::VersionConstraint)
//! - **Extensions**: [`Extension`] as described by a repository, and
//!   [`LocalExtension`] with its installed namespaces
//! - **Descriptors**: the TOML format shared by directory and local repositories
//! - **Repositories**: core, local, directory, in-memory, and the ordered
//!   [`ExtensionRepositoryManager`] over remote ones
//! - **Configuration**: [`ExtensionManagerConfig`] and its [`ConfigLoader`]
//!
//! # Architecture
//!
//! ```text
//!              extman-core
//!                   |
//!           extman-extension
//!                   |
//!       +-----------+----------+
//!       |                      |
//! extman-version           extman-fs
//! ```
//!
//! # Example
//!
//! ```
//! use extman_extension::{Extension, ExtensionDependency, ExtensionId};
//! use extman_extension::repository::{ExtensionRepository, MemoryExtensionRepository};
//!
//! let repository = MemoryExtensionRepository::new("central")
//!     .with_extension(Extension::new(ExtensionId::new("lib", "1.0")))
//!     .with_extension(Extension::new(ExtensionId::new("lib", "1.5")));
//!
//! let lib = repository
//!     .resolve_dependency(&ExtensionDependency::parse("lib", "[1.0,2.0)"))
//!     .unwrap();
//! assert_eq!(lib.id.to_string(), "lib/1.5");
//! ```

pub mod config;
pub mod descriptor;
pub mod error;
pub mod extension;
pub mod id;
pub mod repository;

pub use config::{
    ConfigLoader, ConflictPolicy, CoreExtensionConfig, ExtensionManagerConfig, RepositoryConfig,
};
pub use descriptor::ExtensionDescriptor;
pub use error::{Error, Result, namespace_label};
pub use extension::{Extension, LocalExtension};
pub use id::{ExtensionDependency, ExtensionId};
pub use repository::{
    CoreExtensionRepository, DirectoryExtensionRepository, ExtensionRepository,
    ExtensionRepositoryManager, LocalExtensionRepository, MemoryExtensionRepository,
};

//! Filesystem helpers for Extension Manager
//!
//! Locked atomic writes, retrying copies, checksums and directory locks used
//! by the on-disk repositories.

pub mod checksum;
pub mod error;
pub mod io;
pub mod lock;

pub use error::{Error, Result};
pub use io::RobustnessConfig;
pub use lock::DirectoryLock;

//! Version handling for Extension Manager.
//!
//! This crate is the leaf layer of the workspace. It knows nothing about
//! extensions or repositories, only about version text:
//!
//! - [`Version`]: a single comparable version (`1.1-milestone-1`)
//! - [`VersionRange`]: an interval such as `[1.0,2.0)`
//! - [`VersionRangeCollection`]: a union of ranges, `[1.0,2.0),[3.0,)`
//! - [`VersionConstraint`]: an exact version or brace-grouped alternatives,
//!   `{[1.0,2.0]},{[1.5,3.0]}`, with merge support
//!
//! All types are immutable values and safe to share across threads.
//!
//! # Example
//!
//! ```
//! use extman_version::VersionConstraint;
//!
//! let a = VersionConstraint::parse("[1.0,2.0]");
//! let b = VersionConstraint::parse("[2.0]");
//! let merged = a.merge(&b).unwrap();
//! assert_eq!(merged.value(), "{[1.0,2.0]},{[2.0]}");
//! ```

pub mod collection;
pub mod constraint;
pub mod error;
pub mod range;
pub mod version;

pub use collection::VersionRangeCollection;
pub use constraint::{ConstraintSyntax, VersionConstraint};
pub use error::{Error, Result};
pub use range::{Bound, VersionRange};
pub use version::{Version, VersionType};

//! Command implementations for extman-cli

pub mod constraint;
pub mod jobs;
pub mod list;
pub mod version;

pub use constraint::{run_constraint_check, run_constraint_merge};
pub use jobs::{run_install, run_plan, run_uninstall};
pub use list::run_list;
pub use version::{run_version_compare, run_version_type};

//! `extman constraint` subcommands.

use colored::Colorize;
use extman_version::{Version, VersionConstraint};

use crate::error::{CliError, Result};

/// Merge `constraints` left to right.
pub fn merge(constraints: &[String]) -> Result<VersionConstraint> {
    let (first, rest) = constraints
        .split_first()
        .ok_or_else(|| CliError::user("no constraint given"))?;
    let mut merged = VersionConstraint::parse(first);
    for text in rest {
        merged = merged.merge(&VersionConstraint::parse(text))?;
    }
    Ok(merged)
}

pub fn run_constraint_merge(constraints: &[String]) -> Result<()> {
    println!("{}", merge(constraints)?.value());
    Ok(())
}

/// Succeeds when `version` satisfies `constraint`.
pub fn run_constraint_check(constraint: &str, version: &str) -> Result<()> {
    let constraint = VersionConstraint::parse(constraint);
    let version = Version::new(version);
    if !constraint.contains_version(&version) {
        return Err(CliError::user(format!("{version} does not satisfy {constraint}")));
    }
    println!("{} {version} satisfies {constraint}", "OK".green().bold());
    Ok(())
}

//! `extman version` subcommands.

use std::cmp::Ordering;

use extman_version::Version;

use crate::error::Result;

/// Render how `left` orders against `right`, e.g. `1.1-rc-1 < 1.1`.
pub fn compare(left: &str, right: &str) -> String {
    let (a, b) = (Version::new(left), Version::new(right));
    let symbol = match a.cmp(&b) {
        Ordering::Less => "<",
        Ordering::Equal => "==",
        Ordering::Greater => ">",
    };
    format!("{a} {symbol} {b}")
}

pub fn run_version_compare(left: &str, right: &str) -> Result<()> {
    println!("{}", compare(left, right));
    Ok(())
}

pub fn run_version_type(version: &str) -> Result<()> {
    println!("{}", Version::new(version).version_type());
    Ok(())
}

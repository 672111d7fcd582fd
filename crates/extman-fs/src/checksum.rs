//! SHA-256 checksum utilities
//!
//! Checksums use one canonical format, `sha256:<hex>`. Extension descriptors
//! store it and downloads are verified against it.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of a byte slice.
pub fn compute_bytes_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Compute the SHA-256 checksum of a file's contents.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read.
pub fn compute_file_checksum(path: &Path) -> Result<String> {
    let content = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(compute_bytes_checksum(&content))
}

/// Check a file against an expected checksum.
///
/// A bare hex digest without the `sha256:` prefix is accepted too.
pub fn verify_file_checksum(path: &Path, expected: &str) -> Result<()> {
    let actual = compute_file_checksum(path)?;
    let expected_hex = expected.strip_prefix(PREFIX).unwrap_or(expected);
    if actual[PREFIX.len()..].eq_ignore_ascii_case(expected_hex) {
        Ok(())
    } else {
        Err(Error::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        })
    }
}

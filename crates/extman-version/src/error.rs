//! Error types for extman-version

/// Result type for extman-version operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing ranges or merging constraints.
///
/// Plain version strings never fail to parse, so there is no variant for them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Malformed range text such as `[1.0` or `(1.0)`.
    #[error("invalid version range [{range}]: {reason}")]
    InvalidVersionRange { range: String, reason: String },

    /// Two constraints cannot be satisfied by any single version.
    #[error("incompatible version constraints [{left}] and [{right}]: {reason}")]
    IncompatibleVersionConstraint {
        left: String,
        right: String,
        reason: String,
    },
}

impl Error {
    pub(crate) fn invalid_range(range: &str, reason: impl Into<String>) -> Self {
        Self::InvalidVersionRange {
            range: range.to_string(),
            reason: reason.into(),
        }
    }
}

//! Version constraints attached to dependencies.
//!
//! A constraint is either an exact version (`1.0`) or one or more groups of
//! ranges (`{[1.0,2.0]},{[1.5,3.0]}`). A version satisfies a range
//! constraint when every group contains it. A group itself matches when any
//! of its ranges does.
//!
//! Parsing happens in two steps. [`ConstraintSyntax::classify`] decides
//! whether the text is range syntax or a literal version, and
//! [`VersionConstraint::parse`] builds the value. Malformed range text is a
//! literal version, not an error.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::collection::VersionRangeCollection;
use crate::error::{Error, Result};
use crate::range::VersionRange;
use crate::version::Version;

/// The outcome of classifying constraint text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintSyntax {
    /// Well-formed range groups.
    Ranges(Vec<VersionRangeCollection>),
    /// Anything else, kept verbatim as a version.
    Literal(Version),
}

impl ConstraintSyntax {
    pub fn classify(text: &str) -> Self {
        let trimmed = text.trim();
        if !trimmed.starts_with(['{', '[', '(']) {
            return Self::Literal(Version::new(text));
        }

        match parse_groups(trimmed) {
            Ok(groups) => Self::Ranges(groups),
            Err(e) => {
                debug!(text, error = %e, "Constraint is not range syntax, using it as a version");
                Self::Literal(Version::new(text))
            }
        }
    }
}

/// `{a},{b}` or a bare collection.
fn parse_groups(text: &str) -> Result<Vec<VersionRangeCollection>> {
    if !text.starts_with('{') {
        return Ok(vec![VersionRangeCollection::parse(text)?]);
    }

    let mut groups = Vec::new();
    let mut rest = text;
    loop {
        let body = rest
            .strip_prefix('{')
            .ok_or_else(|| Error::invalid_range(text, "expected '{'"))?;
        let end = body
            .find('}')
            .ok_or_else(|| Error::invalid_range(text, "missing '}'"))?;
        let inner = &body[..end];
        if inner.contains('{') {
            return Err(Error::invalid_range(text, "nested '{'"));
        }
        groups.push(VersionRangeCollection::parse(inner.trim())?);

        rest = body[end + 1..].trim_start();
        if rest.is_empty() {
            return Ok(groups);
        }
        rest = rest
            .strip_prefix(',')
            .ok_or_else(|| Error::invalid_range(text, "expected ',' between groups"))?
            .trim_start();
    }
}

/// A constraint on acceptable versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionConstraint {
    /// A pinned version.
    Exact(Version),
    /// Groups that must all match. Never empty when built by this crate.
    Ranges(Vec<VersionRangeCollection>),
}

impl VersionConstraint {
    /// Parse constraint text. Never fails.
    pub fn parse(text: &str) -> Self {
        match ConstraintSyntax::classify(text) {
            ConstraintSyntax::Ranges(groups) => Self::Ranges(groups),
            ConstraintSyntax::Literal(version) => Self::Exact(version),
        }
    }

    pub fn exact(version: impl Into<Version>) -> Self {
        Self::Exact(version.into())
    }

    /// The pinned version, if this is an exact constraint.
    pub fn version(&self) -> Option<&Version> {
        match self {
            Self::Exact(v) => Some(v),
            Self::Ranges(_) => None,
        }
    }

    /// The range groups. Empty for an exact constraint.
    pub fn ranges(&self) -> &[VersionRangeCollection] {
        match self {
            Self::Exact(_) => &[],
            Self::Ranges(groups) => groups,
        }
    }

    /// Canonical text form.
    pub fn value(&self) -> String {
        self.to_string()
    }

    /// Whether `version` satisfies the constraint.
    pub fn contains_version(&self, version: &Version) -> bool {
        match self {
            Self::Exact(v) => v == version,
            Self::Ranges(groups) => groups.iter().all(|g| g.contains(version)),
        }
    }

    /// Whether an already selected `version` can serve this constraint.
    ///
    /// An exact constraint accepts the pinned version or anything newer.
    pub fn is_compatible(&self, version: &Version) -> bool {
        match self {
            Self::Exact(v) => version >= v,
            Self::Ranges(_) => self.contains_version(version),
        }
    }

    /// The set of versions matching every group, or `None` if there is none.
    pub fn effective_ranges(&self) -> Option<VersionRangeCollection> {
        match self {
            Self::Exact(v) => Some(VersionRange::exact(v.clone()).into()),
            Self::Ranges(groups) => {
                let (first, rest) = groups.split_first()?;
                rest.iter()
                    .try_fold(first.clone(), |acc, group| acc.intersect(group))
            }
        }
    }

    /// Combine the requirements of two requesters.
    ///
    /// - equal constraints merge to themselves
    /// - two exact versions merge to the higher one
    /// - an exact version and ranges merge to the version when every group
    ///   contains it
    /// - two range constraints merge to the union of their groups, provided
    ///   some version still satisfies all of them
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleVersionConstraint`] when no version can
    /// satisfy both constraints.
    pub fn merge(&self, other: &Self) -> Result<Self> {
        if self == other {
            return Ok(self.clone());
        }

        match (self, other) {
            (Self::Exact(a), Self::Exact(b)) => Ok(Self::Exact(a.max(b).clone())),
            (Self::Exact(v), Self::Ranges(_)) => self.merge_pin(v, other),
            (Self::Ranges(_), Self::Exact(v)) => other.merge_pin(v, self).map_err(|e| match e {
                Error::IncompatibleVersionConstraint { reason, .. } => {
                    self.incompatible(other, reason)
                }
                e => e,
            }),
            (Self::Ranges(left), Self::Ranges(right)) => {
                let mut groups = left.clone();
                for group in right {
                    if !groups.contains(group) {
                        groups.push(group.clone());
                    }
                }
                let merged = Self::Ranges(groups);
                if merged.effective_ranges().is_none() {
                    return Err(self.incompatible(other, "no version satisfies every range"));
                }
                Ok(merged)
            }
        }
    }

    fn merge_pin(&self, version: &Version, ranges: &Self) -> Result<Self> {
        if ranges.contains_version(version) {
            Ok(self.clone())
        } else {
            Err(self.incompatible(
                ranges,
                format!("version {version} is outside the allowed ranges"),
            ))
        }
    }

    fn incompatible(&self, other: &Self, reason: impl Into<String>) -> Error {
        Error::IncompatibleVersionConstraint {
            left: self.to_string(),
            right: other.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "{v}"),
            Self::Ranges(groups) if groups.len() == 1 => write!(f, "{}", groups[0]),
            Self::Ranges(groups) => {
                for (i, group) in groups.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{{{group}}}")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<Version> for VersionConstraint {
    fn from(version: Version) -> Self {
        Self::Exact(version)
    }
}

impl From<VersionRangeCollection> for VersionConstraint {
    fn from(collection: VersionRangeCollection) -> Self {
        Self::Ranges(vec![collection])
    }
}

impl Serialize for VersionConstraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VersionConstraint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

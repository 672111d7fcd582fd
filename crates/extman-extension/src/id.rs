//! Extension identity and dependency edges.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use extman_version::{Version, VersionConstraint};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An extension identifier paired with a concrete version.
///
/// The text form is `id/version`. Identifiers may contain `/`, so parsing
/// splits on the last one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExtensionId {
    id: String,
    version: Version,
}

impl ExtensionId {
    pub fn new(id: impl Into<String>, version: impl Into<Version>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }

    /// Parse `id/version`.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidExtensionId {
            text: text.to_string(),
            reason: reason.to_string(),
        };
        let (id, version) = text
            .trim()
            .rsplit_once('/')
            .ok_or_else(|| invalid("expected <id>/<version>"))?;
        if id.is_empty() {
            return Err(invalid("empty identifier"));
        }
        if version.is_empty() {
            return Err(invalid("empty version"));
        }
        Ok(Self::new(id, Version::new(version)))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &Version {
        &self.version
    }
}

impl fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id, self.version)
    }
}

impl FromStr for ExtensionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// "Something requires `id` with `constraint`."
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtensionDependency {
    pub id: String,
    pub constraint: VersionConstraint,
    /// Identifiers dropped from the subtree below this edge.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub exclusions: BTreeSet<String>,
}

impl ExtensionDependency {
    pub fn new(id: impl Into<String>, constraint: impl Into<VersionConstraint>) -> Self {
        Self {
            id: id.into(),
            constraint: constraint.into(),
            exclusions: BTreeSet::new(),
        }
    }

    /// Parse the constraint from text, e.g. `ExtensionDependency::parse("lib", "[1.0,2.0]")`.
    pub fn parse(id: impl Into<String>, constraint: &str) -> Self {
        Self::new(id, VersionConstraint::parse(constraint))
    }

    pub fn with_exclusion(mut self, id: impl Into<String>) -> Self {
        self.exclusions.insert(id.into());
        self
    }

    pub fn excludes(&self, id: &str) -> bool {
        self.exclusions.contains(id)
    }
}

impl fmt::Display for ExtensionDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.id, self.constraint)
    }
}

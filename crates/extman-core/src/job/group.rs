use std::fmt;

use serde::Serialize;

const EXTENSION_GROUP: &str = "extension";
const NAMESPACE_GROUP: &str = "namespace";

/// Hierarchical lock scope of a job.
///
/// Two paths conflict when one is a prefix of the other, so a root job
/// (`extension`) excludes every namespace job
/// (`extension/namespace/<name>`), while jobs on different namespaces run
/// side by side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct JobGroupPath(Vec<String>);

impl JobGroupPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// The scope of root namespace jobs.
    pub fn root() -> Self {
        Self::new([EXTENSION_GROUP])
    }

    pub fn namespace(namespace: &str) -> Self {
        Self::new([EXTENSION_GROUP, NAMESPACE_GROUP, namespace])
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn conflicts_with(&self, other: &Self) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }
}

impl fmt::Display for JobGroupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

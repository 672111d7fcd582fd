//! Install and uninstall requests.

use std::fmt;

use extman_extension::ExtensionId;
use serde::Serialize;

use crate::job::JobGroupPath;

/// Install `extensions` in each of `namespaces`, or in the root namespace
/// when `namespaces` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallRequest {
    pub extensions: Vec<ExtensionId>,
    pub namespaces: Vec<String>,
}

/// Uninstall `extensions` from each of `namespaces`, or from the root
/// namespace when `namespaces` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UninstallRequest {
    pub extensions: Vec<ExtensionId>,
    pub namespaces: Vec<String>,
}

macro_rules! request_builders {
    ($request:ident) => {
        impl $request {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn with_extension(mut self, id: ExtensionId) -> Self {
                self.extensions.push(id);
                self
            }

            pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
                self.namespaces.push(namespace.into());
                self
            }

            /// The namespaces to act on, `None` standing for the root.
            pub fn target_namespaces(&self) -> Vec<Option<&str>> {
                if self.namespaces.is_empty() {
                    vec![None]
                } else {
                    self.namespaces.iter().map(|n| Some(n.as_str())).collect()
                }
            }
        }
    };
}

request_builders!(InstallRequest);
request_builders!(UninstallRequest);

/// What a job was asked to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobRequest {
    Install(InstallRequest),
    Uninstall(UninstallRequest),
}

impl JobRequest {
    pub fn extensions(&self) -> &[ExtensionId] {
        match self {
            Self::Install(r) => &r.extensions,
            Self::Uninstall(r) => &r.extensions,
        }
    }

    pub fn namespaces(&self) -> &[String] {
        match self {
            Self::Install(r) => &r.namespaces,
            Self::Uninstall(r) => &r.namespaces,
        }
    }

    /// A request for exactly one namespace locks that namespace. Anything
    /// else locks the whole extension tree.
    pub fn group_path(&self) -> JobGroupPath {
        match self.namespaces() {
            [namespace] => JobGroupPath::namespace(namespace),
            _ => JobGroupPath::root(),
        }
    }
}

impl fmt::Display for JobRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::Install(_) => "install",
            Self::Uninstall(_) => "uninstall",
        };
        write!(f, "{verb}")?;
        for id in self.extensions() {
            write!(f, " {id}")?;
        }
        if !self.namespaces().is_empty() {
            write!(f, " in {}", self.namespaces().join(", "))?;
        }
        Ok(())
    }
}

impl From<InstallRequest> for JobRequest {
    fn from(request: InstallRequest) -> Self {
        Self::Install(request)
    }
}

impl From<UninstallRequest> for JobRequest {
    fn from(request: UninstallRequest) -> Self {
        Self::Uninstall(request)
    }
}

//! Extension descriptor files.
//!
//! Repositories describe each extension version with a TOML descriptor. The
//! local repository adds an `[install]` table recording installed state.
//!
//! # Example TOML
//!
//! ```toml
//! [extension]
//! id = "org.example:macros"
//! version = "2.1"
//! type = "jar"
//! name = "Macros"
//! checksum = "sha256:9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//!
//! [[dependencies]]
//! id = "org.example:lib"
//! version = "[1.0,2.0]"
//! exclusions = ["org.example:legacy"]
//!
//! [install]
//! dependency = false
//! installed = true
//! namespaces = ["wiki1"]
//! origin = "central"
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use extman_version::{Version, VersionConstraint};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::extension::{DEFAULT_TYPE, Extension};
use crate::id::{ExtensionDependency, ExtensionId};

/// Descriptor file name inside a directory repository version folder.
pub const DESCRIPTOR_FILENAME: &str = "extension.toml";

/// A descriptor as stored on disk.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExtensionDescriptor {
    pub extension: ExtensionSection,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencySection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<InstallSection>,
}

/// The `[extension]` table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionSection {
    pub id: String,
    pub version: Version,
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

fn default_type() -> String {
    DEFAULT_TYPE.to_string()
}

/// One `[[dependencies]]` entry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DependencySection {
    pub id: String,
    pub version: VersionConstraint,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub exclusions: BTreeSet<String>,
}

/// The `[install]` table of a local descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InstallSection {
    #[serde(default)]
    pub dependency: bool,
    #[serde(default)]
    pub installed: bool,
    /// Absent for a root install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<BTreeSet<String>>,
    /// Repository the extension was downloaded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl ExtensionDescriptor {
    /// Describe an extension, without install state.
    pub fn from_extension(extension: &Extension) -> Self {
        Self {
            extension: ExtensionSection {
                id: extension.id.id().to_string(),
                version: extension.id.version().clone(),
                kind: extension.kind.clone(),
                name: extension.name.clone(),
                description: extension.description.clone(),
                checksum: extension.checksum.clone(),
            },
            dependencies: extension
                .dependencies
                .iter()
                .map(|d| DependencySection {
                    id: d.id.clone(),
                    version: d.constraint.clone(),
                    exclusions: d.exclusions.clone(),
                })
                .collect(),
            install: None,
        }
    }

    /// Build the extension this descriptor describes, attributed to `repository`.
    pub fn to_extension(&self, repository: &str) -> Extension {
        Extension {
            id: ExtensionId::new(self.extension.id.clone(), self.extension.version.clone()),
            kind: self.extension.kind.clone(),
            name: self.extension.name.clone(),
            description: self.extension.description.clone(),
            checksum: self.extension.checksum.clone(),
            dependencies: self
                .dependencies
                .iter()
                .map(|d| ExtensionDependency {
                    id: d.id.clone(),
                    constraint: d.version.clone(),
                    exclusions: d.exclusions.clone(),
                })
                .collect(),
            repository: repository.to_string(),
        }
    }

    /// Parse a descriptor from TOML. `path` is only used for error messages.
    pub fn from_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::DescriptorParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Read and parse a descriptor file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = extman_fs::io::read_text(path)?;
        Self::from_toml(&content, path)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::DescriptorSerialize(e.to_string()))
    }

    /// Serialize and write atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        extman_fs::io::write_text(path, &self.to_toml()?)?;
        Ok(())
    }
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-')
}

/// Percent-encode every byte outside `[A-Za-z0-9._-]`.
pub fn encode_name(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        if is_unreserved(byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

/// Reverse [`encode_name`]. Returns `None` for malformed escapes or invalid UTF-8.
pub fn decode_name(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MACROS_TOML: &str = r#"
[extension]
id = "org.example:macros"
version = "2.1"
name = "Macros"

[[dependencies]]
id = "org.example:lib"
version = "[1.0,2.0]"
exclusions = ["org.example:legacy"]

[[dependencies]]
id = "org.example:core"
version = "3.0"

[install]
dependency = true
installed = true
namespaces = ["wiki1"]
"#;

    #[test]
    fn test_parse_full_descriptor() {
        let descriptor = ExtensionDescriptor::from_toml(MACROS_TOML, Path::new("m.toml")).unwrap();
        let extension = descriptor.to_extension("local");

        assert_eq!(extension.id, ExtensionId::new("org.example:macros", "2.1"));
        assert_eq!(extension.kind, "jar");
        assert_eq!(extension.name.as_deref(), Some("Macros"));
        assert_eq!(extension.repository, "local");
        assert_eq!(extension.dependencies.len(), 2);
        assert_eq!(extension.dependencies[0].constraint.value(), "[1.0,2.0]");
        assert!(extension.dependencies[0].excludes("org.example:legacy"));
        assert_eq!(
            extension.dependencies[1].constraint.version().map(|v| v.value()),
            Some("3.0")
        );

        let install = descriptor.install.unwrap();
        assert!(install.dependency);
        assert_eq!(
            install.namespaces,
            Some(BTreeSet::from(["wiki1".to_string()]))
        );
    }

    #[test]
    fn test_descriptor_round_trip() {
        let extension = Extension::new(ExtensionId::new("a", "1.0-SNAPSHOT"))
            .with_type("zip")
            .with_checksum("sha256:00")
            .with_dependency(ExtensionDependency::parse("b", "{[1.0,2.0]},{[1.5,)}"));
        let toml = ExtensionDescriptor::from_extension(&extension).to_toml().unwrap();
        let back = ExtensionDescriptor::from_toml(&toml, Path::new("a.toml")).unwrap();

        assert_eq!(back.to_extension(""), extension);
        assert!(back.install.is_none());
    }

    #[test]
    fn test_parse_rejects_unknown_extension_fields() {
        let err = ExtensionDescriptor::from_toml(
            "[extension]\nid = \"a\"\nversion = \"1\"\ncolour = \"red\"\n",
            Path::new("bad.toml"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::DescriptorParse { .. }));
    }

    #[test]
    fn test_encode_decode_name() {
        assert_eq!(encode_name("org.example:lib"), "org.example%3Alib");
        assert_eq!(encode_name("a/b c"), "a%2Fb%20c");
        assert_eq!(decode_name("org.example%3Alib").as_deref(), Some("org.example:lib"));
        assert_eq!(decode_name("%E2%9C%93").as_deref(), Some("\u{2713}"));
        assert_eq!(decode_name("%zz"), None);
        assert_eq!(decode_name("%4"), None);
    }
}

//! `extman list`

use colored::Colorize;
use extman_core::ExtensionManager;
use extman_extension::LocalExtension;
use serde::Serialize;

use crate::error::Result;

/// One installed extension, as printed by `extman list --json`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ListedExtension {
    pub id: String,
    pub version: String,
    pub dependency: bool,
    /// `None` when installed in the root namespace.
    pub namespaces: Option<Vec<String>>,
}

impl From<&LocalExtension> for ListedExtension {
    fn from(local: &LocalExtension) -> Self {
        Self {
            id: local.id().id().to_string(),
            version: local.id().version().to_string(),
            dependency: local.dependency,
            namespaces: local.namespaces.as_ref().map(|set| set.iter().cloned().collect()),
        }
    }
}

/// Installed extensions usable in `namespace`, or installed anywhere.
pub fn listed(manager: &ExtensionManager, namespace: Option<&str>) -> Vec<ListedExtension> {
    let mut installed = match namespace {
        Some(_) => manager.installed_extensions(namespace),
        None => manager
            .local_repository()
            .local_extensions()
            .into_iter()
            .filter(|l| l.installed)
            .collect(),
    };
    installed.sort_by(|a, b| a.id().cmp(b.id()));
    installed.iter().map(ListedExtension::from).collect()
}

/// Handle `extman list [-n ns] [--json]`
pub fn run_list(manager: &ExtensionManager, namespace: Option<&str>, json: bool) -> Result<()> {
    let extensions = listed(manager, namespace);
    if json {
        println!("{}", serde_json::to_string_pretty(&extensions)?);
        return Ok(());
    }

    if extensions.is_empty() {
        println!("{}", "No extensions installed.".dimmed());
        return Ok(());
    }
    for extension in &extensions {
        let namespaces = match &extension.namespaces {
            None => "root".to_string(),
            Some(list) => list.join(", "),
        };
        let marker = if extension.dependency {
            " [dependency]".dimmed().to_string()
        } else {
            String::new()
        };
        println!(
            "  {}/{}{marker} {}",
            extension.id.green(),
            extension.version,
            format!("({namespaces})").dimmed()
        );
    }
    println!("{} {} installed", "Total:".dimmed(), extensions.len());
    Ok(())
}

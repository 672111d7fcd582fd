//! End-to-end integration test for the vertical slice
//!
//! This test exercises the complete flow: config loading -> repositories ->
//! install jobs -> local repository on disk.

use std::fs;
use std::sync::Arc;

use extman_core::{ExtensionManager, InstallRequest, PlanAction, UninstallRequest};
use extman_extension::{
    ConfigLoader, CoreExtensionRepository, DirectoryExtensionRepository, Extension, ExtensionId,
    ExtensionRepositoryManager, LocalExtensionRepository, MemoryExtensionRepository,
};
use extman_test_utils::ExtensionFixture;
use pretty_assertions::assert_eq;

fn id(text: &str) -> ExtensionId {
    ExtensionId::parse(text).unwrap()
}

/// A manager over the fixture's configuration plus an in-memory `mirror`
/// repository queried after the configured ones.
fn setup(fixture: &ExtensionFixture) -> ExtensionManager {
    let config = ConfigLoader::new()
        .load(Some(&fixture.write_config()))
        .unwrap();

    let core = Arc::new(CoreExtensionRepository::from_config(&config.core));
    let local = Arc::new(
        LocalExtensionRepository::open(config.local_repository_path().unwrap(), Arc::clone(&core))
            .unwrap(),
    );

    let mut remote = ExtensionRepositoryManager::new();
    for repository in &config.repositories {
        remote.add_repository(Arc::new(DirectoryExtensionRepository::new(
            repository.id.clone(),
            repository.path.clone(),
        )));
    }
    let mut mirror = MemoryExtensionRepository::new("mirror");
    mirror.add(Extension::new(id("lib/2.0")), b"lib 2.0 from mirror".to_vec());
    remote.add_repository(Arc::new(mirror));

    ExtensionManager::new(core, local, Arc::new(remote))
}

fn fixture() -> ExtensionFixture {
    ExtensionFixture::new()
        .with_core("platform", "3.0")
        .publish("lib", "1.0", &[])
        .publish("app", "1.0", &[("lib", "[1.0,)"), ("platform", "[3.0]")])
}

#[test]
fn test_highest_version_across_repositories() {
    let fixture = fixture();
    let manager = setup(&fixture);

    let applied = manager
        .install(InstallRequest::new().with_extension(id("app/1.0")).with_namespace("wiki1"))
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(applied.len(), 2);

    let lib = manager
        .local_repository()
        .get_installed_extension("lib", Some("wiki1"))
        .unwrap();
    assert_eq!(lib.id(), &id("lib/2.0"));
    assert_eq!(lib.extension.repository, "mirror");
    assert_eq!(fs::read_to_string(&lib.file).unwrap(), "lib 2.0 from mirror");

    // A fresh process sees the same state, origin included.
    let reopened = fixture.open_local();
    let lib = reopened.get_installed_extension("lib", Some("wiki1")).unwrap();
    assert_eq!(lib.id(), &id("lib/2.0"));
    assert_eq!(lib.extension.repository, "mirror");
    assert!(lib.dependency);
    assert!(reopened.get_installed_extension("lib", Some("wiki2")).is_none());
}

#[test]
fn test_namespace_install_shadows_root_install() {
    let fixture = fixture();
    let manager = setup(&fixture);

    manager
        .install(InstallRequest::new().with_extension(id("lib/1.0")))
        .unwrap()
        .join()
        .unwrap();

    let plan = manager
        .plan_install(&InstallRequest::new().with_extension(id("lib/2.0")).with_namespace("wiki"))
        .unwrap();
    assert_eq!(plan.roots().next().unwrap().action, PlanAction::Install);

    manager
        .install(InstallRequest::new().with_extension(id("lib/2.0")).with_namespace("wiki"))
        .unwrap()
        .join()
        .unwrap();

    let local = manager.local_repository();
    let version = |ns: Option<&str>| {
        local
            .get_installed_extension("lib", ns)
            .map(|l| l.id().version().to_string())
    };
    assert_eq!(version(Some("wiki")), Some("2.0".to_string()));
    assert_eq!(version(Some("other")), Some("1.0".to_string()));
    assert_eq!(version(None), Some("1.0".to_string()));

    // Removing the root install leaves the namespace one in place.
    manager
        .uninstall(UninstallRequest::new().with_extension(id("lib/1.0")))
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(version(Some("wiki")), Some("2.0".to_string()));
    assert_eq!(version(Some("other")), None);
}

#[test]
fn test_core_extension_cannot_be_installed() {
    let fixture = fixture();
    let manager = setup(&fixture);

    let errors = manager
        .install(InstallRequest::new().with_extension(id("platform/3.0")))
        .unwrap()
        .join()
        .unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("platform"));
    assert!(manager.installed_extensions(None).is_empty());
}

//! Install and uninstall planning against on-disk repositories.

use extman_core::{
    CancelToken, ExtensionPlan, InstallPlanner, InstallRequest, JobLog, LogLevel, PlanAction,
    PlanApplier, ResolutionError, UninstallPlanner, UninstallRequest,
};
use extman_extension::ExtensionId;
use extman_test_utils::ExtensionFixture;
use extman_version::Version;
use pretty_assertions::assert_eq;

fn id(text: &str) -> ExtensionId {
    ExtensionId::parse(text).unwrap()
}

fn install_request(ids: &[&str], namespace: Option<&str>) -> InstallRequest {
    let mut request = InstallRequest::new();
    for text in ids {
        request = request.with_extension(id(text));
    }
    if let Some(namespace) = namespace {
        request = request.with_namespace(namespace);
    }
    request
}

fn plan_install(
    fixture: &ExtensionFixture,
    ids: &[&str],
    namespace: Option<&str>,
) -> Result<ExtensionPlan, Vec<ResolutionError>> {
    let core = fixture.core();
    let local = fixture.open_local();
    let remote = fixture.remote();
    InstallPlanner::new(&core, &local, remote.as_ref()).plan(
        &install_request(ids, namespace),
        &JobLog::new(),
        &CancelToken::new(),
    )
}

/// Plan and apply an install, panicking on failure.
fn install(fixture: &ExtensionFixture, ids: &[&str], namespace: Option<&str>) {
    let core = fixture.core();
    let local = fixture.open_local();
    let remote = fixture.remote();
    let log = JobLog::new();
    let cancel = CancelToken::new();
    let plan = InstallPlanner::new(&core, &local, remote.as_ref())
        .plan(&install_request(ids, namespace), &log, &cancel)
        .unwrap();
    PlanApplier::new(&local, remote.as_ref())
        .apply(&plan, &log, &cancel)
        .unwrap();
}

fn lib_fixture(lib_versions: &[&str]) -> ExtensionFixture {
    let mut fixture = ExtensionFixture::new();
    for version in lib_versions {
        fixture = fixture.publish("lib", version, &[]);
    }
    fixture
        .publish("e1", "1.0", &[("lib", "[1.0,2.0]")])
        .publish("e2", "1.0", &[("lib", "[1.5,3.0]")])
}

#[test]
fn test_shared_dependency_resolves_inside_both_ranges() {
    let fixture = lib_fixture(&["1.0", "1.8", "2.5"]);
    let plan = plan_install(&fixture, &["e1/1.0", "e2/1.0"], Some("wiki")).unwrap();

    insta::assert_snapshot!(plan.to_string(), @r"
    install e1/1.0 in namespace wiki
      install lib/1.8 [dependency] in namespace wiki
    install e2/1.0 in namespace wiki
      install lib/1.8 [dependency] in namespace wiki
    ");

    let lib = plan
        .actions()
        .into_iter()
        .find(|n| n.extension.id.id() == "lib")
        .unwrap();
    assert_eq!(lib.requirements.len(), 2);
}

#[test]
fn test_planned_dependency_is_replaced_for_every_parent() {
    let fixture = ExtensionFixture::new()
        .publish("lib", "1.0", &[])
        .publish("lib", "1.6", &[])
        .publish("lib", "2.0", &[])
        .publish("e1", "1.0", &[("lib", "[1.0,2.0]")])
        .publish("e3", "1.0", &[("lib", "[1.0,1.8]")]);

    let plan = plan_install(&fixture, &["e1/1.0", "e3/1.0"], None).unwrap();

    insta::assert_snapshot!(plan.to_string(), @r"
    install e1/1.0 in root namespace
      install lib/1.6 [dependency] in root namespace
    install e3/1.0 in root namespace
      install lib/1.6 [dependency] in root namespace
    ");
    let lib = plan
        .actions()
        .into_iter()
        .find(|n| n.extension.id.id() == "lib")
        .unwrap();
    assert_eq!(lib.constraint.as_ref().unwrap().value(), "{[1.0,2.0]},{[1.0,1.8]}");
}

#[test]
fn test_unsatisfiable_dependency_names_id_and_both_constraints() {
    let fixture = lib_fixture(&["1.0", "2.5"]);
    let log = JobLog::new();
    let core = fixture.core();
    let local = fixture.open_local();
    let remote = fixture.remote();

    let errors = InstallPlanner::new(&core, &local, remote.as_ref())
        .plan(
            &install_request(&["e1/1.0", "e2/1.0"], Some("wiki")),
            &log,
            &CancelToken::new(),
        )
        .unwrap_err();

    assert_eq!(errors.len(), 1);
    let message = errors[0].to_string();
    assert!(matches!(errors[0], ResolutionError::Unsatisfiable { .. }));
    assert_eq!(errors[0].extension_id(), Some("lib"));
    assert!(message.contains("[1.0,2.0]"), "{message}");
    assert!(message.contains("[1.5,3.0]"), "{message}");
    assert_eq!(log.logs_from(LogLevel::Error).len(), 1);
}

#[test]
fn test_disjoint_constraints_fail_to_merge() {
    let fixture = lib_fixture(&["1.0", "3.5"]).publish("e4", "1.0", &[("lib", "[3.0,4.0]")]);

    let errors = plan_install(&fixture, &["e1/1.0", "e4/1.0"], None).unwrap_err();

    match &errors[..] {
        [ResolutionError::IncompatibleConstraints { id, requirements, .. }] => {
            assert_eq!(id, "lib");
            let requesters: Vec<String> = requirements.iter().map(|r| r.requester.to_string()).collect();
            assert_eq!(requesters, vec!["e1/1.0", "e4/1.0"]);
        }
        other => panic!("unexpected errors: {other:?}"),
    }
}

#[test]
fn test_reselection_honors_every_earlier_requester() {
    let fixture = ExtensionFixture::new()
        .publish("lib", "1.0", &[])
        .publish("lib", "2.0", &[])
        .publish("lib", "2.7", &[])
        .publish("lib", "3.0", &[])
        .publish("e1", "1.0", &[("lib", "[1.0,3.0]")])
        .publish("e2", "1.0", &[("lib", "[2.5,3.0]")])
        .publish("e3", "1.0", &[("lib", "[1.0,2.0]")]);

    let errors = plan_install(&fixture, &["e1/1.0", "e2/1.0", "e3/1.0"], None).unwrap_err();

    match &errors[..] {
        [err @ ResolutionError::IncompatibleConstraints { id, requirements, .. }] => {
            assert_eq!(id, "lib");
            let requested: Vec<String> = requirements.iter().map(|r| r.to_string()).collect();
            assert_eq!(
                requested,
                vec![
                    "e1/1.0 requires [1.0,3.0]",
                    "e2/1.0 requires [2.5,3.0]",
                    "e3/1.0 requires [1.0,2.0]",
                ]
            );
            let message = err.to_string();
            assert!(message.contains("[2.5,3.0]"), "{message}");
        }
        other => panic!("unexpected errors: {other:?}"),
    }
}

#[test]
fn test_compatible_requester_narrows_planned_constraint() {
    let fixture = ExtensionFixture::new()
        .publish("lib", "1.0", &[])
        .publish("lib", "2.7", &[])
        .publish("lib", "3.0", &[])
        .publish("e1", "1.0", &[("lib", "[1.0,3.0]")])
        .publish("e2", "1.0", &[("lib", "[2.5,3.0]")])
        .publish("e3", "1.0", &[("lib", "[1.0,2.8]")]);

    let plan = plan_install(&fixture, &["e1/1.0", "e2/1.0", "e3/1.0"], None).unwrap();

    let lib = plan
        .actions()
        .into_iter()
        .find(|n| n.extension.id.id() == "lib")
        .unwrap();
    assert_eq!(lib.extension.id, id("lib/2.7"));
    assert_eq!(lib.requirements.len(), 3);
    for requirement in &lib.requirements {
        assert!(requirement.constraint.contains_version(lib.extension.id.version()));
    }
}

#[test]
fn test_sibling_branches_keep_planning_after_an_error() {
    let fixture = lib_fixture(&["1.8"])
        .publish("broken", "1.0", &[("missing", "[1.0,)")])
        .publish("other", "1.0", &[("absent", "2.0")]);

    let errors = plan_install(&fixture, &["broken/1.0", "e1/1.0", "other/1.0", "nope/1.0"], None).unwrap_err();

    let ids: Vec<&str> = errors.iter().filter_map(|e| e.extension_id()).collect();
    assert_eq!(ids, vec!["missing", "absent", "nope"]);
}

#[test]
fn test_root_request_checks() {
    let fixture = lib_fixture(&["1.0", "1.8"]).with_core("platform", "3.0");
    install(&fixture, &["lib/1.8"], Some("wiki"));

    let errors = plan_install(&fixture, &["platform/3.0", "lib/1.8", "lib/1.0"], Some("wiki")).unwrap_err();
    assert!(matches!(errors[0], ResolutionError::AlreadyCore { .. }));
    assert!(matches!(errors[1], ResolutionError::AlreadyInstalled { .. }));
    assert!(matches!(errors[2], ResolutionError::NewerVersionInstalled { .. }));

    // Other namespaces are unaffected.
    assert!(plan_install(&fixture, &["lib/1.0"], Some("other")).is_ok());
}

#[test]
fn test_compatible_core_and_installed_dependencies_are_kept() {
    let fixture = ExtensionFixture::new()
        .with_core("platform", "3.0")
        .publish("lib", "1.0", &[])
        .publish("app", "1.0", &[("platform", "[2.0,)"), ("lib", "1.0")]);
    install(&fixture, &["lib/1.0"], None);

    let plan = plan_install(&fixture, &["app/1.0"], Some("wiki")).unwrap();

    insta::assert_snapshot!(plan.to_string(), @r"
    install app/1.0 in namespace wiki
      keep platform/3.0 [dependency] in root namespace
      keep lib/1.0 [dependency] in namespace wiki
    ");
}

#[test]
fn test_incompatible_core_extension() {
    let fixture = ExtensionFixture::new()
        .with_core("platform", "3.0")
        .publish("app", "1.0", &[("platform", "[4.0,)")]);

    let errors = plan_install(&fixture, &["app/1.0"], None).unwrap_err();
    match &errors[..] {
        [ResolutionError::IncompatibleCoreExtension { id, version, .. }] => {
            assert_eq!(id, "platform");
            assert_eq!(version, &Version::new("3.0"));
        }
        other => panic!("unexpected errors: {other:?}"),
    }
}

#[test]
fn test_installed_dependency_is_upgraded_when_dependents_allow() {
    let fixture = ExtensionFixture::new()
        .publish("lib", "1.0", &[])
        .publish("e1", "1.0", &[("lib", "[1.0,)")])
        .publish("e5", "1.0", &[("lib", "[1.2,)")]);
    install(&fixture, &["e1/1.0"], Some("wiki"));
    let fixture = fixture.publish("lib", "1.5", &[]);

    let plan = plan_install(&fixture, &["e5/1.0"], Some("wiki")).unwrap();
    insta::assert_snapshot!(plan.to_string(), @r"
    install e5/1.0 in namespace wiki
      upgrade lib/1.5 (from 1.0) [dependency] in namespace wiki
    ");

    install(&fixture, &["e5/1.0"], Some("wiki"));
    let local = fixture.open_local();
    let lib = local.get_installed_extension("lib", Some("wiki")).unwrap();
    assert_eq!(lib.id(), &id("lib/1.5"));
    assert!(lib.dependency);
    assert!(local.get_installed_extension("e1", Some("wiki")).is_some());
}

#[test]
fn test_upgrade_blocked_by_installed_dependent() {
    let fixture = ExtensionFixture::new()
        .publish("lib", "1.0", &[])
        .publish("lib", "1.5", &[])
        .publish("pinned", "1.0", &[("lib", "[1.0]")]);
    install(&fixture, &["pinned/1.0"], None);

    let errors = plan_install(&fixture, &["lib/1.5"], None).unwrap_err();
    match &errors[..] {
        [ResolutionError::IncompatibleWithInstalled { installed, dependent, .. }] => {
            assert_eq!(installed, &id("lib/1.0"));
            assert_eq!(dependent, &id("pinned/1.0"));
        }
        other => panic!("unexpected errors: {other:?}"),
    }
}

#[test]
fn test_exclusions_prune_the_subtree() {
    let fixture = ExtensionFixture::new()
        .publish("lib", "1.0", &[])
        .publish("app", "1.0", &[("lib", "[1.0,)")])
        .publish_extension(
            extman_extension::Extension::new(id("bundle/1.0")).with_dependency(
                extman_extension::ExtensionDependency::parse("app", "[1.0,)").with_exclusion("lib"),
            ),
        );

    let plan = plan_install(&fixture, &["bundle/1.0"], None).unwrap();
    let ids: Vec<String> = plan.actions().iter().map(|n| n.extension.id.to_string()).collect();
    assert_eq!(ids, vec!["app/1.0", "bundle/1.0"]);
}

#[test]
fn test_cancelled_planning_reports_cancellation() {
    let fixture = lib_fixture(&["1.8"]);
    let core = fixture.core();
    let local = fixture.open_local();
    let remote = fixture.remote();
    let cancel = CancelToken::new();
    cancel.cancel();

    let errors = InstallPlanner::new(&core, &local, remote.as_ref())
        .plan(&install_request(&["e1/1.0"], None), &JobLog::new(), &cancel)
        .unwrap_err();
    assert_eq!(errors, vec![ResolutionError::Cancelled]);
}

#[test]
fn test_failed_apply_rolls_back_earlier_steps() {
    let fixture = ExtensionFixture::new()
        .publish("lib", "1.0", &[])
        .publish_extension(extman_extension::Extension::new(id("bad/1.0")).with_checksum("sha256:00"))
        .publish("app", "1.0", &[("lib", "[1.0,)"), ("bad", "1.0")]);
    let core = fixture.core();
    let local = fixture.open_local();
    let remote = fixture.remote();
    let log = JobLog::new();
    let cancel = CancelToken::new();

    let plan = InstallPlanner::new(&core, &local, remote.as_ref())
        .plan(&install_request(&["app/1.0"], Some("wiki")), &log, &cancel)
        .unwrap();
    let err = PlanApplier::new(&local, remote.as_ref())
        .apply(&plan, &log, &cancel)
        .unwrap_err();

    assert!(matches!(err, extman_core::JobError::Apply { ref id, .. } if *id == self::id("bad/1.0")));
    assert!(local.installed_extensions(Some("wiki")).is_empty());
    assert!(!log.logs_from(LogLevel::Warn).is_empty());
    assert!(fixture.open_local().installed_extensions(Some("wiki")).is_empty());
}

#[test]
fn test_rollback_restores_dependency_flag() {
    let fixture = ExtensionFixture::new()
        .publish("lib", "1.0", &[])
        .publish("e1", "1.0", &[("lib", "[1.0,)")])
        .publish_extension(extman_extension::Extension::new(id("bad/1.0")).with_checksum("sha256:00"))
        .publish("app", "1.0", &[("bad", "1.0")]);
    install(&fixture, &["e1/1.0"], Some("wiki"));

    let core = fixture.core();
    let local = fixture.open_local();
    let remote = fixture.remote();
    let log = JobLog::new();
    let cancel = CancelToken::new();
    assert!(local.get_local_extension(&id("lib/1.0")).unwrap().dependency);

    let plan = InstallPlanner::new(&core, &local, remote.as_ref())
        .plan(&install_request(&["lib/1.0", "app/1.0"], Some("wiki")), &log, &cancel)
        .unwrap();
    PlanApplier::new(&local, remote.as_ref())
        .apply(&plan, &log, &cancel)
        .unwrap_err();

    let lib = local.get_local_extension(&id("lib/1.0")).unwrap();
    assert!(lib.dependency);
    assert!(lib.is_installed_exactly(Some("wiki")));
    assert!(fixture.open_local().get_local_extension(&id("lib/1.0")).unwrap().dependency);
}

#[test]
fn test_uninstall_takes_dependents_along() {
    let fixture = ExtensionFixture::new()
        .publish("lib", "1.0", &[])
        .publish("e1", "1.0", &[("lib", "[1.0,)")]);
    install(&fixture, &["lib/1.0"], None);
    install(&fixture, &["e1/1.0"], Some("wiki"));

    let core = fixture.core();
    let local = fixture.open_local();
    let remote = fixture.remote();
    let log = JobLog::new();
    let cancel = CancelToken::new();
    let planner = UninstallPlanner::new(&core, &local);
    let plan = planner
        .plan(&UninstallRequest::new().with_extension(id("lib/1.0")), &log, &cancel)
        .unwrap();

    insta::assert_snapshot!(plan.to_string(), @r"
    uninstall lib/1.0 in root namespace
      uninstall e1/1.0 in namespace wiki
    ");
    assert!(plan.actions().iter().all(|n| n.action == PlanAction::Uninstall));

    PlanApplier::new(&local, remote.as_ref())
        .apply(&plan, &log, &cancel)
        .unwrap();
    assert!(local.installed_extensions(Some("wiki")).is_empty());
    assert_eq!(local.local_extensions().len(), 2);
}

#[test]
fn test_uninstall_errors() {
    let fixture = ExtensionFixture::new()
        .with_core("platform", "3.0")
        .publish("lib", "1.0", &[]);
    install(&fixture, &["lib/1.0"], None);
    let core = fixture.core();
    let local = fixture.open_local();

    let request = UninstallRequest::new()
        .with_extension(id("platform/3.0"))
        .with_extension(id("lib/1.0"))
        .with_namespace("wiki");
    let errors = UninstallPlanner::new(&core, &local)
        .plan(&request, &JobLog::new(), &CancelToken::new())
        .unwrap_err();

    assert!(matches!(errors[0], ResolutionError::CannotUninstallCore { .. }));
    // A root install is not removable from a single namespace.
    assert!(matches!(errors[1], ResolutionError::NotInstalled { .. }));
}

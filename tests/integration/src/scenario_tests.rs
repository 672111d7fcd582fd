//! Shared-dependency and same-namespace concurrency scenarios.

use chrono::{DateTime, Utc};
use extman_core::{
    Error, ExecutorError, ExtensionManager, InstallRequest, Job, JobError, JobState, LogLevel,
    ResolutionError,
};
use extman_extension::{ConfigLoader, ConflictPolicy, ExtensionId};
use extman_test_utils::ExtensionFixture;
use extman_version::{Version, VersionConstraint};
use pretty_assertions::assert_eq;

fn id(text: &str) -> ExtensionId {
    ExtensionId::parse(text).unwrap()
}

fn manager(fixture: &ExtensionFixture) -> ExtensionManager {
    let config = ConfigLoader::new()
        .load(Some(&fixture.write_config()))
        .unwrap();
    ExtensionManager::from_config(&config).unwrap()
}

fn fixture(lib_versions: &[&str]) -> ExtensionFixture {
    let mut fixture = ExtensionFixture::new();
    for version in lib_versions {
        fixture = fixture.publish("lib", version, &[]);
    }
    fixture
        .publish("e1", "1.0", &[("lib", "[1.0,2.0]")])
        .publish("e2", "1.0", &[("lib", "[1.5,3.0]")])
}

fn request(ids: &[&str], namespace: &str) -> InstallRequest {
    ids.iter()
        .fold(InstallRequest::new(), |r, text| r.with_extension(id(text)))
        .with_namespace(namespace)
}

#[test]
fn test_shared_dependency_lands_in_both_ranges() {
    for order in [["e1/1.0", "e2/1.0"], ["e2/1.0", "e1/1.0"]] {
        let fixture = fixture(&["1.0", "1.6", "1.9", "2.5"]);
        let manager = manager(&fixture);

        let job = manager.install(request(&order, "wiki")).unwrap();
        assert!(job.join().is_ok(), "{:?}", job.log().entries());

        let lib = manager
            .local_repository()
            .get_installed_extension("lib", Some("wiki"))
            .unwrap();
        assert_eq!(lib.id().version(), &Version::new("1.9"), "order {order:?}");
        assert!(VersionConstraint::parse("[1.5,2.0]").contains_version(lib.id().version()));
        for e in order {
            assert!(
                manager
                    .local_repository()
                    .get_local_extension(&id(e))
                    .unwrap()
                    .is_installed_exactly(Some("wiki"))
            );
        }
    }
}

#[test]
fn test_unsatisfiable_shared_dependency_fails_the_job() {
    let fixture = fixture(&["1.0", "1.2", "2.5", "3.0"]);
    let manager = manager(&fixture);

    let job = manager.install(request(&["e1/1.0", "e2/1.0"], "wiki")).unwrap();
    let errors = job.join().unwrap_err();
    assert_eq!(job.state(), JobState::Finished);

    match &errors[..] {
        [JobError::Resolution(err @ ResolutionError::Unsatisfiable { requirements, .. })] => {
            assert_eq!(err.extension_id(), Some("lib"));
            assert_eq!(requirements.len(), 2);
        }
        other => panic!("unexpected errors: {other:?}"),
    }

    let logged: Vec<String> = job
        .log()
        .logs_from(LogLevel::Warn)
        .into_iter()
        .map(|entry| entry.message)
        .collect();
    assert!(
        logged.iter().any(|m| m.contains("lib")
            && m.contains("[1.0,2.0]")
            && m.contains("[1.5,3.0]")),
        "{logged:#?}"
    );

    for e in ["e1/1.0", "e2/1.0"] {
        assert!(manager.local_repository().get_local_extension(&id(e)).is_none());
    }
    assert!(manager.installed_extensions(Some("wiki")).is_empty());
}

/// Latest log timestamp of `job` before it reported finishing.
fn work_ended(job: &Job) -> Option<DateTime<Utc>> {
    job.log()
        .entries()
        .into_iter()
        .filter(|e| !e.message.starts_with("finished"))
        .map(|e| e.timestamp)
        .max()
}

#[test]
fn test_same_namespace_jobs_run_one_at_a_time() {
    let fixture = fixture(&["1.0", "1.8", "2.5"]);
    let manager = manager(&fixture);

    let jobs: Vec<Job> = ["e1/1.0", "e2/1.0"]
        .iter()
        .map(|e| manager.install(request(&[*e], "wiki")).unwrap())
        .collect();
    for job in &jobs {
        assert!(job.join().is_ok());
    }

    let mut statuses: Vec<_> = jobs.iter().map(|j| (j.status(), j)).collect();
    statuses.sort_by_key(|(status, _)| status.started_at);
    let (_, earlier) = &statuses[0];
    let (later, _) = &statuses[1];
    assert!(work_ended(earlier).unwrap() <= later.started_at.unwrap());
}

#[test]
fn test_reject_policy_refuses_or_runs_after() {
    let fixture = fixture(&["1.8"]);
    let manager = manager(&fixture).with_conflict_policy(ConflictPolicy::Reject);

    let first = manager.install(request(&["e1/1.0"], "wiki")).unwrap();
    match manager.install(request(&["e2/1.0"], "wiki")) {
        Err(Error::Executor(ExecutorError::GroupBusy { group })) => {
            assert_eq!(&group, first.group());
            assert!(first.join().is_ok());
        }
        Ok(second) => {
            // The first job had already released the namespace.
            assert!(second.join().is_ok());
            assert!(first.join().is_ok());
        }
        Err(other) => panic!("unexpected error: {other}"),
    }

    // Other namespaces are never blocked.
    let other = manager.install(request(&["e2/1.0"], "elsewhere"));
    match other {
        Ok(job) => assert!(job.join().is_ok()),
        Err(e) => panic!("unexpected error: {e}"),
    }
}

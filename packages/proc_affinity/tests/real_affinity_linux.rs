//! Affinity control of a real child process on the real operating system.
//!
//! The child inherits the affinity of the test process, which may already be restricted (e.g.
//! in a container), so masks are always chosen from the cores the child starts out with.

#![cfg(target_os = "linux")]

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::MetadataExt;

use proc_affinity::{
    AffinityAccessor, AffinityMask, Assignments, Error, ErrorKind, ProcessId, ProfileStore,
    RawId, Session,
};
use tempfile::TempDir;
use testing::{ChildProcess, with_watchdog};

fn raw(cores: &[u32]) -> Vec<RawId> {
    cores.iter().map(|core| RawId::from(*core)).collect()
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot call platform APIs.
fn set_then_get_returns_same_cores() {
    with_watchdog(|| {
        let child = ChildProcess::start_idle();
        let pid = RawId::from(child.pid());
        let accessor = AffinityAccessor::new();

        let allowed = accessor.get_affinity(pid).unwrap().to_vec();

        let every_other = allowed.iter().copied().step_by(2).collect::<Vec<_>>();
        let last_first = allowed.iter().rev().copied().collect::<Vec<_>>();

        for cores in [vec![allowed[0]], every_other, last_first, allowed.clone()] {
            let mask = accessor.set_affinity(pid, &raw(&cores)).unwrap();
            let actual = accessor.get_affinity(pid).unwrap();

            assert!(
                actual.same_cores_as(&mask),
                "set {mask}, but the process reports {actual}"
            );
        }
    });
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot call platform APIs.
fn repeated_set_is_idempotent() {
    with_watchdog(|| {
        let child = ChildProcess::start_idle();
        let pid = RawId::from(child.pid());
        let accessor = AffinityAccessor::new();

        let first_core = accessor.get_affinity(pid).unwrap().to_vec()[0];

        accessor.set_affinity(pid, &raw(&[first_core])).unwrap();
        accessor.set_affinity(pid, &raw(&[first_core])).unwrap();

        assert_eq!(
            accessor.get_affinity(pid).unwrap(),
            AffinityMask::single(first_core)
        );
    });
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot call platform APIs.
fn exited_process_is_not_found() {
    with_watchdog(|| {
        let pid = RawId::from(ChildProcess::start_idle().kill());
        let accessor = AffinityAccessor::new();

        let error = accessor.get_affinity(pid).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ProcessNotFound);

        let error = accessor.set_affinity(pid, &[0]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ProcessNotFound);
        assert!(error.remediation().is_some());
    });
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot call platform APIs.
fn foreign_process_is_access_denied_without_privileges() {
    let accessor = AffinityAccessor::new();

    let owner_of = |pid: &str| fs::metadata(format!("/proc/{pid}")).unwrap().uid();

    if accessor.is_elevated() || owner_of("1") == owner_of("self") {
        // Nothing would be denied, e.g. in a container where the tests run as pid 1.
        return;
    }

    let current = accessor.get_affinity(1).unwrap();

    let error = accessor
        .set_affinity(1, &raw(&current.to_vec()))
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::AccessDenied);
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot call platform APIs.
fn profile_survives_restart_and_reapplies() {
    with_watchdog(|| {
        let dir = TempDir::new().unwrap();
        let child = ChildProcess::start_idle();
        let pid = child.pid();
        let exited = ChildProcess::start_idle().kill();

        let first_core = AffinityAccessor::new()
            .get_affinity(RawId::from(pid))
            .unwrap()
            .to_vec()[0];

        {
            let session = Session::new(ProfileStore::new(dir.path()));
            session
                .set_affinity(RawId::from(pid), &raw(&[first_core]))
                .unwrap();
            session.save_profile("pinned").unwrap();
        }

        // A new session has an empty registry, as after a restart of the tool.
        let session = Session::new(ProfileStore::new(dir.path()));
        assert!(session.registry().is_empty());

        let mut profile = session.load_profile("pinned").unwrap();
        assert_eq!(profile.len(), 1);
        profile.insert(exited, AffinityMask::single(first_core));

        let report = session.apply_profile(&profile);

        let results = report
            .outcomes()
            .iter()
            .map(|outcome| (outcome.pid(), outcome.error().map(Error::kind)))
            .collect::<BTreeMap<ProcessId, Option<ErrorKind>>>();

        assert_eq!(results.get(&pid), Some(&None));
        assert_eq!(results.get(&exited), Some(&Some(ErrorKind::ProcessNotFound)));

        assert_eq!(
            session.registry().snapshot(),
            Assignments::from([(pid, AffinityMask::single(first_core))])
        );
    });
}

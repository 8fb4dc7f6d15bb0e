use std::fmt::{self, Display};

use tracing::{info, warn};

use crate::{AffinityAccessor, AffinityMask, AssignmentRegistry, Assignments, Error, ProcessId};

/// The result of applying one assignment of a profile.
#[derive(Debug)]
pub struct ApplyOutcome {
    pid: ProcessId,
    mask: AffinityMask,
    error: Option<Error>,
}

impl ApplyOutcome {
    /// The process the assignment was for.
    #[must_use]
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// The mask that was (or was supposed to be) applied.
    #[must_use]
    pub fn mask(&self) -> &AffinityMask {
        &self.mask
    }

    /// Whether the operating system accepted the mask.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Why the mask was not applied, if it was not.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }
}

impl Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            None => write!(f, "process {}: applied cores {}", self.pid, self.mask),
            Some(error) => write!(
                f,
                "process {}: failed to apply cores {} ({}): {error}",
                self.pid,
                self.mask,
                error.kind()
            ),
        }
    }
}

/// Per-process results of applying a set of assignments, in ascending process ID order.
///
/// A partially applied profile is a normal outcome, not an error.
#[derive(Debug, Default)]
pub struct ApplyReport {
    outcomes: Vec<ApplyOutcome>,
}

impl ApplyReport {
    /// One outcome per assignment.
    #[must_use]
    pub fn outcomes(&self) -> &[ApplyOutcome] {
        &self.outcomes
    }

    /// The outcomes of the assignments that were applied.
    pub fn succeeded(&self) -> impl Iterator<Item = &ApplyOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_success())
    }

    /// The outcomes of the assignments that were not applied.
    pub fn failed(&self) -> impl Iterator<Item = &ApplyOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }

    /// Whether every assignment was applied. True for an empty report.
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.failed().next().is_none()
    }

    /// Number of assignments in the report.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether there were no assignments to apply.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Applies every assignment independently and records each success in the registry.
///
/// A failure for one process does not prevent the remaining assignments from being applied,
/// and nothing is rolled back. The registry is locked for the whole operation so that
/// concurrent writers cannot interleave with it.
pub fn apply_profile(
    accessor: &AffinityAccessor,
    registry: &AssignmentRegistry,
    assignments: &Assignments,
) -> ApplyReport {
    registry.with_entries(|entries| apply_into(accessor, entries, assignments))
}

/// Applies the assignments, inserting each success into `entries`.
pub(crate) fn apply_into(
    accessor: &AffinityAccessor,
    entries: &mut Assignments,
    assignments: &Assignments,
) -> ApplyReport {
    let outcomes = assignments
        .iter()
        .map(|(&pid, mask)| {
            let error = accessor.set_mask(pid, mask).err();

            match &error {
                None => {
                    entries.insert(pid, mask.clone());
                }
                Some(error) => {
                    warn!(pid, cores = %mask, kind = %error.kind(), %error, "assignment not applied");
                }
            }

            ApplyOutcome {
                pid,
                mask: mask.clone(),
                error,
            }
        })
        .collect::<Vec<_>>();

    let report = ApplyReport { outcomes };

    info!(
        applied = report.succeeded().count(),
        failed = report.failed().count(),
        "assignments applied"
    );

    report
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::pal::{MockPlatform, PlatformFacade};

    fn accessor_with_live_pids(live: &'static [ProcessId]) -> AffinityAccessor {
        let mut platform = MockPlatform::new();
        platform
            .expect_set_process_affinity()
            .returning(move |pid, _| {
                if live.contains(&pid) {
                    Ok(())
                } else {
                    Err(Error::ProcessNotFound { pid })
                }
            });

        AffinityAccessor::with_platform(PlatformFacade::from_mock(platform))
    }

    #[test]
    fn partial_failure_continues() {
        let accessor = accessor_with_live_pids(&[100]);
        let registry = AssignmentRegistry::new();

        let assignments = Assignments::from([
            (100, AffinityMask::single(0)),
            (999_999, AffinityMask::single(0)),
        ]);

        let report = apply_profile(&accessor, &registry, &assignments);

        assert_eq!(report.len(), 2);
        assert!(!report.is_complete_success());

        let outcomes = report.outcomes();
        assert_eq!(outcomes[0].pid(), 100);
        assert!(outcomes[0].is_success());
        assert_eq!(outcomes[1].pid(), 999_999);
        assert_eq!(
            outcomes[1].error().map(Error::kind),
            Some(ErrorKind::ProcessNotFound)
        );

        assert_eq!(registry.snapshot(), Assignments::from([(100, AffinityMask::single(0))]));
    }

    #[test]
    fn existing_entries_are_kept() {
        let accessor = accessor_with_live_pids(&[1, 2]);
        let registry = AssignmentRegistry::new();
        registry.record(3, AffinityMask::single(7));

        let report = apply_profile(
            &accessor,
            &registry,
            &Assignments::from([(1, AffinityMask::single(0)), (2, AffinityMask::single(1))]),
        );

        assert!(report.is_complete_success());
        assert_eq!(report.succeeded().count(), 2);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn empty_assignments() {
        // No expectations: there is nothing to apply.
        let accessor =
            AffinityAccessor::with_platform(PlatformFacade::from_mock(MockPlatform::new()));
        let registry = AssignmentRegistry::new();

        let report = apply_profile(&accessor, &registry, &Assignments::new());

        assert!(report.is_empty());
        assert!(report.is_complete_success());
        assert!(registry.is_empty());
    }

    #[test]
    fn outcome_display_names_kind() {
        let accessor = accessor_with_live_pids(&[5]);
        let registry = AssignmentRegistry::new();

        let report = apply_profile(
            &accessor,
            &registry,
            &Assignments::from([
                (5, AffinityMask::new([0, 1, 2]).unwrap()),
                (6, AffinityMask::single(3)),
            ]),
        );

        let lines = report
            .outcomes()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        assert_eq!(lines[0], "process 5: applied cores 0-2");
        assert!(lines[1].starts_with("process 6: failed to apply cores 3 (process not found)"));
    }
}

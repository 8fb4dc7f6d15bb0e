use tracing::warn;

use crate::apply::apply_into;
use crate::primitive_types::validate_process_id;
use crate::{
    AffinityAccessor, AffinityMask, ApplyReport, AssignmentRegistry, Assignments, ProcessId,
    ProfileStore, RawId, Result, Topology, apply_profile,
};

/// One run of the tool: affinity control with bookkeeping of what was applied.
///
/// A session owns the [`AssignmentRegistry`] for its lifetime and routes every affinity write
/// through it, so that the registry always holds the masks the operating system accepted. Saving
/// a profile stores a snapshot of the registry; loading a profile only reads it, and applying
/// it records every assignment that took effect.
///
/// If a [`Topology`] is attached, masks with cores outside of it are still passed to the
/// operating system (which has the final word) but are logged as warnings.
///
/// # Example
///
/// ```no_run
/// use proc_affinity::{ProfileStore, Session};
///
/// let session = Session::new(ProfileStore::new("profiles"));
///
/// session.set_affinity(1234, &[0, 1])?;
/// session.save_profile("work")?;
///
/// let report = session.load_and_apply_profile("work")?;
/// for outcome in report.failed() {
///     println!("{outcome}");
/// }
/// # Ok::<(), proc_affinity::Error>(())
/// ```
#[derive(Debug)]
pub struct Session {
    accessor: AffinityAccessor,
    registry: AssignmentRegistry,
    store: ProfileStore,
    topology: Option<Topology>,
}

impl Session {
    /// Creates a session that operates on the real operating system and keeps its profiles in
    /// the given store. The registry starts out empty.
    #[must_use]
    pub fn new(store: ProfileStore) -> Self {
        Self::with_accessor(AffinityAccessor::new(), store)
    }

    pub(crate) fn with_accessor(accessor: AffinityAccessor, store: ProfileStore) -> Self {
        Self {
            accessor,
            registry: AssignmentRegistry::new(),
            store,
            topology: None,
        }
    }

    /// Attaches the processor topology, used to warn about masks with unknown cores.
    #[must_use]
    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = Some(topology);
        self
    }

    /// The attached processor topology, if any.
    #[must_use]
    pub fn topology(&self) -> Option<&Topology> {
        self.topology.as_ref()
    }

    /// The accessor used for affinity reads and writes.
    #[must_use]
    pub fn accessor(&self) -> &AffinityAccessor {
        &self.accessor
    }

    /// The masks applied during this session.
    #[must_use]
    pub fn registry(&self) -> &AssignmentRegistry {
        &self.registry
    }

    /// The store that profiles are saved to and loaded from.
    #[must_use]
    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    /// Reads the affinity of a process. See [`AffinityAccessor::get_affinity()`].
    ///
    /// # Errors
    ///
    /// As for [`AffinityAccessor::get_affinity()`].
    pub fn get_affinity(&self, pid: RawId) -> Result<AffinityMask> {
        self.accessor.get_affinity(pid)
    }

    /// Sets the affinity of a process and records the mask in the registry if the operating
    /// system accepted it. Returns the applied mask.
    ///
    /// # Errors
    ///
    /// As for [`AffinityAccessor::set_affinity()`]. Nothing is recorded on failure.
    pub fn set_affinity(&self, pid: RawId, cores: &[RawId]) -> Result<AffinityMask> {
        let pid = validate_process_id(pid)?;
        let mask = AffinityMask::from_raw(cores)?;

        self.set_mask(pid, mask)
    }

    /// Sets the affinity of a process to an already validated mask, recording it on success.
    ///
    /// # Errors
    ///
    /// As for [`AffinityAccessor::set_mask()`].
    pub fn set_mask(&self, pid: ProcessId, mask: AffinityMask) -> Result<AffinityMask> {
        self.warn_about_unknown_cores(pid, &mask);

        self.registry.update_with(pid, mask, |pid, mask| {
            self.accessor.set_mask(pid, mask)?;
            Ok(mask.clone())
        })
    }

    /// Saves the current registry contents as a named profile.
    ///
    /// # Errors
    ///
    /// As for [`ProfileStore::save()`].
    pub fn save_profile(&self, name: &str) -> Result<()> {
        self.store.save(name, &self.registry.snapshot())
    }

    /// Reads a named profile without applying it or touching the registry.
    ///
    /// # Errors
    ///
    /// As for [`ProfileStore::load()`].
    pub fn load_profile(&self, name: &str) -> Result<Assignments> {
        self.store.load(name)
    }

    /// Applies assignments on top of the current registry, recording each one that takes
    /// effect.
    pub fn apply_profile(&self, assignments: &Assignments) -> ApplyReport {
        for (&pid, mask) in assignments {
            self.warn_about_unknown_cores(pid, mask);
        }

        apply_profile(&self.accessor, &self.registry, assignments)
    }

    /// Loads a named profile and applies it, replacing the registry contents.
    ///
    /// After this, the registry holds exactly the assignments of the profile that took effect.
    ///
    /// # Errors
    ///
    /// As for [`ProfileStore::load()`]. If the profile cannot be loaded, nothing is applied and
    /// the registry is unchanged. Failures to apply individual assignments are not errors;
    /// they are listed in the returned report.
    pub fn load_and_apply_profile(&self, name: &str) -> Result<ApplyReport> {
        let assignments = self.store.load(name)?;

        for (&pid, mask) in &assignments {
            self.warn_about_unknown_cores(pid, mask);
        }

        Ok(self.registry.with_entries(|entries| {
            entries.clear();
            apply_into(&self.accessor, entries, &assignments)
        }))
    }

    fn warn_about_unknown_cores(&self, pid: ProcessId, mask: &AffinityMask) {
        let Some(topology) = &self.topology else {
            return;
        };

        let unknown = topology.unknown_cores(mask);

        if !unknown.is_empty() {
            warn!(
                pid,
                cores = %mask,
                unknown = ?unknown,
                logical_count = topology.logical_count(),
                "mask contains cores that are not in the processor topology"
            );
        }
    }
}

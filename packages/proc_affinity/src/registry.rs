use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{AffinityMask, ProcessId, Result};

/// A mapping of processes to the affinity masks assigned to them, ordered by process ID.
///
/// This is the content of a stored profile as well as a snapshot of an
/// [`AssignmentRegistry`].
pub type Assignments = BTreeMap<ProcessId, AffinityMask>;

/// The affinity masks this tool has successfully applied to processes during its lifetime.
///
/// Entries are created or overwritten only after the operating system accepted a mask; reading
/// the affinity of a process never creates an entry. There is no way to remove a single entry:
/// stale entries disappear only when the whole registry is replaced, e.g. by reloading a
/// profile.
///
/// The registry is safe to share between threads. All mutation goes through one lock, so
/// concurrent writers are serialized and the registry reflects the last mask the operating
/// system accepted for each process.
#[derive(Debug, Default)]
pub struct AssignmentRegistry {
    entries: Mutex<Assignments>,
}

impl AssignmentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `mask` was successfully applied to `pid`, replacing any previous entry.
    pub fn record(&self, pid: ProcessId, mask: AffinityMask) {
        self.lock().insert(pid, mask);
    }

    /// The mask last applied to the process, if any.
    #[must_use]
    pub fn get(&self, pid: ProcessId) -> Option<AffinityMask> {
        self.lock().get(&pid).cloned()
    }

    /// A point-in-time copy of all entries.
    #[must_use]
    pub fn snapshot(&self) -> Assignments {
        self.lock().clone()
    }

    /// Replaces all entries at once.
    pub fn replace_all(&self, assignments: Assignments) {
        *self.lock() = assignments;
    }

    /// Number of processes with a recorded mask.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no mask has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Performs a write of `mask` to `pid` and records the mask if the write succeeds.
    ///
    /// The registry stays locked for the duration of the write, so that two concurrent writes
    /// to the same process are recorded in the same order in which they were performed.
    ///
    /// # Errors
    ///
    /// Returns the error of `write`, in which case nothing is recorded.
    pub fn update_with<R>(
        &self,
        pid: ProcessId,
        mask: AffinityMask,
        write: impl FnOnce(ProcessId, &AffinityMask) -> Result<R>,
    ) -> Result<R> {
        let mut entries = self.lock();

        let result = write(pid, &mask)?;
        entries.insert(pid, mask);

        Ok(result)
    }

    /// Runs `f` with exclusive access to the entries.
    pub(crate) fn with_entries<R>(&self, f: impl FnOnce(&mut Assignments) -> R) -> R {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Assignments> {
        // A panic while holding the lock cannot leave the map half-updated; every mutation
        // is a single insert or assignment.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use static_assertions::assert_impl_all;

    use super::*;
    use crate::{Error, ErrorKind};

    assert_impl_all!(AssignmentRegistry: Send, Sync);

    #[test]
    fn record_overwrites() {
        let registry = AssignmentRegistry::new();
        assert!(registry.is_empty());

        registry.record(10, AffinityMask::single(0));
        registry.record(10, AffinityMask::new([1, 2]).unwrap());
        registry.record(20, AffinityMask::single(3));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(10).unwrap().to_vec(), vec![1, 2]);
        assert_eq!(registry.get(30), None);
    }

    #[test]
    fn snapshot_is_detached() {
        let registry = AssignmentRegistry::new();
        registry.record(1, AffinityMask::single(0));

        let snapshot = registry.snapshot();
        registry.record(2, AffinityMask::single(1));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn replace_all_drops_old_entries() {
        let registry = AssignmentRegistry::new();
        registry.record(1, AffinityMask::single(0));

        registry.replace_all(Assignments::from([(7, AffinityMask::single(5))]));

        assert_eq!(registry.get(1), None);
        assert_eq!(registry.get(7), Some(AffinityMask::single(5)));
    }

    #[test]
    fn failed_update_records_nothing() {
        let registry = AssignmentRegistry::new();

        let error = registry
            .update_with(5, AffinityMask::single(0), |pid, _| {
                Err::<(), _>(Error::ProcessNotFound { pid })
            })
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ProcessNotFound);
        assert!(registry.is_empty());
    }

    #[test]
    fn successful_update_records_mask() {
        let registry = AssignmentRegistry::new();

        let value = registry
            .update_with(5, AffinityMask::new([3, 1]).unwrap(), |pid, mask| {
                assert_eq!(pid, 5);
                Ok(mask.core_count())
            })
            .unwrap();

        assert_eq!(value, 2);
        assert_eq!(registry.get(5).unwrap().to_vec(), vec![3, 1]);
    }

    #[test]
    fn concurrent_updates_are_serialized() {
        const THREADS: u32 = 8;

        let registry = Arc::new(AssignmentRegistry::new());
        let barrier = Arc::new(Barrier::new(8));
        let order = Arc::new(Mutex::new(Vec::new()));

        let handles = (0..THREADS)
            .map(|core| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                let order = Arc::clone(&order);

                thread::spawn(move || {
                    barrier.wait();

                    registry
                        .update_with(1, AffinityMask::single(core), |_, mask| {
                            order.lock().unwrap().push(mask.clone());
                            Ok(())
                        })
                        .unwrap();
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }

        // Whichever write happened last is what the registry holds.
        let last_written = order.lock().unwrap().last().cloned();
        assert_eq!(registry.get(1), last_written);
    }
}

use std::io;

use tracing::{debug, info};

use crate::pal::{Platform, PlatformFacade};
use crate::primitive_types::validate_process_id;
use crate::{AffinityMask, Error, ProcessId, RawId, Result};

/// Reads and writes the affinity mask of processes.
///
/// Input validation always happens before any interaction with the operating system, so an
/// [`Error::InvalidArgument`] guarantees that nothing was attempted. Operating system failures
/// are classified into [`Error::ProcessNotFound`], [`Error::AccessDenied`] and
/// [`Error::Platform`].
///
/// The accessor does not keep track of what it has done. Recording successful writes is the job
/// of the [`AssignmentRegistry`][crate::AssignmentRegistry]; use a
/// [`Session`][crate::Session] to have that done automatically.
///
/// # Example
///
/// ```no_run
/// use proc_affinity::AffinityAccessor;
///
/// let accessor = AffinityAccessor::new();
///
/// let mask = accessor.set_affinity(1234, &[0, 1])?;
/// assert!(accessor.get_affinity(1234)?.same_cores_as(&mask));
/// # Ok::<(), proc_affinity::Error>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct AffinityAccessor {
    platform: PlatformFacade,
}

impl AffinityAccessor {
    /// Creates an accessor that operates on the real operating system.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn with_platform(platform: PlatformFacade) -> Self {
        Self { platform }
    }

    /// Reads the set of logical cores the process is currently permitted to execute on.
    ///
    /// The cores are returned in ascending order.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidArgument`] if `pid` is not a positive integer.
    /// * [`Error::ProcessNotFound`] if no such process is alive.
    /// * [`Error::AccessDenied`] if the current process may not inspect the target.
    /// * [`Error::Platform`] for any other operating system failure.
    pub fn get_affinity(&self, pid: RawId) -> Result<AffinityMask> {
        let pid = validate_process_id(pid)?;

        let cores = self.platform.process_affinity(pid)?;

        AffinityMask::new(cores).map_err(|error| {
            Error::platform(
                format!("failed to read the affinity of process {pid}"),
                io::Error::other(format!("the operating system reported {error}")),
            )
        })
    }

    /// Replaces the affinity mask of the process with the given cores.
    ///
    /// Duplicate cores are ignored. Either the whole mask is applied or none of it. Returns
    /// the mask that was applied.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidArgument`] if `pid` is not a positive integer or `cores` is empty or
    ///   contains a negative value. The operating system is not called in this case.
    /// * [`Error::ProcessNotFound`], [`Error::AccessDenied`] and [`Error::Platform`] as for
    ///   [`get_affinity()`][Self::get_affinity].
    pub fn set_affinity(&self, pid: RawId, cores: &[RawId]) -> Result<AffinityMask> {
        let pid = validate_process_id(pid)?;
        let mask = AffinityMask::from_raw(cores)?;

        self.set_mask(pid, &mask)?;

        Ok(mask)
    }

    /// Replaces the affinity mask of the process with an already validated mask.
    ///
    /// # Errors
    ///
    /// As for [`set_affinity()`][Self::set_affinity]. A process ID of zero is rejected with
    /// [`Error::InvalidArgument`] because some operating systems treat it as "the calling
    /// process".
    pub fn set_mask(&self, pid: ProcessId, mask: &AffinityMask) -> Result<()> {
        let pid = validate_process_id(RawId::from(pid))?;

        debug!(pid, cores = %mask, "setting affinity");

        self.platform.set_process_affinity(pid, mask)?;

        info!(pid, cores = %mask, "affinity set");

        Ok(())
    }

    /// Whether the current process runs with elevated privileges. Without them, access to
    /// processes owned by other users is likely to be denied.
    #[must_use]
    pub fn is_elevated(&self) -> bool {
        self.platform.is_elevated()
    }
}

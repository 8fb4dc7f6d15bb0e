#![cfg_attr(
    test,
    expect(
        clippy::struct_field_names,
        reason = "false positive from automock generated code"
    )
)]

use std::fmt::Debug;

use crate::{AffinityMask, LogicalCoreId, ProcessId, ProcessInfo, Result};

/// Processor counts as reported by the operating system.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct ProcessorCounts {
    pub(crate) logical: usize,
    pub(crate) physical: usize,
}

/// The operations the layers above need from the operating system.
///
/// Implementations classify operating system failures into the crate's error kinds; callers
/// above the PAL never inspect raw error codes.
///
/// Inputs are already validated when they arrive here: process IDs are positive and masks are
/// non-empty. Implementations must still reject masks they cannot represent.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Platform: Debug + Send + Sync + 'static {
    /// Number of logical and physical processors in the system.
    fn processor_counts(&self) -> Result<ProcessorCounts>;

    /// The logical cores the process is currently permitted to execute on, ascending.
    fn process_affinity(&self, pid: ProcessId) -> Result<Vec<LogicalCoreId>>;

    /// Replaces the affinity mask of the process. Either the whole mask is applied or nothing.
    fn set_process_affinity(&self, pid: ProcessId, mask: &AffinityMask) -> Result<()>;

    /// A snapshot of the live processes. Processes that exit while the snapshot is being taken
    /// are silently left out. The order is unspecified.
    fn processes(&self) -> Result<Vec<ProcessInfo>>;

    /// Whether the current process runs with elevated (administrator/root) privileges.
    fn is_elevated(&self) -> bool;
}

//! Fallback platform for operating systems without native support.
//!
//! Topology is estimated from `std::thread::available_parallelism()` and every processor is
//! treated as its own physical core. Process affinity cannot be inspected or changed, so those
//! operations fail with an unsupported platform error and the process list is empty.

use std::io;
use std::num::NonZeroUsize;
use std::thread;

use crate::pal::{Platform, ProcessorCounts};
use crate::{AffinityMask, Error, LogicalCoreId, ProcessId, ProcessInfo, Result};

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
#[cfg_attr(
    all(test, not(miri), any(target_os = "linux", windows)),
    expect(dead_code, reason = "only the primary implementation uses the singleton")
)]
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform;

#[derive(Debug, Default)]
pub(crate) struct BuildTargetPlatform;

impl Platform for BuildTargetPlatform {
    fn processor_counts(&self) -> Result<ProcessorCounts> {
        let logical = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .map_err(|error| {
                Error::topology_unavailable("processor count is not available", Some(error))
            })?;

        Ok(ProcessorCounts {
            logical,
            physical: logical,
        })
    }

    fn process_affinity(&self, pid: ProcessId) -> Result<Vec<LogicalCoreId>> {
        Err(unsupported(format!("failed to read the affinity of process {pid}")))
    }

    fn set_process_affinity(&self, pid: ProcessId, _mask: &AffinityMask) -> Result<()> {
        Err(unsupported(format!("failed to set the affinity of process {pid}")))
    }

    fn processes(&self) -> Result<Vec<ProcessInfo>> {
        Ok(Vec::new())
    }

    fn is_elevated(&self) -> bool {
        false
    }
}

fn unsupported(context: String) -> Error {
    Error::platform(
        context,
        io::Error::new(
            io::ErrorKind::Unsupported,
            "process affinity is not supported on this operating system",
        ),
    )
}

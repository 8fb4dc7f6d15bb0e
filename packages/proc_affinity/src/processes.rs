use derive_more::Display;
use tracing::debug;

use crate::pal::{Platform, PlatformFacade};
use crate::{ProcessId, Result};

/// A live process, as seen when the process list was taken.
#[derive(Clone, Debug, Display, Eq, Hash, PartialEq)]
#[display("{pid} {name}")]
pub struct ProcessInfo {
    pid: ProcessId,
    name: String,
}

impl ProcessInfo {
    /// Describes a process with the given ID and display name.
    #[must_use]
    pub fn new(pid: ProcessId, name: String) -> Self {
        Self { pid, name }
    }

    /// The process ID.
    #[must_use]
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// The display name of the process, typically its executable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Enumerates the processes running on the system.
#[derive(Clone, Debug, Default)]
pub struct ProcessLister {
    platform: PlatformFacade,
}

impl ProcessLister {
    /// Creates a lister that queries the operating system.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn with_platform(platform: PlatformFacade) -> Self {
        Self { platform }
    }

    /// A snapshot of the live processes, in ascending process ID order.
    ///
    /// The snapshot may be stale as soon as it is returned. Processes that exit while the
    /// snapshot is being taken are not included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Platform`][crate::Error::Platform] if the operating system refuses to
    /// enumerate processes.
    pub fn processes(&self) -> Result<Vec<ProcessInfo>> {
        let mut processes = self.platform.processes()?;
        processes.sort_by_key(ProcessInfo::pid);

        debug!(count = processes.len(), "enumerated processes");

        Ok(processes)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::pal::MockPlatform;

    #[test]
    fn sorted_by_pid() {
        let mut platform = MockPlatform::new();
        platform.expect_processes().returning(|| {
            Ok(vec![
                ProcessInfo::new(300, "c".to_string()),
                ProcessInfo::new(1, "init".to_string()),
                ProcessInfo::new(20, "b".to_string()),
            ])
        });

        let lister = ProcessLister::with_platform(PlatformFacade::from_mock(platform));

        let pids = lister
            .processes()
            .unwrap()
            .iter()
            .map(ProcessInfo::pid)
            .collect::<Vec<_>>();

        assert_eq!(pids, vec![1, 20, 300]);
    }

    #[test]
    fn display() {
        let process = ProcessInfo::new(42, "sleep".to_string());

        assert_eq!(process.to_string(), "42 sleep");
        assert_eq!(process.name(), "sleep");
    }

    #[cfg(all(target_os = "linux", not(miri)))]
    #[test]
    fn real_list_contains_self() {
        let processes = ProcessLister::new().processes().unwrap();

        assert!(processes.iter().any(|p| p.pid() == std::process::id()));
    }
}

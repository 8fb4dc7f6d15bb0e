use std::fmt::Debug;
use std::io;
#[cfg(test)]
use std::sync::Arc;

use crate::ProcessId;
#[cfg(test)]
use crate::pal::linux::MockFilesystem;
use crate::pal::linux::{BuildTargetFilesystem, Filesystem};

/// Enum to hide the different filesystem implementations behind a single wrapper type.
#[derive(Clone)]
pub(crate) enum FilesystemFacade {
    Target(&'static BuildTargetFilesystem),

    #[cfg(test)]
    Mock(Arc<MockFilesystem>),
}

impl FilesystemFacade {
    pub(crate) const fn target() -> Self {
        Self::Target(&BuildTargetFilesystem)
    }

    #[cfg(test)]
    pub(crate) fn from_mock(mock: MockFilesystem) -> Self {
        Self::Mock(Arc::new(mock))
    }
}

// Facade types are trivial pass-through layers - not worth testing.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl Filesystem for FilesystemFacade {
    fn get_cpuinfo_contents(&self) -> io::Result<String> {
        match self {
            Self::Target(filesystem) => filesystem.get_cpuinfo_contents(),
            #[cfg(test)]
            Self::Mock(mock) => mock.get_cpuinfo_contents(),
        }
    }

    fn get_cpu_thread_siblings_contents(&self, cpu_index: u32) -> Option<String> {
        match self {
            Self::Target(filesystem) => filesystem.get_cpu_thread_siblings_contents(cpu_index),
            #[cfg(test)]
            Self::Mock(mock) => mock.get_cpu_thread_siblings_contents(cpu_index),
        }
    }

    fn get_proc_pids(&self) -> io::Result<Vec<ProcessId>> {
        match self {
            Self::Target(filesystem) => filesystem.get_proc_pids(),
            #[cfg(test)]
            Self::Mock(mock) => mock.get_proc_pids(),
        }
    }

    fn get_proc_comm_contents(&self, pid: ProcessId) -> Option<String> {
        match self {
            Self::Target(filesystem) => filesystem.get_proc_comm_contents(pid),
            #[cfg(test)]
            Self::Mock(mock) => mock.get_proc_comm_contents(pid),
        }
    }
}

impl Debug for FilesystemFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Target(inner) => inner.fmt(f),
            #[cfg(test)]
            Self::Mock(inner) => inner.fmt(f),
        }
    }
}

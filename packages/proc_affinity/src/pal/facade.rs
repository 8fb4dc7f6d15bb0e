use std::fmt::Debug;
#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
use crate::pal::MockPlatform;
use crate::pal::{BUILD_TARGET_PLATFORM, BuildTargetPlatform, Platform, ProcessorCounts};
use crate::{AffinityMask, LogicalCoreId, ProcessId, ProcessInfo, Result};

/// Hides the real/mock platform choice behind a single type.
#[derive(Clone)]
pub(crate) enum PlatformFacade {
    Target(&'static BuildTargetPlatform),

    #[cfg(test)]
    Mock(Arc<MockPlatform>),
}

impl PlatformFacade {
    pub(crate) const fn target() -> Self {
        Self::Target(&BUILD_TARGET_PLATFORM)
    }

    #[cfg(test)]
    pub(crate) fn from_mock(mock: MockPlatform) -> Self {
        Self::Mock(Arc::new(mock))
    }
}

// Facade types are trivial pass-through layers - not worth testing.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl Platform for PlatformFacade {
    fn processor_counts(&self) -> Result<ProcessorCounts> {
        match self {
            Self::Target(p) => p.processor_counts(),
            #[cfg(test)]
            Self::Mock(p) => p.processor_counts(),
        }
    }

    fn process_affinity(&self, pid: ProcessId) -> Result<Vec<LogicalCoreId>> {
        match self {
            Self::Target(p) => p.process_affinity(pid),
            #[cfg(test)]
            Self::Mock(p) => p.process_affinity(pid),
        }
    }

    fn set_process_affinity(&self, pid: ProcessId, mask: &AffinityMask) -> Result<()> {
        match self {
            Self::Target(p) => p.set_process_affinity(pid, mask),
            #[cfg(test)]
            Self::Mock(p) => p.set_process_affinity(pid, mask),
        }
    }

    fn processes(&self) -> Result<Vec<ProcessInfo>> {
        match self {
            Self::Target(p) => p.processes(),
            #[cfg(test)]
            Self::Mock(p) => p.processes(),
        }
    }

    fn is_elevated(&self) -> bool {
        match self {
            Self::Target(p) => p.is_elevated(),
            #[cfg(test)]
            Self::Mock(p) => p.is_elevated(),
        }
    }
}

impl Default for PlatformFacade {
    fn default() -> Self {
        Self::target()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
impl Debug for PlatformFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Target(inner) => inner.fmt(f),
            #[cfg(test)]
            Self::Mock(inner) => inner.fmt(f),
        }
    }
}

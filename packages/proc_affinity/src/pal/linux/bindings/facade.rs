#![cfg_attr(coverage_nightly, coverage(off))]

use std::fmt::Debug;
use std::io;
#[cfg(test)]
use std::sync::Arc;

use libc::{cpu_set_t, pid_t, uid_t};

#[cfg(test)]
use crate::pal::linux::MockBindings;
use crate::pal::linux::{Bindings, BuildTargetBindings};

/// Enum to hide the real/mock choice behind a single wrapper type.
#[derive(Clone)]
pub(crate) enum BindingsFacade {
    Target(&'static BuildTargetBindings),

    #[cfg(test)]
    Mock(Arc<MockBindings>),
}

impl BindingsFacade {
    pub(crate) const fn target() -> Self {
        Self::Target(&BuildTargetBindings)
    }

    #[cfg(test)]
    pub(crate) fn from_mock(mock: MockBindings) -> Self {
        Self::Mock(Arc::new(mock))
    }
}

#[cfg_attr(test, mutants::skip)]
impl Bindings for BindingsFacade {
    fn sched_getaffinity(&self, pid: pid_t) -> Result<cpu_set_t, io::Error> {
        match self {
            Self::Target(bindings) => bindings.sched_getaffinity(pid),
            #[cfg(test)]
            Self::Mock(mock) => mock.sched_getaffinity(pid),
        }
    }

    fn sched_setaffinity(&self, pid: pid_t, cpuset: &cpu_set_t) -> Result<(), io::Error> {
        match self {
            Self::Target(bindings) => bindings.sched_setaffinity(pid, cpuset),
            #[cfg(test)]
            Self::Mock(mock) => mock.sched_setaffinity(pid, cpuset),
        }
    }

    fn online_processor_count(&self) -> Result<usize, io::Error> {
        match self {
            Self::Target(bindings) => bindings.online_processor_count(),
            #[cfg(test)]
            Self::Mock(mock) => mock.online_processor_count(),
        }
    }

    fn geteuid(&self) -> uid_t {
        match self {
            Self::Target(bindings) => bindings.geteuid(),
            #[cfg(test)]
            Self::Mock(mock) => mock.geteuid(),
        }
    }
}

impl Debug for BindingsFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Target(inner) => inner.fmt(f),
            #[cfg(test)]
            Self::Mock(inner) => inner.fmt(f),
        }
    }
}

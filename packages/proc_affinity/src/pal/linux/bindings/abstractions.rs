#![cfg_attr(
    test,
    expect(
        clippy::struct_field_names,
        reason = "false positive from automock generated code"
    )
)]

use std::fmt::Debug;
use std::io;

use libc::{cpu_set_t, pid_t, uid_t};

/// Bindings for FFI calls into the operating system.
///
/// All PAL FFI calls must go through this trait, enabling them to be mocked.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Bindings: Debug + Send + Sync + 'static {
    // sched_getaffinity() for an arbitrary process
    fn sched_getaffinity(&self, pid: pid_t) -> Result<cpu_set_t, io::Error>;

    // sched_setaffinity() for an arbitrary process
    fn sched_setaffinity(&self, pid: pid_t, cpuset: &cpu_set_t) -> Result<(), io::Error>;

    // sysconf(_SC_NPROCESSORS_ONLN)
    fn online_processor_count(&self) -> Result<usize, io::Error>;

    fn geteuid(&self) -> uid_t;
}

#![cfg_attr(
    test,
    expect(
        clippy::struct_field_names,
        reason = "false positive from automock generated code"
    )
)]

use std::fmt::Debug;
use std::io;

use crate::ProcessId;

/// Linux exposes processor topology and process metadata via the procfs and sysfs virtual
/// filesystems. This trait abstracts that virtual filesystem to allow it to be mocked.
///
/// The scope of this trait is limited to the virtual filesystem exposed by the OS. All I/O is
/// synchronous and blocking because the data never lives on a real storage device.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Filesystem: Debug + Send + Sync + 'static {
    /// Get the contents of the /proc/cpuinfo file.
    ///
    /// This is a plaintext file with "key    : value" pairs, blocks separated by empty lines.
    fn get_cpuinfo_contents(&self) -> io::Result<String>;

    /// Gets the contents of the
    /// /sys/devices/system/cpu/cpu{}/topology/thread_siblings_list file, or `None` if it
    /// does not exist (e.g. in some containers and on some virtual machines).
    ///
    /// This is a cpulist format file listing the logical processors that share a physical core
    /// with the given one (including itself).
    fn get_cpu_thread_siblings_contents(&self, cpu_index: u32) -> Option<String>;

    /// Lists the numeric entries of /proc, i.e. the IDs of the processes alive at the moment.
    fn get_proc_pids(&self) -> io::Result<Vec<ProcessId>>;

    /// Gets the contents of the /proc/{pid}/comm file, or `None` if the process has exited.
    ///
    /// This is a single line holding the command name (+ newline).
    fn get_proc_comm_contents(&self, pid: ProcessId) -> Option<String>;
}

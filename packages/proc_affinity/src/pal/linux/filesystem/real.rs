use std::fmt::Debug;
use std::{fs, io};

use crate::ProcessId;
use crate::pal::linux::Filesystem;

/// The virtual filesystem for the real operating system that the build is targeting.
///
/// You would only use different filesystems in PAL unit tests that need to use a mock filesystem.
/// Even then, whenever possible, unit tests should use the real filesystem for maximum realism.
#[derive(Debug, Default)]
pub(crate) struct BuildTargetFilesystem;

// Real filesystem bindings are excluded from coverage measurement because:
// 1. They are tested via integration tests running on actual Linux.
// 2. Some paths (like sysfs topology) are not available on all test systems.
#[cfg_attr(coverage_nightly, coverage(off))]
impl Filesystem for BuildTargetFilesystem {
    fn get_cpuinfo_contents(&self) -> io::Result<String> {
        fs::read_to_string("/proc/cpuinfo")
    }

    fn get_cpu_thread_siblings_contents(&self, cpu_index: u32) -> Option<String> {
        fs::read_to_string(format!(
            "/sys/devices/system/cpu/cpu{cpu_index}/topology/thread_siblings_list"
        ))
        .ok()
    }

    fn get_proc_pids(&self) -> io::Result<Vec<ProcessId>> {
        let mut pids = Vec::new();

        for entry in fs::read_dir("/proc")? {
            let entry = entry?;

            // Everything that is not a number is some other kernel interface, not a process.
            if let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<ProcessId>().ok())
            {
                pids.push(pid);
            }
        }

        Ok(pids)
    }

    fn get_proc_comm_contents(&self, pid: ProcessId) -> Option<String> {
        fs::read_to_string(format!("/proc/{pid}/comm")).ok()
    }
}

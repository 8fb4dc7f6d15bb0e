use std::collections::BTreeSet;
use std::{io, mem};

use libc::{cpu_set_t, pid_t};
use tracing::debug;

use crate::pal::linux::{Bindings, BindingsFacade, Filesystem, FilesystemFacade};
use crate::pal::{Platform, ProcessorCounts};
use crate::{
    AffinityMask, AffinityOperation, Error, LogicalCoreId, ProcessId, ProcessInfo, Result,
    core_list,
};

/// Number of processors that fit in a fixed-size `cpu_set_t` (`CPU_SETSIZE`).
const CPU_SET_CAPACITY: usize = size_of::<cpu_set_t>() * 8;

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform =
    BuildTargetPlatform::new(BindingsFacade::target(), FilesystemFacade::target());

/// The platform that matches the crate's build target.
///
/// You would only use a different platform in unit tests that need to mock the platform.
/// Even then, whenever possible, unit tests should use the real platform for maximum realism.
#[derive(Debug)]
pub(crate) struct BuildTargetPlatform {
    bindings: BindingsFacade,
    fs: FilesystemFacade,
}

impl BuildTargetPlatform {
    pub(crate) const fn new(bindings: BindingsFacade, fs: FilesystemFacade) -> Self {
        Self { bindings, fs }
    }

    /// Counts physical cores as the number of distinct thread sibling groups among the logical
    /// processors. Returns `None` if sysfs does not expose topology for every processor.
    fn physical_core_count_from_sysfs(&self, logical: usize) -> Result<Option<usize>> {
        let logical = u32::try_from(logical).map_err(|error| {
            Error::topology_unavailable(
                format!("{logical} logical processors is more than we can address ({error})"),
                None,
            )
        })?;

        let mut sibling_groups = BTreeSet::new();

        for cpu_index in 0..logical {
            let Some(contents) = self.fs.get_cpu_thread_siblings_contents(cpu_index) else {
                debug!(cpu_index, "no sysfs thread sibling information");
                return Ok(None);
            };

            let siblings = core_list::parse(contents.trim()).map_err(|error| {
                Error::topology_unavailable(
                    format!("thread sibling list of processor {cpu_index} is malformed: {error}"),
                    None,
                )
            })?;

            sibling_groups.insert(siblings);
        }

        Ok(Some(sibling_groups.len()))
    }

    /// Counts physical cores as the number of distinct (physical id, core id) pairs in
    /// /proc/cpuinfo.
    fn physical_core_count_from_cpuinfo(&self) -> Result<usize> {
        let cpuinfo = self.fs.get_cpuinfo_contents().map_err(|error| {
            Error::topology_unavailable("failed to read /proc/cpuinfo", Some(error))
        })?;

        let cores = parse_cpuinfo_cores(&cpuinfo);

        if cores.is_empty() {
            return Err(Error::topology_unavailable(
                "neither sysfs nor /proc/cpuinfo describe the physical cores of this system",
                None,
            ));
        }

        Ok(cores.len())
    }
}

impl Platform for BuildTargetPlatform {
    fn processor_counts(&self) -> Result<ProcessorCounts> {
        debug!("sysconf(_SC_NPROCESSORS_ONLN)");

        let logical = self.bindings.online_processor_count().map_err(|error| {
            Error::topology_unavailable("failed to query the number of online processors", Some(error))
        })?;

        let physical = match self.physical_core_count_from_sysfs(logical)? {
            Some(physical) => physical,
            None => self.physical_core_count_from_cpuinfo()?,
        };

        Ok(ProcessorCounts { logical, physical })
    }

    fn process_affinity(&self, pid: ProcessId) -> Result<Vec<LogicalCoreId>> {
        let native_pid = native_pid(pid)?;

        debug!(pid, "sched_getaffinity");

        let cpuset = self
            .bindings
            .sched_getaffinity(native_pid)
            .map_err(|error| classify_os_error(pid, AffinityOperation::Read, error))?;

        Ok(cpuset_to_cores(&cpuset))
    }

    fn set_process_affinity(&self, pid: ProcessId, mask: &AffinityMask) -> Result<()> {
        let native_pid = native_pid(pid)?;
        let cpuset = mask_to_cpuset(pid, mask)?;

        debug!(pid, cores = %mask, "sched_setaffinity");

        self.bindings
            .sched_setaffinity(native_pid, &cpuset)
            .map_err(|error| classify_os_error(pid, AffinityOperation::Write, error))
    }

    fn processes(&self) -> Result<Vec<ProcessInfo>> {
        let pids = self
            .fs
            .get_proc_pids()
            .map_err(|error| Error::platform("failed to enumerate processes in /proc", error))?;

        // A process may exit between listing /proc and reading its name. It is simply not
        // part of the snapshot then.
        Ok(pids
            .into_iter()
            .filter_map(|pid| {
                self.fs
                    .get_proc_comm_contents(pid)
                    .map(|comm| ProcessInfo::new(pid, comm.trim_end().to_string()))
            })
            .collect())
    }

    fn is_elevated(&self) -> bool {
        self.bindings.geteuid() == 0
    }
}

/// A process ID that does not fit in `pid_t` cannot belong to any process.
fn native_pid(pid: ProcessId) -> Result<pid_t> {
    pid_t::try_from(pid).map_err(|_out_of_range| Error::ProcessNotFound { pid })
}

fn classify_os_error(pid: ProcessId, operation: AffinityOperation, error: io::Error) -> Error {
    match error.raw_os_error() {
        Some(libc::ESRCH) => Error::ProcessNotFound { pid },
        Some(libc::EPERM | libc::EACCES) => Error::AccessDenied { pid, operation },
        _ => Error::platform(format!("failed to {operation} of process {pid}"), error),
    }
}

fn cpuset_to_cores(cpuset: &cpu_set_t) -> Vec<LogicalCoreId> {
    (0..CPU_SET_CAPACITY)
        // SAFETY: The index is within the capacity of the set.
        .filter(|index| unsafe { libc::CPU_ISSET(*index, cpuset) })
        .filter_map(|index| LogicalCoreId::try_from(index).ok())
        .collect()
}

fn mask_to_cpuset(pid: ProcessId, mask: &AffinityMask) -> Result<cpu_set_t> {
    // SAFETY: All zeroes is a valid cpu_set_t (the empty set).
    let mut cpuset: cpu_set_t = unsafe { mem::zeroed() };

    for core in mask.iter() {
        let index = usize::try_from(core)
            .ok()
            .filter(|index| *index < CPU_SET_CAPACITY)
            .ok_or_else(|| {
                Error::platform(
                    format!("failed to set the affinity of process {pid}"),
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!(
                            "core {core} is beyond the {CPU_SET_CAPACITY} processors supported by the affinity API"
                        ),
                    ),
                )
            })?;

        // SAFETY: The index is within the capacity of the set.
        unsafe {
            libc::CPU_SET(index, &mut cpuset);
        }
    }

    Ok(cpuset)
}

fn parse_cpuinfo_cores(cpuinfo: &str) -> BTreeSet<(&str, &str)> {
    cpuinfo
        .split("\n\n")
        .filter_map(|block| {
            // Single-socket systems do not always report a physical id.
            let mut physical_id = "0";
            let mut core_id = None;

            for (key, value) in block.lines().filter_map(|line| line.split_once(':')) {
                match key.trim() {
                    "physical id" => physical_id = value.trim(),
                    "core id" => core_id = Some(value.trim()),
                    _ => {}
                }
            }

            core_id.map(|core_id| (physical_id, core_id))
        })
        .collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::pal::linux::{MockBindings, MockFilesystem};

    fn platform(bindings: MockBindings, fs: MockFilesystem) -> BuildTargetPlatform {
        BuildTargetPlatform::new(
            BindingsFacade::from_mock(bindings),
            FilesystemFacade::from_mock(fs),
        )
    }

    fn cpuset_of(cores: &[LogicalCoreId]) -> cpu_set_t {
        mask_to_cpuset(1, &AffinityMask::new(cores.iter().copied()).unwrap()).unwrap()
    }

    const CPUINFO_4C_8T: &str = "\
processor\t: 0
physical id\t: 0
core id\t\t: 0

processor\t: 1
physical id\t: 0
core id\t\t: 1

processor\t: 2
physical id\t: 0
core id\t\t: 2

processor\t: 3
physical id\t: 0
core id\t\t: 3

processor\t: 4
physical id\t: 0
core id\t\t: 0

processor\t: 5
physical id\t: 0
core id\t\t: 1

processor\t: 6
physical id\t: 0
core id\t\t: 2

processor\t: 7
physical id\t: 0
core id\t\t: 3
";

    #[test]
    fn cpuset_conversion_is_ascending() {
        let cpuset = cpuset_of(&[5, 0, 63, 2]);
        assert_eq!(cpuset_to_cores(&cpuset), vec![0, 2, 5, 63]);
    }

    #[test]
    fn process_affinity_reads_cpuset() {
        let mut bindings = MockBindings::new();
        let cpuset = cpuset_of(&[1, 3]);

        bindings
            .expect_sched_getaffinity()
            .withf(|pid| *pid == 1234)
            .times(1)
            .returning(move |_| Ok(cpuset));

        let platform = platform(bindings, MockFilesystem::new());

        assert_eq!(platform.process_affinity(1234).unwrap(), vec![1, 3]);
    }

    #[test]
    fn set_process_affinity_writes_whole_mask() {
        let mut bindings = MockBindings::new();

        bindings
            .expect_sched_setaffinity()
            .withf(|pid, cpuset| *pid == 77 && cpuset_to_cores(cpuset) == vec![0, 2, 4])
            .times(1)
            .returning(|_, _| Ok(()));

        let platform = platform(bindings, MockFilesystem::new());
        let mask = AffinityMask::new([4, 0, 2]).unwrap();

        platform.set_process_affinity(77, &mask).unwrap();
    }

    #[test]
    fn errno_is_classified() {
        let cases = [
            (libc::ESRCH, ErrorKind::ProcessNotFound),
            (libc::EPERM, ErrorKind::AccessDenied),
            (libc::EACCES, ErrorKind::AccessDenied),
            (libc::EINVAL, ErrorKind::PlatformError),
            (libc::EFAULT, ErrorKind::PlatformError),
        ];

        for (errno, expected) in cases {
            let mut bindings = MockBindings::new();

            bindings
                .expect_sched_setaffinity()
                .returning(move |_, _| Err(io::Error::from_raw_os_error(errno)));
            bindings
                .expect_sched_getaffinity()
                .returning(move |_| Err(io::Error::from_raw_os_error(errno)));

            let platform = platform(bindings, MockFilesystem::new());

            let error = platform
                .set_process_affinity(10, &AffinityMask::single(0))
                .unwrap_err();
            assert_eq!(error.kind(), expected, "set with errno {errno}");

            let error = platform.process_affinity(10).unwrap_err();
            assert_eq!(error.kind(), expected, "get with errno {errno}");
        }
    }

    #[test]
    fn unrepresentable_core_fails_without_syscall() {
        // No expectations: any call into the bindings fails the test.
        let platform = platform(MockBindings::new(), MockFilesystem::new());

        let out_of_range = LogicalCoreId::try_from(CPU_SET_CAPACITY).unwrap();
        let mask = AffinityMask::new([0, out_of_range]).unwrap();

        let error = platform.set_process_affinity(10, &mask).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::PlatformError);
    }

    #[test]
    fn oversized_pid_is_not_found_without_syscall() {
        let platform = platform(MockBindings::new(), MockFilesystem::new());

        let error = platform.process_affinity(u32::MAX).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ProcessNotFound);
    }

    #[test]
    fn physical_cores_from_sysfs_siblings() {
        let mut bindings = MockBindings::new();
        bindings.expect_online_processor_count().returning(|| Ok(8));

        let mut fs = MockFilesystem::new();
        fs.expect_get_cpu_thread_siblings_contents()
            .returning(|cpu_index| {
                let core = cpu_index % 4;
                Some(format!("{core},{}\n", core + 4))
            });

        let counts = platform(bindings, fs).processor_counts().unwrap();

        assert_eq!(
            counts,
            ProcessorCounts {
                logical: 8,
                physical: 4
            }
        );
    }

    #[test]
    fn physical_cores_from_cpuinfo_when_sysfs_missing() {
        let mut bindings = MockBindings::new();
        bindings.expect_online_processor_count().returning(|| Ok(8));

        let mut fs = MockFilesystem::new();
        fs.expect_get_cpu_thread_siblings_contents()
            .returning(|_| None);
        fs.expect_get_cpuinfo_contents()
            .returning(|| Ok(CPUINFO_4C_8T.to_string()));

        let counts = platform(bindings, fs).processor_counts().unwrap();

        assert_eq!(counts.logical, 8);
        assert_eq!(counts.physical, 4);
    }

    #[test]
    fn topology_unavailable_without_core_information() {
        let mut bindings = MockBindings::new();
        bindings.expect_online_processor_count().returning(|| Ok(2));

        let mut fs = MockFilesystem::new();
        fs.expect_get_cpu_thread_siblings_contents()
            .returning(|_| None);
        fs.expect_get_cpuinfo_contents()
            .returning(|| Ok("processor\t: 0\n\nprocessor\t: 1\n".to_string()));

        let error = platform(bindings, fs).processor_counts().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::TopologyUnavailable);
    }

    #[test]
    fn topology_unavailable_when_sysconf_fails() {
        let mut bindings = MockBindings::new();
        bindings
            .expect_online_processor_count()
            .returning(|| Err(io::Error::from_raw_os_error(libc::EINVAL)));

        let error = platform(bindings, MockFilesystem::new())
            .processor_counts()
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::TopologyUnavailable);
    }

    #[test]
    fn malformed_sibling_list_is_topology_unavailable() {
        let mut bindings = MockBindings::new();
        bindings.expect_online_processor_count().returning(|| Ok(1));

        let mut fs = MockFilesystem::new();
        fs.expect_get_cpu_thread_siblings_contents()
            .returning(|_| Some("garbage\n".to_string()));

        let error = platform(bindings, fs).processor_counts().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::TopologyUnavailable);
    }

    #[test]
    fn processes_skip_exited() {
        let mut fs = MockFilesystem::new();
        fs.expect_get_proc_pids().returning(|| Ok(vec![1, 42, 7]));
        fs.expect_get_proc_comm_contents().returning(|pid| match pid {
            1 => Some("systemd\n".to_string()),
            7 => Some("kworker/0:1\n".to_string()),
            _ => None,
        });

        let processes = platform(MockBindings::new(), fs).processes().unwrap();

        assert_eq!(
            processes,
            vec![
                ProcessInfo::new(1, "systemd".to_string()),
                ProcessInfo::new(7, "kworker/0:1".to_string()),
            ]
        );
    }

    #[test]
    fn process_enumeration_failure_is_platform_error() {
        let mut fs = MockFilesystem::new();
        fs.expect_get_proc_pids()
            .returning(|| Err(io::Error::from_raw_os_error(libc::EMFILE)));

        let error = platform(MockBindings::new(), fs).processes().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::PlatformError);
    }

    #[test]
    fn elevated_means_root() {
        let mut bindings = MockBindings::new();
        bindings.expect_geteuid().times(1).return_const(0_u32);
        assert!(platform(bindings, MockFilesystem::new()).is_elevated());

        let mut bindings = MockBindings::new();
        bindings.expect_geteuid().times(1).return_const(1000_u32);
        assert!(!platform(bindings, MockFilesystem::new()).is_elevated());
    }

    #[test]
    fn cpuinfo_without_physical_id() {
        let cpuinfo = "processor : 0\ncore id : 0\n\nprocessor : 1\ncore id : 1\n";
        assert_eq!(parse_cpuinfo_cores(cpuinfo).len(), 2);
    }
}

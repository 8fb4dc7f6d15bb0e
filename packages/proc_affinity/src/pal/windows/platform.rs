use std::io;

use tracing::debug;
use windows::Win32::Foundation::{
    ERROR_ACCESS_DENIED, ERROR_INSUFFICIENT_BUFFER, ERROR_INVALID_PARAMETER,
};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW,
    TH32CS_SNAPPROCESS,
};
use windows::Win32::System::SystemInformation::{
    GetLogicalProcessorInformation, RelationProcessorCore, SYSTEM_LOGICAL_PROCESSOR_INFORMATION,
};
use windows::Win32::System::Threading::{
    ALL_PROCESSOR_GROUPS, GetActiveProcessorCount, GetProcessAffinityMask, OpenProcess,
    PROCESS_ACCESS_RIGHTS, PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_SET_INFORMATION,
    SetProcessAffinityMask,
};
use windows::Win32::UI::Shell::IsUserAnAdmin;
use windows::core::HRESULT;

use crate::pal::windows::OwnedHandle;
use crate::pal::{Platform, ProcessorCounts};
use crate::{AffinityMask, AffinityOperation, Error, LogicalCoreId, ProcessId, ProcessInfo, Result};

/// A process affinity mask covers the processors of one processor group, at most one per bit.
const MASK_CAPACITY: u32 = usize::BITS;

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform;

/// The platform that matches the crate's build target.
#[derive(Debug, Default)]
pub(crate) struct BuildTargetPlatform;

impl BuildTargetPlatform {
    fn open_process(
        pid: ProcessId,
        access: PROCESS_ACCESS_RIGHTS,
        operation: AffinityOperation,
    ) -> Result<OwnedHandle> {
        debug!(pid, "OpenProcess");

        // SAFETY: No safety requirements beyond passing valid arguments.
        let handle = unsafe { OpenProcess(access, false, pid) }
            .map_err(|error| classify_os_error(pid, operation, error))?;

        // SAFETY: OpenProcess returned a fresh handle that nobody else owns.
        Ok(unsafe { OwnedHandle::new(handle) })
    }

    fn physical_core_count() -> Result<usize> {
        let mut length = 0_u32;

        // SAFETY: Probing for the buffer size, no buffer is written.
        let probe = unsafe { GetLogicalProcessorInformation(None, &raw mut length) };

        if let Err(error) = probe
            && error.code() != HRESULT::from_win32(ERROR_INSUFFICIENT_BUFFER.0)
        {
            return Err(Error::topology_unavailable(
                "failed to query the processor topology",
                Some(io::Error::from(error)),
            ));
        }

        let entry_size = size_of::<SYSTEM_LOGICAL_PROCESSOR_INFORMATION>();
        let byte_length = usize::try_from(length).map_err(|error| {
            Error::topology_unavailable(
                format!("processor topology buffer size is out of range ({error})"),
                None,
            )
        })?;

        let mut buffer =
            vec![SYSTEM_LOGICAL_PROCESSOR_INFORMATION::default(); byte_length.div_ceil(entry_size)];

        // SAFETY: The buffer is at least `length` bytes, as requested by the probe above.
        unsafe { GetLogicalProcessorInformation(Some(buffer.as_mut_ptr()), &raw mut length) }
            .map_err(|error| {
                Error::topology_unavailable(
                    "failed to query the processor topology",
                    Some(io::Error::from(error)),
                )
            })?;

        let filled = usize::try_from(length)
            .map(|byte_length| byte_length.checked_div(entry_size).unwrap_or_default())
            .unwrap_or_default();

        let cores = buffer
            .iter()
            .take(filled)
            .filter(|info| info.Relationship == RelationProcessorCore)
            .count();

        if cores == 0 {
            return Err(Error::topology_unavailable(
                "the operating system did not report any physical cores",
                None,
            ));
        }

        Ok(cores)
    }
}

impl Platform for BuildTargetPlatform {
    fn processor_counts(&self) -> Result<ProcessorCounts> {
        debug!("GetActiveProcessorCount");

        // SAFETY: No safety requirements.
        let logical = unsafe { GetActiveProcessorCount(ALL_PROCESSOR_GROUPS) };

        if logical == 0 {
            return Err(Error::topology_unavailable(
                "failed to query the number of active processors",
                Some(io::Error::last_os_error()),
            ));
        }

        let logical = usize::try_from(logical).map_err(|error| {
            Error::topology_unavailable(format!("processor count is out of range ({error})"), None)
        })?;

        Ok(ProcessorCounts {
            logical,
            physical: Self::physical_core_count()?,
        })
    }

    fn process_affinity(&self, pid: ProcessId) -> Result<Vec<LogicalCoreId>> {
        let process = Self::open_process(
            pid,
            PROCESS_QUERY_LIMITED_INFORMATION,
            AffinityOperation::Read,
        )?;

        let mut process_mask = 0_usize;
        let mut system_mask = 0_usize;

        debug!(pid, "GetProcessAffinityMask");

        // SAFETY: The handle is valid and the out-pointers point to live locals.
        unsafe {
            GetProcessAffinityMask(
                process.get(),
                &raw mut process_mask,
                &raw mut system_mask,
            )
        }
        .map_err(|error| classify_os_error(pid, AffinityOperation::Read, error))?;

        Ok(bits_to_cores(process_mask))
    }

    fn set_process_affinity(&self, pid: ProcessId, mask: &AffinityMask) -> Result<()> {
        let bits = mask_to_bits(pid, mask)?;

        let process = Self::open_process(pid, PROCESS_SET_INFORMATION, AffinityOperation::Write)?;

        debug!(pid, cores = %mask, "SetProcessAffinityMask");

        // SAFETY: The handle is valid.
        unsafe { SetProcessAffinityMask(process.get(), bits) }
            .map_err(|error| classify_os_error(pid, AffinityOperation::Write, error))
    }

    fn processes(&self) -> Result<Vec<ProcessInfo>> {
        debug!("CreateToolhelp32Snapshot");

        // SAFETY: No safety requirements beyond passing valid arguments.
        let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }.map_err(
            |error| Error::platform("failed to snapshot the process list", io::Error::from(error)),
        )?;

        // SAFETY: CreateToolhelp32Snapshot returned a fresh handle that nobody else owns.
        let snapshot = unsafe { OwnedHandle::new(snapshot) };

        let mut entry = PROCESSENTRY32W {
            dwSize: u32::try_from(size_of::<PROCESSENTRY32W>()).map_err(|error| {
                Error::platform("process entry size is out of range", io::Error::other(error))
            })?,
            ..PROCESSENTRY32W::default()
        };

        let mut processes = Vec::new();

        // SAFETY: The entry is initialized with its own size, as the API requires.
        let mut next = unsafe { Process32FirstW(snapshot.get(), &raw mut entry) };

        while next.is_ok() {
            let name_length = entry
                .szExeFile
                .iter()
                .position(|c| *c == 0)
                .unwrap_or(entry.szExeFile.len());

            let name = String::from_utf16_lossy(entry.szExeFile.get(..name_length).unwrap_or_default());
            processes.push(ProcessInfo::new(entry.th32ProcessID, name));

            // SAFETY: Same as above, the entry still carries its size.
            next = unsafe { Process32NextW(snapshot.get(), &raw mut entry) };
        }

        Ok(processes)
    }

    fn is_elevated(&self) -> bool {
        // SAFETY: No safety requirements.
        unsafe { IsUserAnAdmin() }.as_bool()
    }
}

fn classify_os_error(
    pid: ProcessId,
    operation: AffinityOperation,
    error: windows::core::Error,
) -> Error {
    let code = error.code();

    // OpenProcess reports a process that does not exist as an invalid parameter.
    if code == HRESULT::from_win32(ERROR_INVALID_PARAMETER.0) {
        Error::ProcessNotFound { pid }
    } else if code == HRESULT::from_win32(ERROR_ACCESS_DENIED.0) {
        Error::AccessDenied { pid, operation }
    } else {
        Error::platform(
            format!("failed to {operation} of process {pid}"),
            io::Error::from(error),
        )
    }
}

fn bits_to_cores(bits: usize) -> Vec<LogicalCoreId> {
    (0..MASK_CAPACITY)
        .filter(|index| bits.checked_shr(*index).is_some_and(|shifted| shifted & 1 == 1))
        .collect()
}

fn mask_to_bits(pid: ProcessId, mask: &AffinityMask) -> Result<usize> {
    mask.iter().try_fold(0_usize, |bits, core| {
        1_usize
            .checked_shl(core)
            .map(|bit| bits | bit)
            .ok_or_else(|| {
                Error::platform(
                    format!("failed to set the affinity of process {pid}"),
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!(
                            "core {core} is beyond the {MASK_CAPACITY} processors of a processor group"
                        ),
                    ),
                )
            })
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn bits_round_trip() {
        let mask = AffinityMask::new([3, 0, 1]).unwrap();
        let bits = mask_to_bits(1, &mask).unwrap();

        assert_eq!(bits, 0b1011);
        assert_eq!(bits_to_cores(bits), vec![0, 1, 3]);
    }

    #[test]
    fn core_beyond_group_is_platform_error() {
        let mask = AffinityMask::single(MASK_CAPACITY);

        let error = mask_to_bits(1, &mask).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::PlatformError);
    }

    #[test]
    fn error_classification() {
        let not_found =
            windows::core::Error::from_hresult(HRESULT::from_win32(ERROR_INVALID_PARAMETER.0));
        let denied = windows::core::Error::from_hresult(HRESULT::from_win32(ERROR_ACCESS_DENIED.0));
        let other =
            windows::core::Error::from_hresult(HRESULT::from_win32(ERROR_INSUFFICIENT_BUFFER.0));

        assert_eq!(
            classify_os_error(5, AffinityOperation::Read, not_found).kind(),
            ErrorKind::ProcessNotFound
        );
        assert_eq!(
            classify_os_error(5, AffinityOperation::Write, denied).kind(),
            ErrorKind::AccessDenied
        );
        assert_eq!(
            classify_os_error(5, AffinityOperation::Write, other).kind(),
            ErrorKind::PlatformError
        );
    }

    #[test]
    fn real_topology_is_consistent() {
        let counts = BUILD_TARGET_PLATFORM.processor_counts().unwrap();

        assert!(counts.logical >= 1);
        assert!(counts.physical >= 1);
        assert!(counts.physical <= counts.logical);
    }
}

use crate::{Error, Result};

/// Identifies a process on the host operating system.
///
/// This will match the numeric identifier used by standard tooling of the operating system.
/// A process ID is a reference into state owned by the operating system: the process may exit
/// (and the ID may even be reused) at any time between validation and use.
pub type ProcessId = u32;

/// Identifies one logical processor (a schedulable unit as exposed by the operating system).
///
/// Logical core IDs are assumed to be dense and zero-based, i.e. a system with 8 logical
/// processors uses the IDs `0..=7`.
pub type LogicalCoreId = u32;

/// An identifier exactly as supplied by a caller, before it has been validated.
///
/// Signed so that obviously invalid input (zero or negative process IDs, negative core IDs) can
/// be expressed and rejected with [`Error::InvalidArgument`] instead of being unrepresentable
/// at the call site.
pub type RawId = i64;

/// Validates a raw process ID, which must be a positive integer that fits in [`ProcessId`].
pub(crate) fn validate_process_id(raw: RawId) -> Result<ProcessId> {
    if raw <= 0 {
        return Err(Error::invalid_argument(
            raw.to_string(),
            "process id must be a positive integer",
        ));
    }

    ProcessId::try_from(raw).map_err(|error| {
        Error::invalid_argument(
            raw.to_string(),
            format!("process id is out of the supported range ({error})"),
        )
    })
}

/// Validates a raw logical core ID, which must be a non-negative integer that fits in
/// [`LogicalCoreId`].
pub(crate) fn validate_core_id(raw: RawId) -> Result<LogicalCoreId> {
    if raw < 0 {
        return Err(Error::invalid_argument(
            raw.to_string(),
            "core id must be a non-negative integer",
        ));
    }

    LogicalCoreId::try_from(raw).map_err(|error| {
        Error::invalid_argument(
            raw.to_string(),
            format!("core id is out of the supported range ({error})"),
        )
    })
}

/// Parses a process ID from text, e.g. a command line argument.
///
/// Anything that is not an integer is rejected with [`Error::InvalidArgument`], as is any integer
/// that is not a valid process ID.
///
/// # Example
///
/// ```
/// assert_eq!(proc_affinity::parse_process_id("1234").unwrap(), 1234);
/// assert!(proc_affinity::parse_process_id("0").is_err());
/// assert!(proc_affinity::parse_process_id("notepad").is_err());
/// ```
pub fn parse_process_id(text: &str) -> Result<ProcessId> {
    let raw = text.trim().parse::<RawId>().map_err(|error| {
        Error::invalid_argument(text, format!("process id must be an integer ({error})"))
    })?;

    validate_process_id(raw)
}

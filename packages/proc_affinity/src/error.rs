use std::io;
use std::path::PathBuf;

use derive_more::Display;
use thiserror::Error;

use crate::ProcessId;

/// Errors that can occur when inspecting or controlling process affinity or when working with
/// stored affinity profiles.
///
/// Every error belongs to exactly one [`ErrorKind`], which tells the caller how to remediate it.
/// Match on [`Error::kind()`] instead of on the message text.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller provided malformed input. Nothing was done; no operating system or storage
    /// interaction took place.
    #[error("invalid argument: '{value}' is invalid: {problem}")]
    InvalidArgument {
        /// The value that was rejected.
        value: String,

        /// A human-readable description of the problem.
        problem: String,
    },

    /// The target process does not exist (any more).
    #[error("process {pid} not found")]
    ProcessNotFound {
        /// The process that could not be found.
        pid: ProcessId,
    },

    /// The current process lacks the privileges required to inspect or modify the target.
    #[error("access denied when trying to {operation} of process {pid}")]
    AccessDenied {
        /// The process that could not be accessed.
        pid: ProcessId,

        /// What we were trying to do.
        operation: AffinityOperation,
    },

    /// Any other operating system failure, e.g. the requested mask is not supported.
    #[error("{context}: {source}")]
    Platform {
        /// What we were trying to do when the failure occurred.
        context: String,

        /// The failure as reported by the operating system.
        #[source]
        source: io::Error,
    },

    /// The operating system could not report how many processors are present.
    #[error("processor topology unavailable: {problem}")]
    TopologyUnavailable {
        /// A human-readable description of the problem.
        problem: String,

        /// The underlying failure, if there was one.
        #[source]
        source: Option<io::Error>,
    },

    /// No stored profile exists with the given name.
    #[error("profile '{name}' not found at {}", path.display())]
    ProfileNotFound {
        /// Name of the requested profile.
        name: String,

        /// Where the profile was expected to be stored.
        path: PathBuf,
    },

    /// A stored profile exists but its content could not be interpreted.
    #[error("profile '{name}' at {} is corrupt: {detail}", path.display())]
    CorruptProfile {
        /// Name of the profile.
        name: String,

        /// Where the profile is stored.
        path: PathBuf,

        /// Description of the offending content, to aid manual recovery.
        detail: String,
    },

    /// Reading or writing profile storage failed.
    #[error("I/O failure on profile '{name}' at {}: {source}", path.display())]
    IoFailure {
        /// Name of the profile.
        name: String,

        /// The storage location involved.
        path: PathBuf,

        /// The underlying failure.
        #[source]
        source: io::Error,
    },
}

/// The category of an [`Error`]. Each category has a different remediation story.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Malformed input. Fix the input and try again.
    #[display("invalid argument")]
    InvalidArgument,

    /// The process is gone. Refresh the process list.
    #[display("process not found")]
    ProcessNotFound,

    /// Insufficient privilege. Re-run with elevated privileges.
    #[display("access denied")]
    AccessDenied,

    /// Some other operating system failure.
    #[display("platform error")]
    PlatformError,

    /// Processor counts could not be determined.
    #[display("topology unavailable")]
    TopologyUnavailable,

    /// The named profile does not exist.
    #[display("profile not found")]
    ProfileNotFound,

    /// The named profile exists but cannot be parsed.
    #[display("corrupt profile")]
    CorruptProfile,

    /// Profile storage could not be read or written.
    #[display("I/O failure")]
    IoFailure,
}

/// The affinity operation that was being attempted when an error occurred.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[expect(
    clippy::exhaustive_enums,
    reason = "affinity is either read or written, there is nothing else to do with it"
)]
pub enum AffinityOperation {
    /// Reading the affinity mask of a process.
    #[display("read the affinity")]
    Read,

    /// Replacing the affinity mask of a process.
    #[display("set the affinity")]
    Write,
}

impl Error {
    /// The category this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::ProcessNotFound { .. } => ErrorKind::ProcessNotFound,
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::Platform { .. } => ErrorKind::PlatformError,
            Self::TopologyUnavailable { .. } => ErrorKind::TopologyUnavailable,
            Self::ProfileNotFound { .. } => ErrorKind::ProfileNotFound,
            Self::CorruptProfile { .. } => ErrorKind::CorruptProfile,
            Self::IoFailure { .. } => ErrorKind::IoFailure,
        }
    }

    /// A short hint telling a human what to do about the error, if there is a specific action
    /// that is likely to help.
    #[must_use]
    pub fn remediation(&self) -> Option<&'static str> {
        match self.kind() {
            ErrorKind::AccessDenied => {
                Some("re-run with elevated privileges (administrator or root)")
            }
            ErrorKind::ProcessNotFound => {
                Some("the process has exited; refresh the process list and select a live one")
            }
            ErrorKind::InvalidArgument => Some("correct the input and try again"),
            ErrorKind::TopologyUnavailable => {
                Some("processor information is not exposed by this system; affinity control is disabled")
            }
            _ => None,
        }
    }

    pub(crate) fn invalid_argument(value: impl Into<String>, problem: impl Into<String>) -> Self {
        Self::InvalidArgument {
            value: value.into(),
            problem: problem.into(),
        }
    }

    pub(crate) fn platform(context: impl Into<String>, source: io::Error) -> Self {
        Self::Platform {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn topology_unavailable(
        problem: impl Into<String>,
        source: Option<io::Error>,
    ) -> Self {
        Self::TopologyUnavailable {
            problem: problem.into(),
            source,
        }
    }
}

/// A specialized `Result` type for affinity operations, returning the crate's [`Error`] type as
/// the error value.
pub type Result<T> = std::result::Result<T, Error>;

// Public API types for affinity_ctl.
//
// These types are used by main.rs and exposed via the crate's public API.

use std::io;
use std::path::PathBuf;

use proc_affinity::ErrorKind;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Input parameters for the `run` function.
///
/// This is the parsed command line merged with the configuration file.
#[doc(hidden)]
#[derive(Debug)]
#[expect(
    clippy::exhaustive_structs,
    reason = "This is a hidden struct for internal/test use only"
)]
pub struct RunInput {
    /// Directory holding the `<name>.json` profiles.
    pub profile_dir: PathBuf,

    /// What to do.
    pub command: Command,
}

/// The operation requested on the command line.
#[doc(hidden)]
#[derive(Clone, Debug, Eq, PartialEq)]
#[expect(
    clippy::exhaustive_enums,
    reason = "This is a hidden enum for internal/test use only"
)]
pub enum Command {
    /// Print the processor topology report.
    Topology,

    /// List running processes.
    Processes {
        /// Only processes whose name contains this text, ignoring case.
        filter: Option<String>,
    },

    /// Print the affinity of a process.
    Get {
        /// Process ID as typed by the user.
        pid: String,
    },

    /// Set the affinity of a process, optionally adding the assignment to a profile.
    Set {
        /// Process ID as typed by the user.
        pid: String,

        /// Cores in core list notation, e.g. `0-3,8`.
        cores: String,

        /// Profile to add the assignment to.
        save_as: Option<String>,
    },

    /// Print the assignments of a stored profile without applying them.
    Show {
        /// Profile name.
        name: String,
    },

    /// Load a stored profile and apply it.
    Apply {
        /// Profile name.
        name: String,
    },

    /// List the stored profiles.
    Profiles,

    /// Run an interactive session reading commands from standard input.
    Shell,
}

/// The outcome of a successful run.
#[doc(hidden)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[expect(
    clippy::exhaustive_enums,
    reason = "This is a hidden enum for internal/test use only"
)]
pub enum RunOutcome {
    /// Everything that was requested took effect.
    Completed,

    /// A profile was applied but some of its assignments did not take effect.
    PartiallyApplied {
        /// How many assignments failed.
        failed: usize,
    },
}

/// Errors that can end a run.
#[doc(hidden)]
#[derive(Debug, Error)]
#[expect(
    clippy::exhaustive_enums,
    reason = "This is a hidden enum for internal/test use only"
)]
pub enum RunError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file {}: {source}", path.display())]
    ConfigRead {
        /// The configuration file.
        path: PathBuf,

        /// The underlying failure.
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid.
    #[error("invalid configuration file {}: {source}", path.display())]
    ConfigParse {
        /// The configuration file.
        path: PathBuf,

        /// What is wrong with it.
        #[source]
        source: TomlError,
    },

    /// An affinity or profile operation failed.
    #[error(transparent)]
    Affinity(#[from] proc_affinity::Error),

    /// Affinity control was requested but the processor topology could not be determined.
    #[error("affinity control is disabled: {reason}")]
    ControlsDisabled {
        /// Why the topology is unavailable.
        reason: String,
    },

    /// A command needs a process but none was named or selected.
    #[error("no process selected")]
    NoProcessSelected,

    /// Reading input or writing output failed.
    #[error("failed to read input or write output: {0}")]
    Output(#[from] io::Error),
}

impl RunError {
    /// The kind of the underlying affinity error, if this is one.
    #[must_use]
    pub fn affinity_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Affinity(error) => Some(error.kind()),
            Self::ControlsDisabled { .. } => Some(ErrorKind::TopologyUnavailable),
            _ => None,
        }
    }

    /// A hint telling the user what to do about the error, if there is one.
    #[must_use]
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::Affinity(error) => error.remediation(),
            Self::ControlsDisabled { .. } => Some(
                "processor information is not exposed by this system; only profiles can be inspected",
            ),
            Self::NoProcessSelected => {
                Some("select a process with 'select <pid>' or name one explicitly")
            }
            Self::ConfigParse { .. } => Some(
                "the configuration file accepts only the keys `profile_dir` and `log_filter`",
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn affinity_errors_keep_kind_and_hint() {
        let error = RunError::from(proc_affinity::Error::ProcessNotFound { pid: 4 });

        assert_eq!(error.affinity_kind(), Some(ErrorKind::ProcessNotFound));
        assert!(error.remediation().is_some());
        assert_eq!(error.to_string(), "process 4 not found");
    }

    #[test]
    fn output_errors_have_no_kind() {
        let error = RunError::from(io::Error::other("pipe closed"));

        assert_eq!(error.affinity_kind(), None);
        assert_eq!(error.remediation(), None);
    }
}

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::RunError;

/// Name of the configuration file looked up in the working directory when no file is given
/// on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "affinity_ctl.toml";

/// Settings read from the TOML configuration file. Command line options take precedence.
///
/// ```toml
/// profile_dir = "/var/lib/affinity_ctl"
/// log_filter = "proc_affinity=debug"
/// ```
#[doc(hidden)]
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
#[expect(
    clippy::exhaustive_structs,
    reason = "This is a hidden struct for internal/test use only"
)]
pub struct Config {
    /// Directory holding the profiles.
    pub profile_dir: Option<PathBuf>,

    /// Logging filter directives, used when `RUST_LOG` is not set.
    pub log_filter: Option<String>,
}

impl Config {
    /// Loads the configuration.
    ///
    /// An explicitly named file must exist. Without one, `affinity_ctl.toml` in the working
    /// directory is used if present and the defaults apply otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid configuration.
    pub fn load(explicit: Option<&Path>) -> Result<Self, RunError> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        match fs::read_to_string(&path) {
            Ok(text) => Self::parse(&text, &path),
            Err(error) if error.kind() == io::ErrorKind::NotFound && !required => {
                Ok(Self::default())
            }
            Err(source) => Err(RunError::ConfigRead { path, source }),
        }
    }

    /// Parses configuration file content. The path is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or contains unknown keys.
    pub fn parse(text: &str, path: &Path) -> Result<Self, RunError> {
        toml::from_str(text).map_err(|source| RunError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

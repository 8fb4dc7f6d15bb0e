use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::io::{self, ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::{Assignments, Error, Result};

const PROFILE_EXTENSION: &str = "json";

/// Durable storage of named affinity profiles, one JSON file per profile in a directory.
///
/// A profile file holds an object mapping process IDs (as strings) to arrays of logical core
/// IDs, e.g. `{"1234": [0, 1, 2, 3], "5678": [4, 5]}`.
///
/// Saving replaces any existing profile of the same name. Every save writes its own uniquely named
/// temporary file in the store directory and then renames it into place, so readers never observe
/// a partially written profile and concurrent writers (including other stores and processes on
/// the same directory) resolve to last-writer-wins. Operations on the same name are serialized
/// within one store; operations on different names do not wait for each other.
///
/// Profile names must be non-empty and cannot contain path separators, so a profile never
/// escapes the store directory.
#[derive(Debug)]
pub struct ProfileStore {
    directory: PathBuf,
    name_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ProfileStore {
    /// Creates a store that keeps its profiles in the given directory.
    ///
    /// The directory does not need to exist yet; it is created on the first save.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            name_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The directory the profiles are stored in.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The file that holds (or would hold) the named profile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the name is not a valid profile name.
    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;

        Ok(self.directory.join(format!("{name}.{PROFILE_EXTENSION}")))
    }

    /// Stores the assignments under the given name, replacing any existing profile.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidArgument`] if the name is not a valid profile name.
    /// * [`Error::IoFailure`] if the profile cannot be written.
    pub fn save(&self, name: &str, assignments: &Assignments) -> Result<()> {
        let path = self.path_of(name)?;
        let io_failure = |source: io::Error| Error::IoFailure {
            name: name.to_string(),
            path: path.clone(),
            source,
        };

        let contents = to_pretty_json(assignments).map_err(io_failure)?;

        self.with_name_lock(name, || -> Result<()> {
            fs::create_dir_all(&self.directory).map_err(io_failure)?;

            // Dropping the temporary file on any failure path removes it.
            let mut temp_file = NamedTempFile::new_in(&self.directory).map_err(io_failure)?;

            debug!(path = %temp_file.path().display(), "writing profile");
            temp_file.write_all(&contents).map_err(io_failure)?;

            temp_file
                .persist(&path)
                .map_err(|persist_error| io_failure(persist_error.error))?;

            Ok(())
        })?;

        info!(name, path = %path.display(), entries = assignments.len(), "profile saved");

        Ok(())
    }

    /// Reads the named profile.
    ///
    /// This only reads storage. It does not touch any process or the assignment registry.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidArgument`] if the name is not a valid profile name.
    /// * [`Error::ProfileNotFound`] if there is no profile with that name.
    /// * [`Error::CorruptProfile`] if the stored data is not a valid profile.
    /// * [`Error::IoFailure`] if the profile cannot be read for any other reason.
    pub fn load(&self, name: &str) -> Result<Assignments> {
        let path = self.path_of(name)?;

        let contents = self.with_name_lock(name, || fs::read_to_string(&path));

        let contents = contents.map_err(|error| match error.kind() {
            IoErrorKind::NotFound => Error::ProfileNotFound {
                name: name.to_string(),
                path: path.clone(),
            },
            IoErrorKind::InvalidData => Error::CorruptProfile {
                name: name.to_string(),
                path: path.clone(),
                detail: format!("content is not valid UTF-8 text ({error})"),
            },
            _ => Error::IoFailure {
                name: name.to_string(),
                path: path.clone(),
                source: error,
            },
        })?;

        let assignments = parse_profile(&contents).map_err(|detail| Error::CorruptProfile {
            name: name.to_string(),
            path: path.clone(),
            detail,
        })?;

        info!(name, path = %path.display(), entries = assignments.len(), "profile loaded");

        Ok(assignments)
    }

    /// The names of the stored profiles, in ascending order.
    ///
    /// A store whose directory does not exist yet has no profiles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IoFailure`] if the directory cannot be listed.
    pub fn list(&self) -> Result<Vec<String>> {
        let io_failure = |source: io::Error| Error::IoFailure {
            name: "*".to_string(),
            path: self.directory.clone(),
            source,
        };

        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(error) if error.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(io_failure(error)),
        };

        let mut names = Vec::new();

        for entry in entries {
            let path = entry.map_err(io_failure)?.path();

            if path.extension() != Some(OsStr::new(PROFILE_EXTENSION)) || !path.is_file() {
                continue;
            }

            if let Some(name) = path.file_stem().and_then(OsStr::to_str)
                && validate_name(name).is_ok()
            {
                names.push(name.to_string());
            }
        }

        names.sort();

        Ok(names)
    }

    /// Runs `f` while holding the lock of the named profile.
    ///
    /// The lock only lives in the map while someone uses it, so the map holds no more entries
    /// than there are concurrent operations.
    fn with_name_lock<R>(&self, name: &str, f: impl FnOnce() -> R) -> R {
        let name_lock = Arc::clone(self.name_locks().entry(name.to_string()).or_default());

        let result = {
            let _guard = name_lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        drop(name_lock);

        let mut locks = self.name_locks();
        if locks
            .get(name)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(name);
        }

        result
    }

    fn name_locks(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        self.name_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate_name(name: &str) -> Result<()> {
    let problem = if name.is_empty() {
        "profile name must not be empty"
    } else if name == "." || name == ".." {
        "profile name must not be a relative directory reference"
    } else if name.contains(['/', '\\', '\0']) {
        "profile name must not contain path separators or NUL characters"
    } else {
        return Ok(());
    };

    Err(Error::invalid_argument(name, problem))
}

fn to_pretty_json(assignments: &Assignments) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));

    assignments.serialize(&mut serializer).map_err(io::Error::other)?;
    buffer.push(b'\n');

    Ok(buffer)
}

/// Parses profile JSON, describing the problem in a human-readable way if it is not a valid
/// profile.
fn parse_profile(contents: &str) -> std::result::Result<Assignments, String> {
    let assignments = serde_json::from_str::<Assignments>(contents).map_err(|error| {
        format!(
            "expected an object mapping positive process ids to non-empty arrays of non-negative core ids ({error})"
        )
    })?;

    if assignments.contains_key(&0) {
        return Err("process id 0 is not a valid process id".to_string());
    }

    Ok(assignments)
}

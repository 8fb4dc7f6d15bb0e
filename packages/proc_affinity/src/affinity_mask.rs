use std::collections::BTreeSet;
use std::fmt::{self, Display};

use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};

use crate::primitive_types::validate_core_id;
use crate::{Error, LogicalCoreId, RawId, Result, core_list};

/// The set of logical cores that a process is permitted to execute on.
///
/// A mask is never empty. The order in which cores were specified is preserved (for stable
/// display and diffs of stored profiles) but is not semantically significant; use
/// [`same_cores_as()`][Self::same_cores_as] to compare masks as sets. Duplicate core IDs are
/// collapsed, keeping the first occurrence.
///
/// A mask does not know which cores exist on the current system. Whether every core in it is
/// present is for the operating system to decide when the mask is applied; see
/// [`Topology::unknown_cores()`][crate::Topology::unknown_cores] to check ahead of time.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LogicalCoreId>", into = "Vec<LogicalCoreId>")]
pub struct AffinityMask {
    cores: NonEmpty<LogicalCoreId>,
}

impl AffinityMask {
    /// Creates a mask from a sequence of core IDs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the sequence is empty.
    pub fn new(cores: impl IntoIterator<Item = LogicalCoreId>) -> Result<Self> {
        let mut seen = BTreeSet::new();

        let unique = cores
            .into_iter()
            .filter(|core| seen.insert(*core))
            .collect::<Vec<_>>();

        NonEmpty::from_vec(unique)
            .map(|cores| Self { cores })
            .ok_or_else(|| {
                Error::invalid_argument("[]", "an affinity mask must contain at least one core")
            })
    }

    /// Creates a mask from core IDs exactly as supplied by a caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the sequence is empty or any element is negative
    /// or otherwise not a valid core ID.
    pub fn from_raw(cores: &[RawId]) -> Result<Self> {
        let cores = cores
            .iter()
            .map(|raw| validate_core_id(*raw))
            .collect::<Result<Vec<_>>>()?;

        Self::new(cores)
    }

    /// A mask containing only the given core.
    #[must_use]
    pub fn single(core: LogicalCoreId) -> Self {
        Self {
            cores: NonEmpty::new(core),
        }
    }

    /// The core IDs in the mask, in the order they were specified.
    pub fn iter(&self) -> impl Iterator<Item = LogicalCoreId> + '_ {
        self.cores.iter().copied()
    }

    /// The number of cores in the mask. Always at least 1.
    #[must_use]
    pub fn core_count(&self) -> usize {
        self.cores.len()
    }

    /// Whether the mask permits execution on the given core.
    #[must_use]
    pub fn contains(&self, core: LogicalCoreId) -> bool {
        self.cores.contains(&core)
    }

    /// The highest core ID in the mask.
    #[must_use]
    pub fn max_core(&self) -> LogicalCoreId {
        *self.cores.maximum()
    }

    /// Whether both masks permit exactly the same cores, regardless of order.
    #[must_use]
    pub fn same_cores_as(&self, other: &Self) -> bool {
        self.iter().collect::<BTreeSet<_>>() == other.iter().collect::<BTreeSet<_>>()
    }

    /// The core IDs in the mask as a vector, in the order they were specified.
    #[must_use]
    pub fn to_vec(&self) -> Vec<LogicalCoreId> {
        self.iter().collect()
    }
}

impl TryFrom<Vec<LogicalCoreId>> for AffinityMask {
    type Error = Error;

    fn try_from(cores: Vec<LogicalCoreId>) -> Result<Self> {
        Self::new(cores)
    }
}

impl From<AffinityMask> for Vec<LogicalCoreId> {
    fn from(mask: AffinityMask) -> Self {
        mask.cores.into()
    }
}

impl Display for AffinityMask {
    /// Formats the mask in core list notation, e.g. `0-3,8`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&core_list::emit(self.iter()))
    }
}

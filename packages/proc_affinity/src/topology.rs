use std::fmt::{self, Display};

use itertools::Itertools;
use tracing::debug;

use crate::pal::{Platform, PlatformFacade, ProcessorCounts};
use crate::{AffinityMask, Error, LogicalCoreId, Result};

/// The processors of the system, as reported by the operating system when queried.
///
/// Logical core IDs are dense and zero-based: a system with `n` logical processors has the core
/// IDs `0..n`. The topology is a snapshot; it is typically read once at startup and used to
/// bound the valid core ID space for the rest of the session.
///
/// The `Display` implementation renders a human-readable report of the topology.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Topology {
    logical_count: usize,
    physical_count: usize,
    core_ids: Vec<LogicalCoreId>,
}

impl Topology {
    pub(crate) fn from_counts(counts: ProcessorCounts) -> Result<Self> {
        if counts.logical == 0 || counts.physical == 0 {
            return Err(Error::topology_unavailable(
                format!(
                    "the operating system reported {} logical and {} physical processors",
                    counts.logical, counts.physical
                ),
                None,
            ));
        }

        let max_core_id = LogicalCoreId::try_from(counts.logical).map_err(|error| {
            Error::topology_unavailable(
                format!(
                    "{} logical processors is more than can be addressed ({error})",
                    counts.logical
                ),
                None,
            )
        })?;

        Ok(Self {
            logical_count: counts.logical,
            physical_count: counts.physical,
            core_ids: (0..max_core_id).collect(),
        })
    }

    /// Number of logical processors (schedulable units).
    #[must_use]
    pub fn logical_count(&self) -> usize {
        self.logical_count
    }

    /// Number of physical processor cores.
    #[must_use]
    pub fn physical_count(&self) -> usize {
        self.physical_count
    }

    /// The logical core IDs of the system in ascending order, without gaps.
    #[must_use]
    pub fn core_ids(&self) -> &[LogicalCoreId] {
        &self.core_ids
    }

    /// Whether simultaneous multithreading (hyperthreading) is likely enabled, i.e. there are
    /// more logical processors than physical cores.
    #[must_use]
    pub fn hyperthreading_likely(&self) -> bool {
        self.logical_count > self.physical_count
    }

    /// Whether the core ID belongs to this topology.
    #[must_use]
    pub fn contains(&self, core: LogicalCoreId) -> bool {
        self.core_ids.binary_search(&core).is_ok()
    }

    /// The cores of the mask that do not exist in this topology, in mask order.
    ///
    /// A mask with unknown cores is not necessarily rejected by the operating system (the
    /// topology may be stale) but it is worth revalidating.
    #[must_use]
    pub fn unknown_cores(&self, mask: &AffinityMask) -> Vec<LogicalCoreId> {
        mask.iter().filter(|core| !self.contains(*core)).collect()
    }
}

impl Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of logical cores: {}", self.logical_count)?;
        writeln!(f, "Number of physical cores: {}", self.physical_count)?;

        if self.hyperthreading_likely() {
            writeln!(f, "Hyperthreading: enabled (likely)")?;
            writeln!(
                f,
                "Note: distinguishing P-cores and E-cores requires manual identification."
            )?;
            writeln!(
                f,
                "Please refer to your CPU documentation to determine the mapping of logical cores to physical and/or P/E cores."
            )?;
        } else {
            writeln!(f, "Hyperthreading: disabled or not supported")?;
            writeln!(
                f,
                "Note: distinguishing P-cores and E-cores requires manual identification."
            )?;
            writeln!(f, "Please refer to your CPU documentation.")?;
        }

        write!(f, "Logical core IDs: {}", self.core_ids.iter().join(" "))
    }
}

/// Queries the processor topology of the system.
#[derive(Clone, Debug, Default)]
pub struct TopologyReader {
    platform: PlatformFacade,
}

impl TopologyReader {
    /// Creates a reader that queries the operating system.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn with_platform(platform: PlatformFacade) -> Self {
        Self { platform }
    }

    /// Queries the number of logical and physical processors.
    ///
    /// This has no side effects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TopologyUnavailable`] if the operating system cannot report the
    /// processor counts. Callers should then treat the core ID space as empty and refrain from
    /// affinity control.
    pub fn topology(&self) -> Result<Topology> {
        let counts = self.platform.processor_counts()?;

        debug!(
            logical = counts.logical,
            physical = counts.physical,
            "processor topology"
        );

        Topology::from_counts(counts)
    }
}

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Inspect and control which processors a running process may execute on, and keep named
//! profiles of such assignments so they can be reapplied later.
//!
//! # Operations
//!
//! * [`TopologyReader::topology()`] reports the number of logical and physical processors and
//!   the logical core IDs that can be used in an affinity mask.
//! * [`AffinityAccessor::get_affinity()`] and [`AffinityAccessor::set_affinity()`] read and
//!   replace the [`AffinityMask`] of a process.
//! * [`ProfileStore::save()`] and [`ProfileStore::load()`] persist named [`Assignments`].
//! * [`apply_profile()`] applies assignments one process at a time and reports the result for
//!   each process in an [`ApplyReport`].
//! * [`ProcessLister::processes()`] lists the running processes.
//!
//! A [`Session`] ties these together with an [`AssignmentRegistry`] that remembers every mask
//! that was successfully applied, which is what gets saved as a profile.
//!
//! # Example
//!
//! ```no_run
//! use proc_affinity::{ProfileStore, Session, TopologyReader};
//!
//! let topology = TopologyReader::new().topology()?;
//! println!("{topology}");
//!
//! let session = Session::new(ProfileStore::new(".")).with_topology(topology);
//!
//! // Restrict process 1234 to the first two logical cores.
//! let mask = session.set_affinity(1234, &[0, 1])?;
//! println!("process 1234 now runs on cores {mask}");
//!
//! session.save_profile("two_cores")?;
//! # Ok::<(), proc_affinity::Error>(())
//! ```
//!
//! # Errors
//!
//! Every failure is an [`Error`] with an [`ErrorKind`] that tells what to do about it. Invalid
//! input is always rejected before the operating system is called. Access to processes of other
//! users usually requires elevated privileges, see [`AffinityAccessor::is_elevated()`].
//!
//! # Platform support
//!
//! Linux and Windows are supported. On Windows, an affinity mask can only address the
//! processors of one processor group (up to 64). On other platforms the topology is estimated
//! and all affinity operations fail with a platform error.

mod accessor;
mod affinity_mask;
mod apply;
mod error;
mod pal;
mod primitive_types;
mod processes;
mod profile_store;
mod registry;
mod session;
mod topology;

pub mod core_list;

pub use accessor::*;
pub use affinity_mask::*;
pub use apply::{ApplyOutcome, ApplyReport, apply_profile};
pub use error::*;
pub use primitive_types::{LogicalCoreId, ProcessId, RawId, parse_process_id};
pub use processes::*;
pub use profile_store::*;
pub use registry::*;
pub use session::*;
pub use topology::*;

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A command line tool to inspect and control which processors running processes may execute
//! on, and to save, show and reapply named affinity profiles.
//!
//! This crate provides the core logic of the tool, exposed via the [`run`] function.
//! The binary entry point is in `main.rs`.

mod commands;
mod config;
mod logging;
mod shell;
mod types;

use std::io::{BufRead, Write};

use commands::{
    write_affinity, write_assignments, write_processes, write_profiles, write_report,
    write_topology,
};
pub use config::*;
pub use logging::init_logging;
use proc_affinity::{
    AffinityAccessor, AffinityMask, Assignments, ErrorKind, ProcessLister, ProfileStore, Session,
    TopologyReader, core_list, parse_process_id,
};
use shell::run_shell;
use tracing::warn;
pub use types::*;

/// Core logic of the tool, extracted for testability.
///
/// Results go to `out`. Only the interactive shell reads from `stdin`.
#[doc(hidden)]
pub fn run(
    input: &RunInput,
    stdin: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<RunOutcome, RunError> {
    let store = ProfileStore::new(&input.profile_dir);

    if matches!(
        input.command,
        Command::Set { .. } | Command::Apply { .. } | Command::Shell
    ) {
        warn_if_not_elevated();
    }

    match &input.command {
        Command::Topology => {
            write_topology(out, &TopologyReader::new().topology()?)?;
        }
        Command::Processes { filter } => {
            let processes = ProcessLister::new().processes()?;
            write_processes(out, &processes, filter.as_deref())?;
        }
        Command::Get { pid } => {
            let pid = parse_process_id(pid)?;
            let mask = AffinityAccessor::new().get_affinity(pid.into())?;
            write_affinity(out, pid, &mask)?;
        }
        Command::Set {
            pid,
            cores,
            save_as,
        } => set(store, pid, cores, save_as.as_deref(), out)?,
        Command::Show { name } => {
            write_assignments(out, &store.load(name)?)?;
        }
        Command::Apply { name } => return apply(store, name, out),
        Command::Profiles => {
            write_profiles(out, &store.list()?)?;
        }
        Command::Shell => {
            let (session, topology_problem) = match TopologyReader::new().topology() {
                Ok(topology) => (Session::new(store).with_topology(topology), None),
                Err(error) => (Session::new(store), Some(error.to_string())),
            };

            run_shell(&session, topology_problem, stdin, out)?;
        }
    }

    Ok(RunOutcome::Completed)
}

/// Parses cores given in core list notation (e.g. `0-3,8`) into a mask.
pub(crate) fn parse_mask(cores: &str) -> proc_affinity::Result<AffinityMask> {
    AffinityMask::new(core_list::parse(cores)?)
}

fn set(
    store: ProfileStore,
    pid: &str,
    cores: &str,
    save_as: Option<&str>,
    out: &mut impl Write,
) -> Result<(), RunError> {
    let pid = parse_process_id(pid)?;
    let mask = parse_mask(cores)?;

    // The profile accumulates assignments over several invocations. It is read before the
    // affinity is changed, so a bad name or a corrupt profile leaves the process alone.
    let profile = match save_as {
        Some(name) => Some(match store.load(name) {
            Ok(profile) => (name, profile),
            Err(error) if error.kind() == ErrorKind::ProfileNotFound => (name, Assignments::new()),
            Err(error) => return Err(error.into()),
        }),
        None => None,
    };

    let session = Session::new(store).with_topology(TopologyReader::new().topology()?);
    let mask = session.set_mask(pid, mask)?;
    write_affinity(out, pid, &mask)?;

    let Some((name, mut profile)) = profile else {
        return Ok(());
    };

    profile.insert(pid, mask);
    session.store().save(name, &profile)?;

    writeln!(
        out,
        "saved {} assignments to {}",
        profile.len(),
        session.store().path_of(name)?.display()
    )?;

    Ok(())
}

fn apply(store: ProfileStore, name: &str, out: &mut impl Write) -> Result<RunOutcome, RunError> {
    let session = Session::new(store).with_topology(TopologyReader::new().topology()?);

    let report = session.load_and_apply_profile(name)?;
    write_report(out, &report)?;

    let failed = report.failed().count();

    Ok(if failed == 0 {
        RunOutcome::Completed
    } else {
        RunOutcome::PartiallyApplied { failed }
    })
}

fn warn_if_not_elevated() {
    if !AffinityAccessor::new().is_elevated() {
        warn!(
            "not running with elevated privileges; changing the affinity of processes owned by other users will fail"
        );
    }
}

//! Text rendering of the results of affinity operations.

use std::io::{self, Write};

use proc_affinity::{
    AffinityMask, ApplyReport, Assignments, Error, ProcessId, ProcessInfo, Topology,
};

use crate::RunError;

pub(crate) fn write_topology(out: &mut impl Write, topology: &Topology) -> io::Result<()> {
    writeln!(out, "{topology}")
}

/// Lists processes whose name contains the filter, ignoring case.
pub(crate) fn write_processes(
    out: &mut impl Write,
    processes: &[ProcessInfo],
    filter: Option<&str>,
) -> io::Result<()> {
    let filter = filter.map(str::to_lowercase);

    let matching = processes.iter().filter(|process| {
        filter
            .as_deref()
            .is_none_or(|filter| process.name().to_lowercase().contains(filter))
    });

    writeln!(out, "{:>8}  NAME", "PID")?;

    for process in matching {
        writeln!(out, "{:>8}  {}", process.pid(), process.name())?;
    }

    Ok(())
}

pub(crate) fn write_affinity(
    out: &mut impl Write,
    pid: ProcessId,
    mask: &AffinityMask,
) -> io::Result<()> {
    writeln!(
        out,
        "process {pid}: cores {mask} ({} of them)",
        mask.core_count()
    )
}

pub(crate) fn write_assignments(out: &mut impl Write, assignments: &Assignments) -> io::Result<()> {
    if assignments.is_empty() {
        return writeln!(out, "no assignments");
    }

    for (pid, mask) in assignments {
        writeln!(out, "process {pid}: cores {mask}")?;
    }

    Ok(())
}

pub(crate) fn write_report(out: &mut impl Write, report: &ApplyReport) -> io::Result<()> {
    for outcome in report.outcomes() {
        writeln!(out, "{outcome}")?;

        if let Some(hint) = outcome.error().and_then(Error::remediation) {
            writeln!(out, "  hint: {hint}")?;
        }
    }

    writeln!(
        out,
        "applied {} of {} assignments",
        report.succeeded().count(),
        report.len()
    )
}

pub(crate) fn write_profiles(out: &mut impl Write, names: &[String]) -> io::Result<()> {
    if names.is_empty() {
        return writeln!(out, "no profiles");
    }

    for name in names {
        writeln!(out, "{name}")?;
    }

    Ok(())
}

/// Reports a failed operation together with what to do about it.
pub(crate) fn write_error(out: &mut impl Write, error: &RunError) -> io::Result<()> {
    writeln!(out, "error: {error}")?;

    if let Some(hint) = error.remediation() {
        writeln!(out, "hint: {hint}")?;
    }

    Ok(())
}

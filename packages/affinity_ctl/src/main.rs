#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Binary entry point for the affinity_ctl tool.
//!
//! This module is excluded from mutation testing because testing process entry/exit behavior
//! is impractical - it requires spawning subprocesses and checking exit codes.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use affinity_ctl::{Command, Config, RunError, RunInput, RunOutcome, init_logging, run};
use argh::FromArgs;

/// Exit code when a profile was applied only in part.
const EXIT_PARTIALLY_APPLIED: u8 = 2;

/// Inspect and control the processor affinity of running processes and manage named affinity
/// profiles. Without a subcommand, starts an interactive session.
#[derive(FromArgs)]
struct Args {
    /// configuration file (default: affinity_ctl.toml in the working directory, if present)
    #[argh(option)]
    config: Option<PathBuf>,

    /// directory holding the profiles (default: the working directory)
    #[argh(option)]
    profile_dir: Option<PathBuf>,

    #[argh(subcommand)]
    command: Option<SubCommand>,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum SubCommand {
    Topology(TopologyArgs),
    Processes(ProcessesArgs),
    Get(GetArgs),
    Set(SetArgs),
    Show(ShowArgs),
    Apply(ApplyArgs),
    Profiles(ProfilesArgs),
    Shell(ShellArgs),
}

/// Show the number of logical and physical processors and the usable core IDs.
#[derive(FromArgs)]
#[argh(subcommand, name = "topology")]
struct TopologyArgs {}

/// List running processes.
#[derive(FromArgs)]
#[argh(subcommand, name = "processes")]
struct ProcessesArgs {
    /// only list processes whose name contains this text, ignoring case
    #[argh(option)]
    filter: Option<String>,
}

/// Show the cores a process may run on.
#[derive(FromArgs)]
#[argh(subcommand, name = "get")]
struct GetArgs {
    /// process ID
    #[argh(positional)]
    pid: String,
}

/// Restrict a process to a set of cores.
#[derive(FromArgs)]
#[argh(subcommand, name = "set")]
struct SetArgs {
    /// process ID
    #[argh(positional)]
    pid: String,

    /// cores in core list notation, e.g. 0-3,8
    #[argh(positional)]
    cores: String,

    /// also add the assignment to this profile
    #[argh(option)]
    save_as: Option<String>,
}

/// Show the assignments of a profile without applying them.
#[derive(FromArgs)]
#[argh(subcommand, name = "show")]
struct ShowArgs {
    /// profile name
    #[argh(positional)]
    name: String,
}

/// Apply a profile. Exits with code 2 if some assignments could not be applied.
#[derive(FromArgs)]
#[argh(subcommand, name = "apply")]
struct ApplyArgs {
    /// profile name
    #[argh(positional)]
    name: String,
}

/// List the saved profiles.
#[derive(FromArgs)]
#[argh(subcommand, name = "profiles")]
struct ProfilesArgs {}

/// Start an interactive session.
#[derive(FromArgs)]
#[argh(subcommand, name = "shell")]
struct ShellArgs {}

fn to_command(command: Option<SubCommand>) -> Command {
    match command {
        Some(SubCommand::Topology(_)) => Command::Topology,
        Some(SubCommand::Processes(args)) => Command::Processes {
            filter: args.filter,
        },
        Some(SubCommand::Get(args)) => Command::Get { pid: args.pid },
        Some(SubCommand::Set(args)) => Command::Set {
            pid: args.pid,
            cores: args.cores,
            save_as: args.save_as,
        },
        Some(SubCommand::Show(args)) => Command::Show { name: args.name },
        Some(SubCommand::Apply(args)) => Command::Apply { name: args.name },
        Some(SubCommand::Profiles(_)) => Command::Profiles,
        Some(SubCommand::Shell(_)) | None => Command::Shell,
    }
}

// Binary entry point - mutations would require subprocess testing which is impractical.
#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    let args: Args = argh::from_env();

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return report_error(&e),
    };

    init_logging(config.log_filter.as_deref());

    let input = RunInput {
        profile_dir: args
            .profile_dir
            .or(config.profile_dir)
            .unwrap_or_else(|| PathBuf::from(".")),
        command: to_command(args.command),
    };

    match run(&input, &mut io::stdin().lock(), &mut io::stdout().lock()) {
        Ok(RunOutcome::Completed) => ExitCode::SUCCESS,
        Ok(RunOutcome::PartiallyApplied { .. }) => ExitCode::from(EXIT_PARTIALLY_APPLIED),
        Err(e) => report_error(&e),
    }
}

fn report_error(error: &RunError) -> ExitCode {
    eprintln!("Error: {error}");

    if let Some(hint) = error.remediation() {
        eprintln!("Hint: {hint}");
    }

    ExitCode::FAILURE
}

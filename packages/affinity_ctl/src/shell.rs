//! Interactive session: one command per line, with a selected process that commands apply to
//! unless another one is named.

use std::io::{BufRead, Write};

use proc_affinity::{ProcessId, ProcessLister, RawId, Session, parse_process_id};

use crate::commands::{
    write_affinity, write_assignments, write_error, write_processes, write_profiles, write_report,
    write_topology,
};
use crate::{RunError, parse_mask};

const HELP: &str = "\
commands:
  topology              show the processor topology
  processes [filter]    list running processes, optionally only matching names
  select <pid>          select a process and show its affinity
  get [pid]             show the affinity of a process
  set [pid] <cores>     restrict a process to cores, e.g. 'set 0-3,8'
  assignments           show the assignments made in this session
  save <name>           save the assignments of this session as a profile
  load <name>           load a profile and apply it
  show <name>           show the assignments of a profile without applying it
  profiles              list the saved profiles
  quit                  leave the session";

#[derive(Clone, Debug, Eq, PartialEq)]
enum ShellCommand {
    Help,
    Topology,
    Processes { filter: Option<String> },
    Select { pid: String },
    Get { pid: Option<String> },
    Set { pid: Option<String>, cores: String },
    Assignments,
    Save { name: String },
    Load { name: String },
    Show { name: String },
    Profiles,
    Quit,
}

/// Parses one input line. Blank lines parse to `None`.
fn parse_line(line: &str) -> Result<Option<ShellCommand>, String> {
    let words = line.split_whitespace().collect::<Vec<_>>();

    let command = match words.as_slice() {
        [] => return Ok(None),
        ["help" | "?"] => ShellCommand::Help,
        ["topology"] => ShellCommand::Topology,
        ["processes"] => ShellCommand::Processes { filter: None },
        ["processes", filter] => ShellCommand::Processes {
            filter: Some((*filter).to_owned()),
        },
        ["select", pid] => ShellCommand::Select {
            pid: (*pid).to_owned(),
        },
        ["get"] => ShellCommand::Get { pid: None },
        ["get", pid] => ShellCommand::Get {
            pid: Some((*pid).to_owned()),
        },
        ["set", cores] => ShellCommand::Set {
            pid: None,
            cores: (*cores).to_owned(),
        },
        ["set", pid, cores] => ShellCommand::Set {
            pid: Some((*pid).to_owned()),
            cores: (*cores).to_owned(),
        },
        ["assignments"] => ShellCommand::Assignments,
        ["save", name] => ShellCommand::Save {
            name: (*name).to_owned(),
        },
        ["load", name] => ShellCommand::Load {
            name: (*name).to_owned(),
        },
        ["show", name] => ShellCommand::Show {
            name: (*name).to_owned(),
        },
        ["profiles"] => ShellCommand::Profiles,
        ["quit" | "exit"] => ShellCommand::Quit,
        [
            command @ ("topology" | "processes" | "select" | "get" | "set" | "assignments" | "save"
            | "load" | "show" | "profiles" | "quit" | "exit"),
            ..,
        ] => return Err(format!("wrong number of arguments for '{command}', type 'help'")),
        [command, ..] => return Err(format!("unknown command '{command}', type 'help'")),
    };

    Ok(Some(command))
}

/// Runs the interactive session until `quit` or the end of the input.
///
/// Failed commands are reported with a hint and the session continues. Only failing to read
/// input or write output ends it with an error.
pub(crate) fn run_shell(
    session: &Session,
    topology_problem: Option<String>,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<(), RunError> {
    let mut shell = Shell {
        session,
        topology_problem,
        selected: None,
    };

    if let Some(problem) = &shell.topology_problem {
        write_error(
            out,
            &RunError::ControlsDisabled {
                reason: problem.clone(),
            },
        )?;
    }

    writeln!(out, "type 'help' for a list of commands")?;

    let mut line = String::new();

    loop {
        write!(out, "> ")?;
        out.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            return Ok(());
        }

        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(ShellCommand::Quit)) => return Ok(()),
            Ok(Some(command)) => match shell.execute(command, out) {
                Ok(()) => {}
                Err(RunError::Output(error)) => return Err(RunError::Output(error)),
                Err(error) => write_error(out, &error)?,
            },
            Err(problem) => writeln!(out, "error: {problem}")?,
        }
    }
}

struct Shell<'a> {
    session: &'a Session,
    topology_problem: Option<String>,
    selected: Option<ProcessId>,
}

impl Shell<'_> {
    fn execute(&mut self, command: ShellCommand, out: &mut impl Write) -> Result<(), RunError> {
        match command {
            ShellCommand::Help => writeln!(out, "{HELP}")?,
            ShellCommand::Topology => {
                self.require_controls()?;

                if let Some(topology) = self.session.topology() {
                    write_topology(out, topology)?;
                }
            }
            ShellCommand::Processes { filter } => {
                let processes = ProcessLister::new().processes()?;
                write_processes(out, &processes, filter.as_deref())?;
            }
            ShellCommand::Select { pid } => {
                let pid = parse_process_id(&pid)?;
                let mask = self.session.get_affinity(RawId::from(pid))?;

                self.selected = Some(pid);
                write_affinity(out, pid, &mask)?;
            }
            ShellCommand::Get { pid } => {
                let pid = self.target(pid.as_deref())?;
                let mask = self.session.get_affinity(RawId::from(pid))?;

                write_affinity(out, pid, &mask)?;
            }
            ShellCommand::Set { pid, cores } => {
                self.require_controls()?;

                let pid = self.target(pid.as_deref())?;
                let mask = self.session.set_mask(pid, parse_mask(&cores)?)?;

                write_affinity(out, pid, &mask)?;
            }
            ShellCommand::Assignments => {
                write_assignments(out, &self.session.registry().snapshot())?;
            }
            ShellCommand::Save { name } => {
                self.session.save_profile(&name)?;

                writeln!(
                    out,
                    "saved {} assignments to {}",
                    self.session.registry().len(),
                    self.session.store().path_of(&name)?.display()
                )?;
            }
            ShellCommand::Load { name } => {
                self.require_controls()?;

                let report = self.session.load_and_apply_profile(&name)?;
                write_report(out, &report)?;

                self.refresh_selected(out)?;
            }
            ShellCommand::Show { name } => {
                write_assignments(out, &self.session.load_profile(&name)?)?;
            }
            ShellCommand::Profiles => {
                write_profiles(out, &self.session.store().list()?)?;
            }
            ShellCommand::Quit => {}
        }

        Ok(())
    }

    fn require_controls(&self) -> Result<(), RunError> {
        match &self.topology_problem {
            Some(problem) => Err(RunError::ControlsDisabled {
                reason: problem.clone(),
            }),
            None => Ok(()),
        }
    }

    /// The named process if there is one, otherwise the selected one.
    fn target(&self, pid: Option<&str>) -> Result<ProcessId, RunError> {
        match pid {
            Some(pid) => Ok(parse_process_id(pid)?),
            None => self.selected.ok_or(RunError::NoProcessSelected),
        }
    }

    /// Shows the current affinity of the selected process, which a loaded profile may have
    /// changed.
    fn refresh_selected(&self, out: &mut impl Write) -> Result<(), RunError> {
        let Some(pid) = self.selected else {
            return Ok(());
        };

        match self.session.get_affinity(RawId::from(pid)) {
            Ok(mask) => write_affinity(out, pid, &mask)?,
            Err(error) => write_error(out, &RunError::from(error))?,
        }

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fs;

    use proc_affinity::ProfileStore;
    use tempfile::TempDir;

    use super::*;

    fn run_script(session: &Session, topology_problem: Option<&str>, script: &str) -> String {
        let mut out = Vec::new();

        run_shell(
            session,
            topology_problem.map(str::to_owned),
            &mut script.as_bytes(),
            &mut out,
        )
        .unwrap();

        String::from_utf8(out).unwrap()
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_line("  \n"), Ok(None));
        assert_eq!(parse_line("help\n"), Ok(Some(ShellCommand::Help)));
        assert_eq!(parse_line("exit"), Ok(Some(ShellCommand::Quit)));
        assert_eq!(
            parse_line("set 0-3"),
            Ok(Some(ShellCommand::Set {
                pid: None,
                cores: "0-3".to_owned()
            }))
        );
        assert_eq!(
            parse_line("  set   42 1,2 "),
            Ok(Some(ShellCommand::Set {
                pid: Some("42".to_owned()),
                cores: "1,2".to_owned()
            }))
        );
        assert_eq!(
            parse_line("processes fire"),
            Ok(Some(ShellCommand::Processes {
                filter: Some("fire".to_owned())
            }))
        );
    }

    #[test]
    fn rejects_unknown_and_malformed_commands() {
        assert_eq!(
            parse_line("frobnicate 1"),
            Err("unknown command 'frobnicate', type 'help'".to_owned())
        );
        assert_eq!(
            parse_line("save"),
            Err("wrong number of arguments for 'save', type 'help'".to_owned())
        );
        assert_eq!(
            parse_line("set 1 2 3"),
            Err("wrong number of arguments for 'set', type 'help'".to_owned())
        );
    }

    #[test]
    fn failed_commands_do_not_end_the_session() {
        let dir = TempDir::new().unwrap();
        let session = Session::new(ProfileStore::new(dir.path()));

        let text = run_script(&session, None, "show missing\nget\nbogus\nprofiles\nquit\n");

        assert!(text.contains("error: profile 'missing' not found"));
        assert!(text.contains("error: no process selected\nhint: select a process"));
        assert!(text.contains("error: unknown command 'bogus'"));
        assert!(text.contains("no profiles"));
    }

    #[test]
    fn saved_profiles_can_be_listed_and_shown() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("work.json"), r#"{"42": [0, 1]}"#).unwrap();
        let session = Session::new(ProfileStore::new(dir.path()));

        let text = run_script(&session, None, "save empty\nprofiles\nshow work\n");

        assert!(text.contains("saved 0 assignments to "));
        assert!(text.contains("empty\nwork\n"));
        assert!(text.contains("process 42: cores 0-1\n"));
        assert!(session.registry().is_empty());
    }

    #[test]
    fn controls_are_disabled_without_topology() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("work.json"), r#"{"42": [0]}"#).unwrap();
        let session = Session::new(ProfileStore::new(dir.path()));

        let text = run_script(
            &session,
            Some("no processor information"),
            "set 42 0\nload work\nshow work\n",
        );

        assert_eq!(
            text.matches("error: affinity control is disabled: no processor information")
                .count(),
            3
        );
        assert!(text.contains("process 42: cores 0\n"));
        assert!(session.registry().is_empty());
    }

    #[test]
    fn end_of_input_ends_the_session() {
        let dir = TempDir::new().unwrap();
        let session = Session::new(ProfileStore::new(dir.path()));

        let text = run_script(&session, None, "");

        assert_eq!(text, "type 'help' for a list of commands\n> \n");
    }
}

use crate::command::{Command, CommandFactory, ExecutableCommand};
use crate::config::ExitPolicy;
use crate::interpreter::Factory;
use crate::session::Session;
use anyhow::{Context, Result, anyhow};
use argh::{EarlyExit, FromArgs};
use log::debug;
use nix::sys::signal::{Signal, kill};
use std::env;
use std::io::Write;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process. Redirections and a trailing `&`
/// are ignored for builtins.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd" or "status".
    fn name() -> &'static str;

    /// Whether a lone leading `--help` prints usage instead of running.
    fn accepts_help() -> bool {
        true
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<()>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        if let Err(e) = T::execute(*self, stdout, session) {
            writeln!(stdout, "{:#}", e)?;
        }
        stdout.flush()?;
        Ok(())
    }
}

/// Usage text or an argument error produced by `argh`.
struct InvalidArgs {
    output: String,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, _session: &mut Session) -> Result<()> {
        writeln!(stdout, "{}", self.output.trim_end())?;
        stdout.flush()?;
        Ok(())
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, command: &Command) -> Option<Box<dyn ExecutableCommand>> {
        let name = command.program();
        if name != T::name() {
            return None;
        }
        Some(match T::from_args(&[name], &builtin_args(command.args(), T::accepts_help())) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, .. }) => Box::new(InvalidArgs { output }),
        })
    }
}

/// Arguments as handed to `argh`.
///
/// Operands are placed after `--` so words such as `-x` or `help` stay
/// operands. Only `--help` as the first word, when the builtin accepts it,
/// is left for `argh` to answer with usage text.
fn builtin_args(args: &[String], accepts_help: bool) -> Vec<&str> {
    if accepts_help && args.first().is_some_and(|a| a == "--help") {
        return vec!["--help"];
    }
    std::iter::once("--")
        .chain(args.iter().map(String::as_str))
        .collect()
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional, greedy)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted. Further operands are ignored.
    pub operands: Vec<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdout: &mut dyn Write, _session: &mut Session) -> Result<()> {
        let target = match self.operands.into_iter().next() {
            Some(t) => PathBuf::from(t),
            None => env::var_os("HOME")
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("cd: HOME not set"))?,
        };
        env::set_current_dir(&target).with_context(|| format!("cd: {}", target.display()))?;
        debug!("changed directory to {}", target.display());
        Ok(())
    }
}

#[derive(FromArgs)]
/// Exit the shell.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored, including `--help`; the shell always exits with status 0.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn accepts_help() -> bool {
        false
    }

    fn execute(self, _stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        session.should_exit = true;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Print the exit value or terminating signal of the last foreground command.
pub struct Status {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Status {
    fn name() -> &'static str {
        "status"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        writeln!(stdout, "{}", session.last_status)?;
        Ok(())
    }
}

/// Apply the exit policy to background jobs that are still outstanding.
///
/// Returns the pids that were sent SIGTERM.
pub(crate) fn finish_background_jobs(session: &Session, policy: ExitPolicy) -> Vec<nix::unistd::Pid> {
    if policy == ExitPolicy::LeaveRunning {
        return Vec::new();
    }
    let mut signalled = Vec::new();
    for pid in session.background_jobs() {
        match kill(pid, Signal::SIGTERM) {
            Ok(()) => {
                debug!("sent SIGTERM to background pid {}", pid);
                signalled.push(pid);
            }
            Err(errno) => debug!("could not signal background pid {}: {}", pid, errno),
        }
    }
    signalled
}

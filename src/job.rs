//! Launching external programs and waiting for them.
//!
//! [`JobController`] is the only place that calls `fork`, `execvp` and a
//! blocking `waitpid`. Everything the child needs is prepared before the fork
//! so the child side never allocates.

use crate::command::{Command, CommandFactory, ExecutableCommand};
use crate::interpreter::Factory;
use crate::redirect::{RedirectError, RedirectPlan};
use crate::session::Session;
use crate::signals::{self, write_stdout_raw};
use anyhow::Result;
use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, fork};
use std::ffi::{CString, NulError};
use std::fmt;
use std::io::Write;
use thiserror::Error;

/// Exit code of a child whose redirection could not be set up.
pub const EXIT_RESOURCE_FAILURE: i32 = 1;
/// Exit code of a child whose program could not be executed.
pub const EXIT_NOT_FOUND: i32 = 2;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationRecord {
    Exited(i32),
    Signaled(i32),
}

impl TerminationRecord {
    /// Classify a wait status; `None` for anything that is not a termination.
    pub fn from_wait_status(status: WaitStatus) -> Option<(Pid, Self)> {
        match status {
            WaitStatus::Exited(pid, code) => Some((pid, Self::Exited(code))),
            WaitStatus::Signaled(pid, signal, _) => Some((pid, Self::Signaled(signal as i32))),
            _ => None,
        }
    }

    pub fn is_signaled(&self) -> bool {
        matches!(self, Self::Signaled(_))
    }
}

impl Default for TerminationRecord {
    /// What `status` reports before any foreground command has run.
    fn default() -> Self {
        Self::Exited(0)
    }
}

impl fmt::Display for TerminationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exit value {}", code),
            Self::Signaled(signal) => write!(f, "terminated by signal {}", signal),
        }
    }
}

/// Result of a successful launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// The child was waited for and has terminated.
    Completed { pid: Pid, record: TerminationRecord },
    /// The child runs detached and will be collected by the reaper.
    Background(Pid),
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid argument {arg:?}: {source}")]
    InvalidArgument {
        arg: String,
        #[source]
        source: NulError,
    },
    #[error(transparent)]
    Redirect(#[from] RedirectError),
    #[error("fork failed: {0}")]
    Fork(Errno),
    #[error("waiting for pid {pid} failed: {errno}")]
    Wait { pid: Pid, errno: Errno },
}

/// Everything the child side of a fork needs, built in the parent.
struct PreparedLaunch {
    argv: Vec<CString>,
    // Points into `argv`; null-terminated for execvp(3).
    argv_ptrs: Vec<*const libc::c_char>,
    redirects: RedirectPlan,
    not_found: Vec<u8>,
}

impl PreparedLaunch {
    fn new(command: &Command) -> Result<Self, JobError> {
        let argv = command
            .argv
            .iter()
            .map(|arg| {
                CString::new(arg.as_str()).map_err(|source| JobError::InvalidArgument {
                    arg: arg.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let argv_ptrs = argv
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();
        Ok(Self {
            argv,
            argv_ptrs,
            redirects: RedirectPlan::for_command(command)?,
            not_found: format!("{}: no such file or directory\n", command.program()).into_bytes(),
        })
    }

    /// Child side: redirect, set signal dispositions, replace the image.
    fn exec(&self, interruptible: bool) -> ! {
        if let Err(message) = self.redirects.apply() {
            write_stdout_raw(message);
            exit_child(EXIT_RESOURCE_FAILURE);
        }
        signals::configure_child(interruptible);
        if let Some(program) = self.argv.first() {
            // SAFETY: `argv_ptrs` is a null-terminated array of pointers into
            // `argv`, which is alive for the duration of the call.
            unsafe {
                libc::execvp(program.as_ptr(), self.argv_ptrs.as_ptr());
            }
        }
        write_stdout_raw(&self.not_found);
        exit_child(EXIT_NOT_FOUND)
    }
}

fn exit_child(code: i32) -> ! {
    // SAFETY: _exit(2) skips atexit handlers and stdio flushing, which belong
    // to the parent.
    unsafe { libc::_exit(code) }
}

/// Forks, execs and waits for external programs.
#[derive(Debug, Default, Clone, Copy)]
pub struct JobController;

impl JobController {
    /// Run `command` as a child process.
    ///
    /// When `foreground_only` is set the command is waited for even if it
    /// asked for background execution. A child that is waited for gets the
    /// default SIGINT action; a true background child ignores SIGINT.
    pub fn launch(&self, command: &Command, foreground_only: bool) -> Result<JobOutcome, JobError> {
        let prepared = PreparedLaunch::new(command)?;
        let wait_for_child = foreground_only || !command.background;

        // SAFETY: the child only runs `PreparedLaunch::exec`, which uses
        // async-signal-safe calls on data prepared above.
        match unsafe { fork() } {
            Err(errno) => Err(JobError::Fork(errno)),
            Ok(ForkResult::Child) => prepared.exec(wait_for_child),
            Ok(ForkResult::Parent { child }) => {
                debug!(
                    "launched {:?} as pid {} ({})",
                    command.argv,
                    child,
                    if wait_for_child { "foreground" } else { "background" }
                );
                if wait_for_child {
                    let record = self.wait_for(child)?;
                    debug!("pid {} finished: {}", child, record);
                    Ok(JobOutcome::Completed { pid: child, record })
                } else {
                    Ok(JobOutcome::Background(child))
                }
            }
        }
    }

    /// Block until `pid` terminates.
    pub fn wait_for(&self, pid: Pid) -> Result<TerminationRecord, JobError> {
        loop {
            match waitpid(pid, None) {
                Ok(status) => {
                    if let Some((_, record)) = TerminationRecord::from_wait_status(status) {
                        return Ok(record);
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(JobError::Wait { pid, errno }),
            }
        }
    }
}

/// Any program that is not a builtin.
pub struct ExternalCommand {
    command: Command,
    jobs: JobController,
}

impl ExternalCommand {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            jobs: JobController,
        }
    }
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(&self, command: &Command) -> Option<Box<dyn ExecutableCommand>> {
        if command.argv.is_empty() {
            return None;
        }
        Some(Box::new(ExternalCommand::new(command.clone())))
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        // Anything still buffered would otherwise interleave with the child.
        stdout.flush()?;
        match self.jobs.launch(&self.command, session.mode().foreground_only()) {
            Ok(JobOutcome::Completed { record, .. }) => {
                if record.is_signaled() {
                    writeln!(stdout, "{}", record)?;
                }
                session.last_status = record;
            }
            Ok(JobOutcome::Background(pid)) => {
                writeln!(stdout, "background pid is {}", pid)?;
                session.track_background(pid);
            }
            Err(err @ JobError::Wait { .. }) => {
                warn!("{}", err);
            }
            Err(err) => {
                writeln!(stdout, "{}: {}", self.command.program(), err)?;
                session.last_status = TerminationRecord::Exited(EXIT_RESOURCE_FAILURE);
            }
        }
        stdout.flush()?;
        Ok(())
    }
}

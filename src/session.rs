use crate::job::TerminationRecord;
use crate::signals::{MODE, ModeFlags};
use nix::unistd::Pid;
use std::collections::HashSet;

/// State that lives for the whole shell process.
///
/// The working directory is deliberately not cached here: `cd` changes the
/// process's directory and everything else asks the OS.
#[derive(Debug)]
pub struct Session {
    /// Outcome of the most recent foreground command, reported by `status`.
    pub last_status: TerminationRecord,
    /// Set by `exit`; the interactive loop stops before the next prompt.
    pub should_exit: bool,
    mode: &'static ModeFlags,
    background: HashSet<Pid>,
}

impl Session {
    /// Session driven by the process-wide SIGTSTP flags.
    pub fn new() -> Self {
        Self::with_mode(&MODE)
    }

    pub fn with_mode(mode: &'static ModeFlags) -> Self {
        Self {
            last_status: TerminationRecord::default(),
            should_exit: false,
            mode,
            background: HashSet::new(),
        }
    }

    /// Foreground-only mode and its pending notification.
    pub fn mode(&self) -> &'static ModeFlags {
        self.mode
    }

    pub fn track_background(&mut self, pid: Pid) {
        self.background.insert(pid);
    }

    /// Drop `pid` from the outstanding set; returns whether it was tracked.
    pub fn forget_background(&mut self, pid: Pid) -> bool {
        self.background.remove(&pid)
    }

    /// Background jobs launched by this session that have not been reaped.
    pub fn background_jobs(&self) -> impl Iterator<Item = Pid> + '_ {
        self.background.iter().copied()
    }

    /// Session with private mode flags, isolated from the real signal handler.
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::with_mode(Box::leak(Box::new(ModeFlags::new())))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

use crate::job::TerminationRecord;
use crate::session::Session;
use log::{debug, trace};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use std::io::{self, Write};

/// Collects background children that have already terminated.
///
/// Polls with `WNOHANG` for any child, reports each one found and polls
/// again until nothing is pending. Never blocks. A wait error (usually
/// `ECHILD`, no children at all) ends the pass silently.
#[derive(Debug, Default, Clone, Copy)]
pub struct Reaper;

impl Reaper {
    /// Reap every finished child and report it; returns how many were reaped.
    pub fn reap(&self, stdout: &mut dyn Write, session: &mut Session) -> io::Result<usize> {
        let mut reaped = 0;
        while let Some((pid, record)) = self.poll() {
            reaped += 1;
            if !session.forget_background(pid) {
                debug!("reaped pid {} that was not a tracked background job", pid);
            }
            writeln!(stdout, "background pid {} is done: {}", pid, record)?;
        }
        if reaped > 0 {
            stdout.flush()?;
        }
        Ok(reaped)
    }

    fn poll(&self) -> Option<(Pid, TerminationRecord)> {
        loop {
            match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => return None,
                Ok(status) => {
                    if let Some(found) = TerminationRecord::from_wait_status(status) {
                        return Some(found);
                    }
                    trace!("ignoring wait status {:?}", status);
                }
                Err(errno) => {
                    trace!("nothing to reap: {}", errno);
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::job::{JobController, JobOutcome};
    use crate::test_support::lock_process_state;
    use std::thread;
    use std::time::{Duration, Instant};

    fn spawn_background(script: &str) -> Pid {
        let mut cmd = Command::new(["sh", "-c", script]);
        cmd.background = true;
        match JobController.launch(&cmd, false).unwrap() {
            JobOutcome::Background(pid) => pid,
            other => panic!("expected background, got {:?}", other),
        }
    }

    /// Reap until `expected` children were reported or the deadline passes.
    fn reap_until(expected: usize, session: &mut Session) -> String {
        let mut out = Vec::new();
        let mut total = 0;
        let deadline = Instant::now() + Duration::from_secs(5);
        while total < expected && Instant::now() < deadline {
            total += Reaper.reap(&mut out, session).unwrap();
            thread::sleep(Duration::from_millis(20));
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_nothing_to_reap() {
        let _lock = lock_process_state();
        let mut session = Session::for_tests();
        let mut out = Vec::new();
        assert_eq!(Reaper.reap(&mut out, &mut session).unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_running_child_is_not_reaped() {
        let _lock = lock_process_state();
        let mut session = Session::for_tests();
        let pid = spawn_background("sleep 0.3");
        session.track_background(pid);

        let mut out = Vec::new();
        assert_eq!(Reaper.reap(&mut out, &mut session).unwrap(), 0);
        assert!(out.is_empty());

        let report = reap_until(1, &mut session);
        assert_eq!(report, format!("background pid {} is done: exit value 0\n", pid));
        assert_eq!(session.background_jobs().count(), 0);
    }

    #[test]
    fn test_reports_exit_code_and_signal_once() {
        let _lock = lock_process_state();
        let mut session = Session::for_tests();
        let exited = spawn_background("exit 3");
        let killed = spawn_background("kill -KILL $$");
        session.track_background(exited);
        session.track_background(killed);

        let report = reap_until(2, &mut session);
        assert!(report.contains(&format!("background pid {} is done: exit value 3\n", exited)));
        assert!(report.contains(&format!(
            "background pid {} is done: terminated by signal 9\n",
            killed
        )));
        assert_eq!(report.lines().count(), 2);

        let mut out = Vec::new();
        assert_eq!(Reaper.reap(&mut out, &mut session).unwrap(), 0);
        assert!(out.is_empty());
    }
}

//! Planning of standard stream redirections for a child process.
//!
//! A [`RedirectPlan`] is built in the parent, before `fork`, so that the child
//! only has to walk a list of prepared steps: no allocation or formatting
//! happens between `fork` and `exec`.

use crate::command::Command;
use nix::fcntl::{OFlag, open};
use nix::sys::stat::Mode;
use nix::unistd::{close, dup2};
use std::ffi::{CString, NulError};
use std::os::fd::RawFd;
use thiserror::Error;

pub const NULL_DEVICE: &str = "/dev/null";

/// Errors that prevent a plan from being built.
#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("invalid file name {path:?}: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: NulError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Input,
    Output,
}

impl Stream {
    fn target_fd(self) -> RawFd {
        match self {
            Stream::Input => libc::STDIN_FILENO,
            Stream::Output => libc::STDOUT_FILENO,
        }
    }

    fn flags(self) -> OFlag {
        match self {
            Stream::Input => OFlag::O_RDONLY,
            Stream::Output => OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_TRUNC,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Stream::Input => "input",
            Stream::Output => "output",
        }
    }
}

/// Open `path` and place it on the stream's descriptor.
#[derive(Debug)]
struct RedirectStep {
    stream: Stream,
    path: CString,
    failure: Vec<u8>,
}

impl RedirectStep {
    fn new(stream: Stream, path: &str) -> Result<Self, RedirectError> {
        let c_path = CString::new(path).map_err(|source| RedirectError::InvalidPath {
            path: path.to_string(),
            source,
        })?;
        Ok(Self {
            stream,
            path: c_path,
            failure: format!("cannot open {} for {}\n", path, stream.describe()).into_bytes(),
        })
    }

    fn apply(&self) -> Result<(), &[u8]> {
        // rwx for everyone, subject to the umask.
        let mode = Mode::S_IRWXU | Mode::S_IRWXG | Mode::S_IRWXO;
        let fd = open(self.path.as_c_str(), self.stream.flags(), mode)
            .map_err(|_| self.failure.as_slice())?;
        let target = self.stream.target_fd();
        if fd != target {
            dup2(fd, target).map_err(|_| self.failure.as_slice())?;
            let _ = close(fd);
        }
        Ok(())
    }
}

/// Ordered open/duplicate operations to run in a child before `exec`.
#[derive(Debug, Default)]
pub struct RedirectPlan {
    steps: Vec<RedirectStep>,
}

impl RedirectPlan {
    /// Resolve the redirections requested by `command`.
    ///
    /// A background command gets the null device for every stream it did not
    /// redirect explicitly, so it never reads from or writes to the terminal.
    pub fn for_command(command: &Command) -> Result<Self, RedirectError> {
        let mut steps = Vec::new();
        for (stream, explicit) in [
            (Stream::Input, command.input.as_deref()),
            (Stream::Output, command.output.as_deref()),
        ] {
            match explicit {
                Some(path) => steps.push(RedirectStep::new(stream, path)?),
                None if command.background => steps.push(RedirectStep::new(stream, NULL_DEVICE)?),
                None => {}
            }
        }
        Ok(Self { steps })
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Paths and streams in application order.
    pub fn targets(&self) -> impl Iterator<Item = (Stream, &std::ffi::CStr)> {
        self.steps.iter().map(|s| (s.stream, s.path.as_c_str()))
    }

    /// Apply every step to the calling process.
    ///
    /// Meant for the child side of a `fork`. On failure returns the prepared
    /// message describing which open failed.
    pub fn apply(&self) -> Result<(), &[u8]> {
        self.steps.iter().try_for_each(RedirectStep::apply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    fn targets(plan: &RedirectPlan) -> Vec<(Stream, String)> {
        plan.targets()
            .map(|(s, p)| (s, p.to_string_lossy().into_owned()))
            .collect()
    }

    #[test]
    fn test_foreground_without_redirections_is_empty() {
        let plan = RedirectPlan::for_command(&Command::new(["ls"])).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_explicit_paths() {
        let mut cmd = Command::new(["sort"]);
        cmd.input = Some("in.txt".into());
        cmd.output = Some("out.txt".into());
        let plan = RedirectPlan::for_command(&cmd).unwrap();
        assert_eq!(
            targets(&plan),
            vec![
                (Stream::Input, "in.txt".to_string()),
                (Stream::Output, "out.txt".to_string()),
            ]
        );
    }

    #[test]
    fn test_background_defaults_to_null_device() {
        let mut cmd = Command::new(["sleep", "1"]);
        cmd.background = true;
        let plan = RedirectPlan::for_command(&cmd).unwrap();
        assert_eq!(
            targets(&plan),
            vec![
                (Stream::Input, NULL_DEVICE.to_string()),
                (Stream::Output, NULL_DEVICE.to_string()),
            ]
        );
    }

    #[test]
    fn test_background_keeps_explicit_output() {
        let mut cmd = Command::new(["ls"]);
        cmd.background = true;
        cmd.output = Some("listing".into());
        let plan = RedirectPlan::for_command(&cmd).unwrap();
        assert_eq!(
            targets(&plan),
            vec![
                (Stream::Input, NULL_DEVICE.to_string()),
                (Stream::Output, "listing".to_string()),
            ]
        );
    }

    #[test]
    fn test_failure_messages_are_prepared() {
        let step = RedirectStep::new(Stream::Input, "missing.txt").unwrap();
        assert_eq!(step.failure, b"cannot open missing.txt for input\n");
        let step = RedirectStep::new(Stream::Output, "/nope/out").unwrap();
        assert_eq!(step.failure, b"cannot open /nope/out for output\n");
        assert_eq!(step.path.as_c_str(), CStr::from_bytes_with_nul(b"/nope/out\0").unwrap());
    }

    #[test]
    fn test_nul_in_path_is_rejected() {
        let mut cmd = Command::new(["cat"]);
        cmd.input = Some("bad\0name".into());
        let err = RedirectPlan::for_command(&cmd).unwrap_err();
        assert!(matches!(err, RedirectError::InvalidPath { .. }));
    }
}

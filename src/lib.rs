//! A small interactive shell in the spirit of `smallsh`.
//!
//! Lines are split on spaces into a [`command::Command`] with optional `<`/`>`
//! redirections and a trailing `&`. Every `$$` is replaced by the shell's pid.
//! `exit`, `cd` and `status` run in-process; everything else is forked and
//! executed through `PATH`, either in the foreground or as a background job
//! that is reaped and reported before the next prompt.
//!
//! SIGTSTP toggles foreground-only mode, in which a trailing `&` is ignored.
//! SIGINT is ignored by the shell and by background jobs, and terminates
//! foreground children.
//!
//! The main entry point is [`Interpreter`].

mod builtin;
pub mod command;
pub mod config;
mod expand;
mod interpreter;
pub mod job;
pub mod lexer;
mod reaper;
mod redirect;
pub mod session;
pub mod signals;

pub use config::{ExitPolicy, ShellConfig};
pub use interpreter::Interpreter;
pub use job::TerminationRecord;
pub use session::Session;

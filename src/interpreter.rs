use crate::builtin::{self, Cd, Exit, Status};
use crate::command::{Command, CommandFactory};
use crate::config::ShellConfig;
use crate::expand::Expander;
use crate::job::ExternalCommand;
use crate::lexer::{self, ParseError, ParsedLine};
use crate::reaper::Reaper;
use crate::session::Session;
use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use std::io::{self, BufRead, ErrorKind, Read, Write};

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate: builtins and external programs.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// The builtins `exit`, `cd` and `status`, followed by the external launcher
/// that accepts everything else.
pub(crate) fn default_commands() -> Vec<Box<dyn CommandFactory>> {
    vec![
        Box::new(Factory::<Exit>::default()),
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<Status>::default()),
        Box::new(Factory::<ExternalCommand>::default()),
    ]
}

/// The interactive loop: read a line, run it, reap finished background jobs.
///
/// Example
/// ```
/// use smallsh::{Interpreter, ShellConfig};
/// let mut sh = Interpreter::with_config(ShellConfig::default()).unwrap();
/// let mut out = Vec::new();
/// sh.process_line("status\n", &mut out).unwrap();
/// assert_eq!(out, b"exit value 0\n");
/// ```
pub struct Interpreter {
    config: ShellConfig,
    session: Session,
    expander: Expander,
    reaper: Reaper,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create an interpreter with a custom session and set of command factories.
    pub(crate) fn new(
        config: ShellConfig,
        session: Session,
        commands: Vec<Box<dyn CommandFactory>>,
    ) -> Result<Self> {
        Ok(Self {
            config,
            session,
            expander: Expander::for_current_process()?,
            reaper: Reaper,
            commands,
        })
    }

    /// Interpreter with the default commands, driven by the process-wide
    /// foreground-only flags.
    pub fn with_config(config: ShellConfig) -> Result<Self> {
        Self::new(config, Session::new(), default_commands())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run an already parsed and expanded command.
    pub fn run(&mut self, command: &Command, stdout: &mut dyn Write) -> Result<()> {
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(command) {
                return cmd.execute(stdout, &mut self.session);
            }
        }
        Err(anyhow!("command not found: {}", command.program()))
    }

    /// Handle one input line, then reap finished background jobs.
    ///
    /// Syntax errors are reported to `stdout` and leave the status untouched.
    /// The returned error only signals that `stdout` itself failed.
    pub fn process_line(&mut self, line: &str, stdout: &mut dyn Write) -> Result<()> {
        let parsed = lexer::parse_line(line, self.config.max_line_len);
        self.handle(parsed, stdout)
    }

    fn handle(
        &mut self,
        parsed: Result<ParsedLine, ParseError>,
        stdout: &mut dyn Write,
    ) -> Result<()> {
        match parsed {
            Ok(ParsedLine::Blank) => {}
            Ok(ParsedLine::Command(command)) => self.dispatch(command, stdout)?,
            Err(e) => writeln!(stdout, "{}", e)?,
        }
        if !self.session.should_exit {
            self.reaper.reap(stdout, &mut self.session)?;
        }
        stdout.flush()?;
        Ok(())
    }

    fn dispatch(&mut self, command: Command, stdout: &mut dyn Write) -> Result<()> {
        let command = self.expander.expand_command(command);
        if command.is_comment() {
            return Ok(());
        }
        // A SIGTSTP arrived since the last dispatch: this line is dropped.
        if self.session.mode().take_notification() {
            debug!(
                "foreground-only mode is now {}; skipping {:?}",
                self.session.mode().foreground_only(),
                command.argv
            );
            return Ok(());
        }
        self.run(&command, stdout)
    }

    /// Read-eval loop over `input` until `exit` or end of input.
    ///
    /// Outstanding background jobs are then handled according to the
    /// configured [`crate::ExitPolicy`].
    pub fn repl<R: BufRead>(&mut self, input: R, stdout: &mut dyn Write) -> Result<()> {
        let result = self.read_loop(input, stdout);
        let terminated = builtin::finish_background_jobs(&self.session, self.config.exit_policy);
        if !terminated.is_empty() {
            debug!("terminated background jobs {:?}", terminated);
        }
        result
    }

    fn read_loop<R: BufRead>(&mut self, mut input: R, stdout: &mut dyn Write) -> Result<()> {
        let mut buf = Vec::new();
        while !self.session.should_exit {
            if let Err(e) = write!(stdout, "{}", self.config.prompt).and_then(|_| stdout.flush()) {
                warn!("failed to write prompt: {}", e);
            }

            buf.clear();
            // One byte past the limit is enough to tell that a line is too long.
            let limit = self.config.max_line_len as u64 + 1;
            match (&mut input).take(limit).read_until(b'\n', &mut buf) {
                Ok(0) => {
                    debug!("end of input");
                    break;
                }
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("failed to read input"),
            }

            let result = if buf.len() > self.config.max_line_len {
                let mut len = buf.len();
                if buf.last() != Some(&b'\n') {
                    len += discard_line(&mut input).context("failed to read input")?;
                }
                let err = ParseError::LineTooLong {
                    len,
                    max: self.config.max_line_len,
                };
                self.handle(Err(err), stdout)
            } else {
                self.process_line(&String::from_utf8_lossy(&buf), stdout)
            };
            if let Err(e) = result {
                warn!("{:#}", e);
            }
        }
        Ok(())
    }
}

/// Skip input up to and including the next newline without buffering it.
///
/// Returns the number of bytes skipped.
fn discard_line<R: BufRead>(input: &mut R) -> io::Result<usize> {
    let mut skipped = 0;
    loop {
        let (used, done) = match input.fill_buf() {
            Ok([]) => return Ok(skipped),
            Ok(available) => match available.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (available.len(), false),
            },
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        input.consume(used);
        skipped += used;
        if done {
            return Ok(skipped);
        }
    }
}

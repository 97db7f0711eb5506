use crate::session::Session;
use anyhow::Result;
use std::io::Write;

/// A single parsed input line, rebuilt on every loop iteration.
///
/// `argv[0]` is the program (or builtin) name. The tokenizer never produces a
/// `Command` with an empty `argv`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    /// Program name followed by its arguments.
    pub argv: Vec<String>,
    /// Path given after `<`, if any.
    pub input: Option<String>,
    /// Path given after `>`, if any.
    pub output: Option<String>,
    /// Set when the line ended with a lone `&`.
    pub background: bool,
}

impl Command {
    /// Build a foreground command without redirections.
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    /// A line whose first word starts with `#` does nothing.
    pub fn is_comment(&self) -> bool {
        self.program().starts_with('#')
    }
}

/// Object-safe trait for anything the interpreter can run for a [`Command`].
///
/// Implemented by builtins via a blanket impl and by [`crate::job::ExternalCommand`].
pub trait ExecutableCommand {
    /// Run the command, reporting user-visible messages to `stdout`.
    ///
    /// Errors returned here are failures of the shell's own output; problems
    /// with the command itself are reported to `stdout` and swallowed.
    fn execute(self: Box<Self>, stdout: &mut dyn Write, session: &mut Session) -> Result<()>;
}

/// Factory that tries to create a runnable command for a parsed line.
///
/// Returns `None` when the factory doesn't recognize the program name.
pub trait CommandFactory {
    fn try_create(&self, command: &Command) -> Option<Box<dyn ExecutableCommand>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_and_args() {
        let cmd = Command::new(["ls", "-l", "/tmp"]);
        assert_eq!(cmd.program(), "ls");
        assert_eq!(cmd.args(), &["-l".to_string(), "/tmp".to_string()]);
        assert!(!cmd.background);
    }

    #[test]
    fn test_empty_command_has_no_program() {
        let cmd = Command::default();
        assert_eq!(cmd.program(), "");
        assert!(cmd.args().is_empty());
        assert!(!cmd.is_comment());
    }

    #[test]
    fn test_comment_detection() {
        assert!(Command::new(["#", "note"]).is_comment());
        assert!(Command::new(["#note"]).is_comment());
        assert!(!Command::new(["echo", "#not-a-comment"]).is_comment());
    }
}

//! `$$` substitution.

use crate::command::Command;
use anyhow::{Context, Result};
use nix::unistd::Pid;
use regex::{NoExpand, Regex};

/// Replaces every `$$` in a word with the decimal process id of the shell.
///
/// Occurrences are matched left to right without overlap, so `$$$` becomes
/// `<pid>$` and `$$$$` becomes `<pid><pid>`. The expanded word may be longer
/// than the original; nothing else in the word is touched.
pub struct Expander {
    pattern: Regex,
    pid: String,
}

impl Expander {
    pub fn new(pid: Pid) -> Result<Self> {
        let pattern = Regex::new(r"\$\$").context("failed to compile the `$$` pattern")?;
        Ok(Self {
            pattern,
            pid: pid.to_string(),
        })
    }

    /// Expander bound to the calling process.
    pub fn for_current_process() -> Result<Self> {
        Self::new(nix::unistd::getpid())
    }

    pub fn expand(&self, word: &str) -> String {
        self.pattern
            .replace_all(word, NoExpand(&self.pid))
            .into_owned()
    }

    /// Expand every argument and both redirection paths of `command`.
    pub fn expand_command(&self, mut command: Command) -> Command {
        for arg in command.argv.iter_mut() {
            *arg = self.expand(arg);
        }
        for path in [&mut command.input, &mut command.output].into_iter().flatten() {
            *path = self.expand(path);
        }
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expander() -> Expander {
        Expander::new(Pid::from_raw(4242)).unwrap()
    }

    #[test]
    fn test_plain_words_untouched() {
        let e = expander();
        assert_eq!(e.expand("hello"), "hello");
        assert_eq!(e.expand(""), "");
        assert_eq!(e.expand("$HOME"), "$HOME");
        assert_eq!(e.expand("cost$"), "cost$");
    }

    #[test]
    fn test_every_occurrence_replaced() {
        let e = expander();
        assert_eq!(e.expand("$$"), "4242");
        assert_eq!(e.expand("file.$$.tmp"), "file.4242.tmp");
        assert_eq!(e.expand("$$-$$-$$"), "4242-4242-4242");
    }

    #[test]
    fn test_odd_markers_pair_left_to_right() {
        let e = expander();
        assert_eq!(e.expand("$$$"), "4242$");
        assert_eq!(e.expand("$$$$"), "42424242");
        assert_eq!(e.expand("a$$$b"), "a4242$b");
    }

    #[test]
    fn test_expansion_counts_match() {
        let e = expander();
        for n in 0..6 {
            let word = format!("x{}y", "$$".repeat(n));
            let expanded = e.expand(&word);
            assert_eq!(expanded, format!("x{}y", "4242".repeat(n)));
            assert_eq!(expanded.matches("4242").count(), n);
        }
    }

    #[test]
    fn test_current_process_pid() {
        let e = Expander::for_current_process().unwrap();
        assert_eq!(e.expand("$$"), std::process::id().to_string());
    }

    #[test]
    fn test_expand_command_covers_paths() {
        let cmd = Command {
            argv: vec!["echo".into(), "$$".into()],
            input: Some("in.$$".into()),
            output: Some("out.$$".into()),
            background: true,
        };
        let cmd = expander().expand_command(cmd);
        assert_eq!(cmd.argv, vec!["echo", "4242"]);
        assert_eq!(cmd.input.as_deref(), Some("in.4242"));
        assert_eq!(cmd.output.as_deref(), Some("out.4242"));
        assert!(cmd.background);
    }
}

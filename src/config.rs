use crate::lexer::DEFAULT_MAX_LINE_LEN;

pub const DEFAULT_PROMPT: &str = ": ";

/// What happens to still-running background jobs when the shell exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitPolicy {
    /// Send SIGTERM to every background job that has not been reaped.
    #[default]
    TerminateJobs,
    /// Leave background jobs running after the shell is gone.
    LeaveRunning,
}

/// Settings of an interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// Printed, without a newline, before every line is read.
    pub prompt: String,
    /// Longer input lines are rejected without being run.
    pub max_line_len: usize,
    pub exit_policy: ExitPolicy,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            max_line_len: DEFAULT_MAX_LINE_LEN,
            exit_policy: ExitPolicy::default(),
        }
    }
}

use anyhow::{Context, Result};
use argh::FromArgs;
use smallsh::{ExitPolicy, Interpreter, ShellConfig, signals};
use std::io::{stdin, stdout};

#[derive(FromArgs)]
/// A small interactive shell with background jobs and foreground-only mode.
struct Options {
    /// prompt printed before every line (default ": ")
    #[argh(option, default = "smallsh::config::DEFAULT_PROMPT.to_string()")]
    prompt: String,

    /// longest accepted input line in bytes (default 2048)
    #[argh(option, default = "smallsh::lexer::DEFAULT_MAX_LINE_LEN")]
    max_line: usize,

    /// leave background jobs running on exit instead of sending SIGTERM
    #[argh(switch)]
    keep_jobs: bool,

    /// log debug messages to stderr
    #[argh(switch, short = 'v')]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "smallsh=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() -> Result<()> {
    let options: Options = argh::from_env();
    init_logging(options.verbose);

    signals::install_shell_handlers().context("failed to install signal handlers")?;

    let config = ShellConfig {
        prompt: options.prompt,
        max_line_len: options.max_line,
        exit_policy: if options.keep_jobs {
            ExitPolicy::LeaveRunning
        } else {
            ExitPolicy::TerminateJobs
        },
    };
    let mut interpreter = Interpreter::with_config(config)?;
    interpreter.repl(stdin().lock(), &mut stdout())?;
    Ok(())
}

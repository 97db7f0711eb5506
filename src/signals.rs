//! Foreground-only mode and the shell's signal dispositions.
//!
//! SIGTSTP toggles foreground-only mode. The handler touches nothing but two
//! atomics and a raw `write(2)` of a static message; everything else that
//! depends on the mode happens in the main loop, which polls [`ModeFlags`].

use nix::errno::Errno;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};

const ENTER_MESSAGE: &[u8] = b"\nEntering foreground-only mode (& is now ignored)\n";
const EXIT_MESSAGE: &[u8] = b"\nExiting foreground-only mode\n";

/// State shared between the SIGTSTP handler (writer) and the main loop (reader).
#[derive(Debug, Default)]
pub struct ModeFlags {
    foreground_only: AtomicBool,
    notified: AtomicBool,
}

impl ModeFlags {
    pub const fn new() -> Self {
        Self {
            foreground_only: AtomicBool::new(false),
            notified: AtomicBool::new(false),
        }
    }

    /// Whether `&` is currently ignored.
    pub fn foreground_only(&self) -> bool {
        self.foreground_only.load(Ordering::SeqCst)
    }

    /// Whether a toggle happened that the main loop has not consumed yet.
    pub fn is_notified(&self) -> bool {
        self.notified.load(Ordering::SeqCst)
    }

    /// Consume a pending toggle notification, returning whether there was one.
    pub fn take_notification(&self) -> bool {
        self.notified.swap(false, Ordering::SeqCst)
    }

    /// Flip the mode and raise the notification. Returns the message announcing
    /// the new mode.
    ///
    /// Only lock-free atomics are used, so this is safe to call from a signal
    /// handler.
    pub fn toggle(&self) -> &'static [u8] {
        self.notified.store(true, Ordering::SeqCst);
        let was_foreground_only = self.foreground_only.fetch_xor(true, Ordering::SeqCst);
        if was_foreground_only {
            EXIT_MESSAGE
        } else {
            ENTER_MESSAGE
        }
    }
}

/// Process-wide flags driven by SIGTSTP.
pub static MODE: ModeFlags = ModeFlags::new();

/// Write `bytes` to standard output with a single unbuffered `write(2)`.
///
/// Usable from signal handlers and from a child between `fork` and `exec`.
pub(crate) fn write_stdout_raw(bytes: &[u8]) {
    write_raw(libc::STDOUT_FILENO, bytes);
}

fn write_raw(fd: RawFd, bytes: &[u8]) {
    // SAFETY: write(2) is async-signal-safe and `bytes` outlives the call.
    unsafe {
        libc::write(fd, bytes.as_ptr().cast::<libc::c_void>(), bytes.len());
    }
}

/// Toggle `flags` and write the announcement to `fd`.
///
/// The interrupted code may be about to read `errno`, so it is restored
/// whatever the write did to it.
fn toggle_and_announce(flags: &ModeFlags, fd: RawFd) {
    let saved = Errno::last_raw();
    write_raw(fd, flags.toggle());
    Errno::set_raw(saved);
}

extern "C" fn handle_stop_signal(_signal: libc::c_int) {
    toggle_and_announce(&MODE, libc::STDOUT_FILENO);
}

/// Install the shell's own dispositions: SIGINT is ignored and SIGTSTP toggles
/// foreground-only mode with every other signal blocked while it runs.
pub fn install_shell_handlers() -> nix::Result<()> {
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    let toggle = SigAction::new(
        SigHandler::Handler(handle_stop_signal),
        SaFlags::SA_RESTART,
        SigSet::all(),
    );
    // SAFETY: the handler only performs async-signal-safe operations.
    unsafe {
        sigaction(Signal::SIGINT, &ignore)?;
        sigaction(Signal::SIGTSTP, &toggle)?;
    }
    Ok(())
}

/// Set the dispositions a freshly forked child runs with.
///
/// SIGINT goes back to its default action when the child is waited on in the
/// foreground and is ignored otherwise. SIGTSTP is always ignored in children.
/// Called between `fork` and `exec`; failures are ignored because the child
/// has no way to report them that is safe at this point.
pub fn configure_child(interruptible: bool) {
    let interrupt = if interruptible {
        SigHandler::SigDfl
    } else {
        SigHandler::SigIgn
    };
    let interrupt = SigAction::new(interrupt, SaFlags::empty(), SigSet::empty());
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    // SAFETY: only SIG_DFL / SIG_IGN are installed.
    unsafe {
        let _ = sigaction(Signal::SIGINT, &interrupt);
        let _ = sigaction(Signal::SIGTSTP, &ignore);
    }
}

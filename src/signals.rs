//! Signal dispositions for the three contexts the shell runs in.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::libc::c_int;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Where the shell currently is, which decides what SIGINT and SIGQUIT do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalContext {
    /// At the prompt: SIGINT records an interrupt for the REPL to pick up,
    /// SIGQUIT is ignored.
    Interactive,
    /// Between fork and exec: both signals back to their defaults so the
    /// child terminates the way the kernel intends.
    Child,
    /// Collecting a heredoc body: SIGINT records an interrupt that aborts
    /// the whole pipeline, SIGQUIT is ignored.
    Heredoc,
}

/// The handler only stores to an atomic; anything else would not be
/// async-signal-safe.
extern "C" fn record_interrupt(_signal: c_int) {
    INTERRUPTED.store(true, Ordering::Relaxed);
}

/// Install the dispositions for `context`.
pub fn install(context: SignalContext) {
    match context {
        SignalContext::Interactive | SignalContext::Heredoc => {
            set_handler(Signal::SIGINT, SigHandler::Handler(record_interrupt));
            set_handler(Signal::SIGQUIT, SigHandler::SigIgn);
        }
        SignalContext::Child => {
            set_handler(Signal::SIGINT, SigHandler::SigDfl);
            set_handler(Signal::SIGQUIT, SigHandler::SigDfl);
        }
    }
}

/// Ignore SIGINT in the parent while foreground children run; they receive
/// the signal themselves and the parent learns of it through `waitpid`.
/// Reinstall [`SignalContext::Interactive`] once the pipeline is reaped.
pub fn ignore_sigint() {
    set_handler(Signal::SIGINT, SigHandler::SigIgn);
}

/// Consume a recorded interrupt, clearing the flag.
pub fn take_interrupt() -> bool {
    INTERRUPTED.swap(false, Ordering::Relaxed)
}

fn set_handler(signal: Signal, handler: SigHandler) {
    let action = SigAction::new(handler, SaFlags::SA_RESTART, SigSet::empty());
    // sigaction only fails for invalid signal numbers, which these are not
    let _ = unsafe { sigaction(signal, &action) };
}

// https://github.com/vorner/signal-hook/blob/master/signal-hook-registry/src/lib.rs

use std::error::Error;
use std::fmt;
use std::mem::MaybeUninit;

use libc::{
    c_int, sigaction, sigemptyset, sighandler_t, SIGINT, SIGPIPE, SIGQUIT, SIG_DFL, SIG_IGN,
};

use crate::fd::{describe, errno};

/// Signals an interactive shell must survive while a child owns the terminal.
const INTERACTIVE_SIGNALS: [c_int; 2] = [SIGINT, SIGQUIT];

#[derive(Debug, PartialEq)]
pub enum SigError {
    Syscall(c_int),
}

impl fmt::Display for SigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigError::Syscall(error_num) => write!(f, "{}", describe(*error_num)),
        }
    }
}

impl Error for SigError {}

/// Installs `handler` (`SIG_IGN`, `SIG_DFL` or a function address) for
/// `signum` and returns the disposition it replaced.
pub(crate) fn set_disposition(
    signum: c_int,
    handler: sighandler_t,
) -> Result<sighandler_t, SigError> {
    let mut sa = unsafe { MaybeUninit::<sigaction>::zeroed().assume_init() };
    sa.sa_sigaction = handler;
    sa.sa_flags = 0;
    unsafe { sigemptyset(&mut sa.sa_mask as *mut _) };

    let mut old = unsafe { MaybeUninit::<sigaction>::zeroed().assume_init() };

    match unsafe { libc::sigaction(signum, &sa, &mut old) } {
        -1 => Err(SigError::Syscall(errno())),
        _ => Ok(old.sa_sigaction),
    }
}

pub(crate) fn ignore_interactive_signals() -> Result<(), SigError> {
    for &signum in INTERACTIVE_SIGNALS.iter() {
        set_disposition(signum, SIG_IGN)?;
    }

    Ok(())
}

/// Runs in a freshly forked child: ignored dispositions survive `exec`, so
/// they have to be reset before the child runs anything. `SIGPIPE` is
/// ignored by the Rust runtime itself.
pub(crate) fn restore_default_signals() {
    for &signum in INTERACTIVE_SIGNALS.iter().chain(&[SIGPIPE]) {
        let _ = set_disposition(signum, SIG_DFL);
    }
}

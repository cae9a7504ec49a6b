//! Signal & lifecycle controller.
//!
//! A process-wide run flag and exit code, flipped from Unix signal
//! handlers installed on top of `tokio::signal`. `stop_handler` is kept as
//! a pure function, independent of any signal machinery, so its exit-code
//! arithmetic can be tested directly rather than through an actual signal
//! delivery.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

use crate::error::AppResult;

/// Shared run flag: `true` while the process should keep dispatching.
pub type RunFlag = Arc<AtomicBool>;

/// Shared exit code, set once a stop signal has been handled.
pub type ExitCode = Arc<AtomicI32>;

/// Compute the exit status for a process stopped by signal number `signum`,
/// following the common shell convention of `128 + signum`. Kept free of
/// any signal-handling state so it can be exercised directly, including
/// signum values no real signal delivery would ever produce (0, negative)
/// — the arithmetic is unconditional rather than validated against a known
/// signal set.
#[must_use]
pub fn stop_handler(signum: i32) -> i32 {
    128 + signum
}

/// A live signal controller: the run flag and exit code it flips, plus the
/// installed handler tasks. Dropping this does not uninstall the
/// underlying `tokio::signal` streams; it simply stops polling them.
pub struct SignalController {
    /// Shared run flag, read by the dispatch/worker loops.
    pub run_flag: RunFlag,
    /// Shared exit code, read by the bin entrypoint on shutdown.
    pub exit_code: ExitCode,
}

impl SignalController {
    /// Install `SIGTERM` and `SIGINT` handlers that flip `run_flag` to
    /// `false` and record `stop_handler(signum)` into `exit_code`, each as
    /// a background task on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if installing either signal stream fails (e.g. the
    /// process is not on a platform `tokio::signal::unix` supports).
    pub fn install() -> AppResult<Self> {
        let run_flag: RunFlag = Arc::new(AtomicBool::new(true));
        let exit_code: ExitCode = Arc::new(AtomicI32::new(0));

        for (kind, signum) in [
            (SignalKind::terminate(), libc_sigterm()),
            (SignalKind::interrupt(), libc_sigint()),
            (SignalKind::hangup(), libc_sighup()),
            (SignalKind::quit(), libc_sigquit()),
        ] {
            spawn_handler(kind, signum, run_flag.clone(), exit_code.clone())?;
        }

        Ok(Self { run_flag, exit_code })
    }
}

// Kept as named constants rather than inlined magic numbers: these are the
// four signal numbers this controller reacts to, matched against their
// `SignalKind` counterparts above.
const fn libc_sigterm() -> i32 {
    15
}

const fn libc_sigint() -> i32 {
    2
}

const fn libc_sighup() -> i32 {
    1
}

const fn libc_sigquit() -> i32 {
    3
}

fn spawn_handler(kind: SignalKind, signum: i32, run_flag: RunFlag, exit_code: ExitCode) -> AppResult<()> {
    let mut stream = signal(kind)?;
    tokio::spawn(async move {
        if stream.recv().await.is_some() {
            info!(signum, "received stop signal");
            exit_code.store(stop_handler(signum), Ordering::SeqCst);
            run_flag.store(false, Ordering::SeqCst);
        }
    });
    Ok(())
}

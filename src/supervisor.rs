//! Top-level supervisor: the restart-with-cooldown loop that sits above
//! the dispatch loop / URL-check worker loop.

use std::future::Future;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tracing::{error, info};

use crate::cli::Args;
use crate::config::Settings;
use crate::daemonize::daemonize;
use crate::error::{AppResult, DispatchError};
use crate::logging::init_tracing;
use crate::pidfile::write_pidfile;
use crate::signal::{RunFlag, SignalController};

/// Parse CLI args, optionally daemonize and write a pidfile, load and
/// validate configuration, initialize tracing, and install signal
/// handlers. Returns the loaded settings and the installed controller;
/// the caller builds its queue adapter(s) and hands the run flag to
/// [`run_supervised`].
///
/// # Errors
///
/// Returns an error if daemonizing, writing the pidfile, loading
/// configuration, or installing signal handlers fails.
pub async fn bootstrap(args: Args) -> AppResult<(Settings, SignalController)> {
    // Best-effort: load a `.env` file for secrets (queue credentials, callback
    // auth tokens) that operators keep out of the TOML config. Absence is not
    // an error.
    let _ = dotenvy::dotenv();

    if args.daemon {
        daemonize()?;
    }

    if let Some(pidfile) = &args.pidfile {
        write_pidfile(pidfile).map_err(|e| DispatchError::Startup(e.to_string()))?;
    }

    let settings = load_settings(&args.config)?;
    init_tracing(&settings.logging);
    let controller = SignalController::install()?;

    Ok((settings, controller))
}

fn load_settings(path: &Path) -> AppResult<Settings> {
    Settings::load(path).map_err(anyhow::Error::from)
}

/// Run `body` repeatedly while `run_flag` is set, applying `sleep_on_fail`
/// as a cooldown after any iteration that returns an error. An iteration
/// returning `Ok(())` is a clean shutdown (the run flag has already been
/// flipped false by a signal handler) and ends the supervisor loop without
/// a cooldown.
pub async fn run_supervised<F, Fut>(run_flag: RunFlag, sleep_on_fail: Duration, mut body: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), DispatchError>>,
{
    while run_flag.load(Ordering::Relaxed) {
        match body().await {
            Ok(()) => break,
            Err(err) => {
                error!(error = %err, "dispatch loop crashed, restarting after cooldown");
                sleep_interruptible(sleep_on_fail, &run_flag).await;
            }
        }
    }
    info!("supervisor exiting");
}

async fn sleep_interruptible(duration: Duration, run_flag: &RunFlag) {
    const POLL_INTERVAL: Duration = Duration::from_millis(100);
    let mut remaining = duration;
    while remaining > Duration::ZERO && run_flag.load(Ordering::Relaxed) {
        let step = remaining.min(POLL_INTERVAL);
        tokio::time::sleep(step).await;
        remaining = remaining.saturating_sub(step);
    }
}

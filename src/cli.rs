//! Command-line argument parsing, shared by both binaries.

use std::path::PathBuf;

use clap::Parser;

/// Arguments common to `notification_pusher` and `url_check_worker`.
#[derive(Debug, Parser)]
pub struct Args {
    /// Path to the TOML configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,

    /// Daemonize via double-fork before starting the dispatch loop.
    #[arg(short = 'd', long = "daemon")]
    pub daemon: bool,

    /// Write the process pid to this file after daemonizing (if requested).
    #[arg(short = 'P', long = "pidfile")]
    pub pidfile: Option<PathBuf>,
}

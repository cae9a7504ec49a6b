//! # dispatchd
//!
//! A concurrent dispatch engine for two queue-drain daemons that share a
//! core: a pool of async workers leases tasks from a queue broker, acts on
//! each one, and reports an ack/bury verdict back.
//!
//! - `notification_pusher` delivers each task as an HTTP POST callback.
//! - `url_check_worker` follows a URL's redirect chain and routes the
//!   result to an output queue, or back to the input queue for a delayed
//!   recheck.
//!
//! Both binaries are built from the same dispatch core ([`queue`],
//! [`dispatch`]), differing only in what a worker does with a leased task
//! ([`dispatch::notify`] vs. [`urlcheck`]).
//!
//! ## Quick example
//!
//! See `src/bin/notification_pusher.rs` and `src/bin/url_check_worker.rs`
//! for the full wiring of a [`dispatch::DispatchLoop`] or
//! [`urlcheck::run_loop`] against a [`queue::QueueAdapter`].

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Command-line argument parsing shared by both binaries.
pub mod cli;
/// Daemon configuration.
pub mod config;
/// Double-fork daemonization.
pub mod daemonize;
/// Notification-mode dispatch core: completion channel, worker pool, dispatch loop.
pub mod dispatch;
/// Crate-wide error types.
pub mod error;
/// Tracing/logging setup.
pub mod logging;
/// Pidfile writer.
pub mod pidfile;
/// Queue broker adapters and the task value object.
pub mod queue;
/// Signal & lifecycle controller.
pub mod signal;
/// Top-level supervisor (restart-with-cooldown loop).
pub mod supervisor;
/// URL-check worker mode.
pub mod urlcheck;

//! Double-fork daemonization.
//!
//! The ordering matters more than the syscalls themselves: the first fork
//! failure must be fatal before `setsid` ever runs, while the second fork
//! failure is fatal only after `setsid` already ran, so a crashed second
//! fork still leaves the process detached from its controlling terminal.
//! The ordering is expressed against the [`ForkOps`] trait so it can be
//! exercised without forking a real test process; [`daemonize`] wires it to
//! the real `nix` syscalls.

use nix::unistd::{ForkResult, Pid};

use crate::error::AppResult;

/// The syscalls [`daemonize`] sequences, abstracted so the sequencing
/// itself can be unit-tested against a fake.
pub trait ForkOps {
    /// Fork the calling process.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying `fork(2)` call fails.
    fn fork(&self) -> nix::Result<ForkResult>;

    /// Start a new session, detaching from the controlling terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying `setsid(2)` call fails.
    fn setsid(&self) -> nix::Result<Pid>;

    /// Terminate the calling process immediately, as the intermediate
    /// parents in the double fork do once their child has been spawned.
    fn exit_now(&self) -> !;
}

/// Real `nix`-backed [`ForkOps`].
pub struct SystemForkOps;

impl ForkOps for SystemForkOps {
    fn fork(&self) -> nix::Result<ForkResult> {
        // SAFETY: daemonize() is called once, at process startup, before
        // any other threads exist (the supervisor invokes it ahead of
        // building the tokio runtime) — the narrow async-signal-safety
        // requirements of `fork(2)` in a multithreaded process don't apply
        // here.
        #[allow(unsafe_code)]
        unsafe {
            nix::unistd::fork()
        }
    }

    fn setsid(&self) -> nix::Result<Pid> {
        nix::unistd::setsid()
    }

    fn exit_now(&self) -> ! {
        std::process::exit(0)
    }
}

/// Daemonize the current process via the standard double-fork/`setsid`
/// sequence, using the real `nix` syscalls.
///
/// # Errors
///
/// Returns an error if either fork or the `setsid` call fails.
pub fn daemonize() -> AppResult<()> {
    daemonize_with(&SystemForkOps)
}

/// Run the double-fork sequence against an arbitrary [`ForkOps`]
/// implementation.
///
/// # Errors
///
/// Returns an error if either fork or the `setsid` call fails. The first
/// fork failure is surfaced before `setsid` runs at all; the second is
/// surfaced only after `setsid` has already run.
pub fn daemonize_with(ops: &dyn ForkOps) -> AppResult<()> {
    match ops.fork()? {
        ForkResult::Parent { .. } => ops.exit_now(),
        ForkResult::Child => {}
    }

    ops.setsid()?;

    match ops.fork()? {
        ForkResult::Parent { .. } => ops.exit_now(),
        ForkResult::Child => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, PartialEq, Eq)]
    enum Call {
        Fork,
        Setsid,
    }

    struct FakeForkOps {
        calls: RefCell<Vec<Call>>,
        fail_fork_at: Option<usize>,
    }

    impl FakeForkOps {
        fn new(fail_fork_at: Option<usize>) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                fail_fork_at,
            }
        }

        fn fork_count(&self) -> usize {
            self.calls.borrow().iter().filter(|c| **c == Call::Fork).count()
        }
    }

    impl ForkOps for FakeForkOps {
        fn fork(&self) -> nix::Result<ForkResult> {
            let index = self.fork_count();
            self.calls.borrow_mut().push(Call::Fork);
            if self.fail_fork_at == Some(index) {
                return Err(nix::errno::Errno::EAGAIN);
            }
            // Pretend to always be the child: the sequencing under test
            // doesn't depend on which branch runs next in the real parent.
            Ok(ForkResult::Child)
        }

        fn setsid(&self) -> nix::Result<Pid> {
            self.calls.borrow_mut().push(Call::Setsid);
            Ok(Pid::this())
        }

        fn exit_now(&self) -> ! {
            panic!("fake child path never exits the test process");
        }
    }

    #[test]
    fn first_fork_failure_is_fatal_before_setsid_runs() {
        let ops = FakeForkOps::new(Some(0));
        let err = daemonize_with(&ops).unwrap_err();
        assert!(err.to_string().contains("EAGAIN") || !err.to_string().is_empty());
        assert!(!ops.calls.borrow().contains(&Call::Setsid));
    }

    #[test]
    fn second_fork_failure_is_fatal_only_after_setsid_ran() {
        let ops = FakeForkOps::new(Some(1));
        let err = daemonize_with(&ops);
        assert!(err.is_err());
        assert!(ops.calls.borrow().contains(&Call::Setsid));
        assert_eq!(ops.fork_count(), 2);
    }

    #[test]
    fn success_runs_both_forks_and_setsid_in_order() {
        let ops = FakeForkOps::new(None);
        daemonize_with(&ops).unwrap();
        assert_eq!(*ops.calls.borrow(), vec![Call::Fork, Call::Setsid, Call::Fork]);
    }
}

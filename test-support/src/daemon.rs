//! Daemon double that blocks until asked to stop.

use inetsvc::daemon::Daemon;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct Run {
    started: bool,
    stop_requested: bool,
    args: Vec<String>,
}

/// Records how it was driven and returns a fixed status once stopped.
#[derive(Debug, Default)]
pub struct FakeDaemon {
    run: Mutex<Run>,
    changed: Condvar,
    starts: AtomicUsize,
    stops: AtomicUsize,
    exit_status: i32,
}

impl FakeDaemon {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Daemon whose `start` returns `status` after stopping.
    #[must_use]
    pub fn exiting_with(status: i32) -> Self {
        Self {
            exit_status: status,
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, Run> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of `request_stop` calls.
    #[must_use]
    pub fn stop_requests(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Arguments passed to the last `start`.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        self.lock().args.clone()
    }

    /// Block until `start` has been entered or `timeout` passes.
    #[must_use]
    pub fn wait_until_started(&self, timeout: Duration) -> bool {
        let run = self.lock();
        let (run, _) = self
            .changed
            .wait_timeout_while(run, timeout, |r| !r.started)
            .unwrap_or_else(PoisonError::into_inner);
        run.started
    }
}

impl Daemon for FakeDaemon {
    fn start(&self, args: &[String]) -> i32 {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let mut run = self.lock();
        run.started = true;
        run.args = args.to_vec();
        self.changed.notify_all();
        let _run = self
            .changed
            .wait_while(run, |r| !r.stop_requested)
            .unwrap_or_else(PoisonError::into_inner);
        self.exit_status
    }

    fn request_stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.lock().stop_requested = true;
        self.changed.notify_all();
    }
}

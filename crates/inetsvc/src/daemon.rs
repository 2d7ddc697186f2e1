//! The daemon driven by the lifecycle.
//!
//! The shim only needs two things from the daemon: a blocking entry point
//! and a way to ask it to stop. [`CommandDaemon`] provides both by running a
//! configured program as a child process.

use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::logging::{LogLevel, ServiceLog};

/// A long-running daemon controlled by the lifecycle.
pub trait Daemon: Send + Sync {
    /// Run until stopped and return the final status.
    ///
    /// `args` holds the process arguments, program name first.
    fn start(&self, args: &[String]) -> i32;

    /// Ask a running daemon to stop. Returns immediately; repeated requests
    /// are harmless.
    fn request_stop(&self);
}

/// Interval at which a running child is checked for exit or stop requests.
const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs the configured daemon program as a child process.
///
/// The child receives the configured arguments followed by every forwarded
/// process argument after the program name. A stop request kills the child,
/// and a run ended that way counts as a graceful stop.
#[derive(Debug)]
pub struct CommandDaemon {
    program: Option<PathBuf>,
    base_args: Vec<String>,
    stop_requested: AtomicBool,
    poll_interval: Duration,
    log: ServiceLog,
}

impl CommandDaemon {
    #[must_use]
    pub fn new(program: Option<PathBuf>, base_args: Vec<String>, log: ServiceLog) -> Self {
        Self {
            program,
            base_args,
            stop_requested: AtomicBool::new(false),
            poll_interval: CHILD_POLL_INTERVAL,
            log,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config, log: ServiceLog) -> Self {
        Self::new(config.daemon_program.clone(), config.daemon_args.clone(), log)
    }

    /// Override how often the child is polled.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn spawn(&self, args: &[String]) -> std::io::Result<Child> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| std::io::Error::other("no daemon program configured"))?;
        Command::new(program)
            .args(&self.base_args)
            .args(args.iter().skip(1))
            .spawn()
    }

    fn wait(&self, mut child: Child) -> i32 {
        let mut killed = false;
        loop {
            if !killed && self.stop_requested.load(Ordering::SeqCst) {
                if let Err(e) = child.kill() {
                    tracing::warn!(error = %e, "Failed to kill daemon process");
                }
                killed = true;
            }
            match child.try_wait() {
                Ok(Some(status)) => return self.final_status(status),
                Ok(None) => thread::sleep(self.poll_interval),
                Err(e) => {
                    self.log
                        .log(LogLevel::Error, &format!("Waiting for daemon failed: {e}"));
                    return e.raw_os_error().unwrap_or(1);
                }
            }
        }
    }

    fn final_status(&self, status: ExitStatus) -> i32 {
        if self.stop_requested.load(Ordering::SeqCst) {
            self.log.log(LogLevel::Message, "Daemon stopped on request");
            return 0;
        }
        let code = status.code().unwrap_or(1);
        if code != 0 {
            self.log
                .log(LogLevel::Warning, &format!("Daemon exited with status {code}"));
        }
        code
    }
}

impl Daemon for CommandDaemon {
    fn start(&self, args: &[String]) -> i32 {
        match self.spawn(args) {
            Ok(child) => {
                tracing::info!(pid = child.id(), "Daemon process started");
                self.wait(child)
            }
            Err(e) => {
                self.log
                    .log(LogLevel::Error, &format!("Starting daemon failed: {e}"));
                e.raw_os_error().unwrap_or(1)
            }
        }
    }

    fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }
}

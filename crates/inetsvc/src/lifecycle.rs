//! Startup and shutdown sequencing around the daemon.
//!
//! A supervised run registers with the service manager, reports
//! `start_pending` and `running`, blocks in the daemon's entry point and
//! finally reports `stopped` with the daemon's status. Control requests are
//! handled concurrently on a dedicated thread. A detached run performs the
//! same sequence against an in-memory reporter.

use inetsvc_lib::{ExitCode, ServiceState};
use std::io;
use std::sync::Arc;
use std::thread;
use thiserror::Error;

use crate::config::Config;
use crate::daemon::Daemon;
use crate::dispatcher::{ControlDispatcher, control_channel, run_control_loop};
use crate::logging::ServiceLog;
use crate::platform::{PlatformError, Supervisor};
use crate::reporter::StatusReporter;

/// Name of the thread applying control requests.
const CONTROL_THREAD_NAME: &str = "service-control";

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The service manager refused the registration; nothing ran.
    #[error("registration with the service manager failed: {0}")]
    Registration(#[source] PlatformError),
    #[error(transparent)]
    Runtime(#[from] io::Error),
}

/// Wait hints sent with pending reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleSettings {
    pub start_wait_hint_ms: u32,
    pub stop_wait_hint_ms: u32,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            start_wait_hint_ms: 4000,
            stop_wait_hint_ms: 4000,
        }
    }
}

impl From<&Config> for LifecycleSettings {
    fn from(config: &Config) -> Self {
        Self {
            start_wait_hint_ms: u32::try_from(config.start_wait_hint_ms).unwrap_or(u32::MAX),
            stop_wait_hint_ms: u32::try_from(config.stop_wait_hint_ms).unwrap_or(u32::MAX),
        }
    }
}

/// One run of the daemon together with the status it reports.
pub struct Lifecycle<D: ?Sized> {
    reporter: Arc<StatusReporter>,
    daemon: Arc<D>,
    settings: LifecycleSettings,
}

impl<D: Daemon + ?Sized> Lifecycle<D> {
    #[must_use]
    pub fn new(reporter: Arc<StatusReporter>, daemon: Arc<D>, settings: LifecycleSettings) -> Self {
        Self {
            reporter,
            daemon,
            settings,
        }
    }

    /// Lifecycle without a service manager behind it.
    #[must_use]
    pub fn detached(daemon: Arc<D>, settings: LifecycleSettings) -> Self {
        Self::new(Arc::new(StatusReporter::detached()), daemon, settings)
    }

    /// Dispatcher applying controls to this lifecycle.
    #[must_use]
    pub fn dispatcher(&self) -> ControlDispatcher<D> {
        ControlDispatcher::new(
            Arc::clone(&self.reporter),
            Arc::clone(&self.daemon),
            self.settings.stop_wait_hint_ms,
        )
    }

    #[must_use]
    pub fn reporter(&self) -> &StatusReporter {
        &self.reporter
    }

    /// Run the daemon to completion and return its status.
    ///
    /// Status reports are best effort: a failed push is logged by the
    /// reporter and the sequence carries on.
    pub fn run(&self, args: &[String]) -> i32 {
        self.reporter.report(
            ServiceState::StartPending,
            ExitCode::SUCCESS,
            self.settings.start_wait_hint_ms,
        );
        self.reporter
            .report(ServiceState::Running, ExitCode::SUCCESS, 0);
        tracing::info!("Daemon starting");
        let status = self.daemon.start(args);
        tracing::info!(status, "Daemon returned");
        self.reporter.report(
            ServiceState::Stopped,
            ExitCode::from_daemon_status(status),
            0,
        );
        status
    }
}

/// Run the daemon as a registered service.
///
/// # Errors
/// Returns [`LifecycleError::Registration`] when the service manager
/// refuses the registration, in which case the daemon never starts, and
/// [`LifecycleError::Runtime`] when the control thread cannot be spawned.
pub fn run_supervised<S, D>(
    supervisor: &S,
    service_name: &str,
    daemon: Arc<D>,
    args: &[String],
    settings: LifecycleSettings,
) -> Result<i32, LifecycleError>
where
    S: Supervisor + ?Sized,
    D: Daemon + ?Sized + 'static,
{
    let log = ServiceLog::enabled();
    let (controls, receiver) = control_channel();
    let handle = supervisor
        .register(service_name, controls.clone())
        .map_err(|e| {
            log.os_error("Registering the control handler failed", &e);
            LifecycleError::Registration(e)
        })?;

    let lifecycle = Lifecycle::new(
        Arc::new(StatusReporter::attached(handle, log)),
        daemon,
        settings,
    );
    let dispatcher = lifecycle.dispatcher();
    let control_thread = match thread::Builder::new()
        .name(CONTROL_THREAD_NAME.to_owned())
        .spawn(move || run_control_loop(receiver, &dispatcher))
    {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(error = %e, "Failed to spawn control thread");
            lifecycle.reporter().report(
                ServiceState::Stopped,
                ExitCode::from_daemon_status(e.raw_os_error().unwrap_or(1)),
                0,
            );
            return Err(e.into());
        }
    };

    let status = lifecycle.run(args);
    controls.shutdown();
    if control_thread.join().is_err() {
        tracing::error!("Control thread panicked");
    }
    Ok(status)
}

/// Everything the platform dispatcher needs to start the service later.
pub struct ServiceEntry {
    pub service_name: String,
    pub daemon: Arc<dyn Daemon>,
    pub args: Vec<String>,
    pub settings: LifecycleSettings,
}

impl ServiceEntry {
    /// Run the entry against `supervisor`.
    ///
    /// # Errors
    /// See [`run_supervised`].
    pub fn run<S: Supervisor + ?Sized>(&self, supervisor: &S) -> Result<i32, LifecycleError> {
        run_supervised(
            supervisor,
            &self.service_name,
            Arc::clone(&self.daemon),
            &self.args,
            self.settings,
        )
    }
}

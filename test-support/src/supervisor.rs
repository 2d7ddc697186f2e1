//! In-memory service manager session.
//!
//! [`FakeSupervisor`] records every status report and keeps the control
//! sender handed over at registration, so tests can deliver controls the
//! way the service manager would.

use inetsvc::dispatcher::ControlSender;
use inetsvc::platform::{ControlHandle, PlatformError, Supervisor};
use inetsvc_lib::{Control, ServiceState, ServiceStatus};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// OS code returned for refused registrations.
pub const ERROR_FAILED_SERVICE_CONTROLLER_CONNECT: i32 = 1063;

#[derive(Debug, Default)]
struct Session {
    reports: Mutex<Vec<ServiceStatus>>,
    changed: Condvar,
    controls: Mutex<Option<ControlSender>>,
    refuse_registration: AtomicBool,
    fail_reports: AtomicBool,
    registrations: AtomicUsize,
}

/// Supervisor double shared between the test and the service run.
#[derive(Debug, Clone, Default)]
pub struct FakeSupervisor {
    session: Arc<Session>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeSupervisor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Supervisor refusing every registration.
    #[must_use]
    pub fn refusing() -> Self {
        let supervisor = Self::default();
        supervisor.set_refuse_registration(true);
        supervisor
    }

    pub fn set_refuse_registration(&self, refuse: bool) {
        self.session
            .refuse_registration
            .store(refuse, Ordering::SeqCst);
    }

    /// Make every status push fail. Reports are still recorded.
    pub fn set_fail_reports(&self, fail: bool) {
        self.session.fail_reports.store(fail, Ordering::SeqCst);
    }

    /// Successful registrations so far.
    #[must_use]
    pub fn registrations(&self) -> usize {
        self.session.registrations.load(Ordering::SeqCst)
    }

    /// Every status pushed, in order.
    #[must_use]
    pub fn reports(&self) -> Vec<ServiceStatus> {
        lock(&self.session.reports).clone()
    }

    /// States of every status pushed, in order.
    #[must_use]
    pub fn states(&self) -> Vec<ServiceState> {
        self.reports().iter().map(|s| s.current_state).collect()
    }

    /// Block until `state` has been reported or `timeout` passes.
    ///
    /// Returns whether the state was seen.
    #[must_use]
    pub fn wait_for_state(&self, state: ServiceState, timeout: Duration) -> bool {
        let reports = lock(&self.session.reports);
        let (reports, _) = self
            .session
            .changed
            .wait_timeout_while(reports, timeout, |r| {
                !r.iter().any(|s| s.current_state == state)
            })
            .unwrap_or_else(PoisonError::into_inner);
        reports.iter().any(|s| s.current_state == state)
    }

    /// Deliver `control` as the service manager would.
    ///
    /// Returns `false` when nothing is registered or the service has
    /// stopped listening.
    #[must_use]
    pub fn post(&self, control: Control) -> bool {
        lock(&self.session.controls)
            .as_ref()
            .is_some_and(|controls| controls.post(control))
    }
}

impl Supervisor for FakeSupervisor {
    fn register(
        &self,
        _service_name: &str,
        controls: ControlSender,
    ) -> Result<Box<dyn ControlHandle>, PlatformError> {
        if self.session.refuse_registration.load(Ordering::SeqCst) {
            return Err(PlatformError::call(
                "register control handler",
                io::Error::from_raw_os_error(ERROR_FAILED_SERVICE_CONTROLLER_CONNECT),
            ));
        }
        *lock(&self.session.controls) = Some(controls);
        self.session.registrations.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeHandle(Arc::clone(&self.session))))
    }
}

struct FakeHandle(Arc<Session>);

impl ControlHandle for FakeHandle {
    fn set_status(&self, status: &ServiceStatus) -> Result<(), PlatformError> {
        lock(&self.0.reports).push(*status);
        self.0.changed.notify_all();
        if self.0.fail_reports.load(Ordering::SeqCst) {
            return Err(PlatformError::call(
                "set service status",
                io::Error::from_raw_os_error(6),
            ));
        }
        Ok(())
    }
}

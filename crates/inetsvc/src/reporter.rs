//! Status reporting towards the service manager.
//!
//! [`StatusReporter`] owns the one [`ServiceStatus`] snapshot of the process
//! and its checkpoint counter. The control thread and the lifecycle thread
//! both report through it, so every update and push happens under a single
//! lock.

use inetsvc_lib::{AcceptedControls, ExitCode, ServiceState, ServiceStatus};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::logging::ServiceLog;
use crate::platform::ControlHandle;

/// First checkpoint value handed out in a pending state.
const FIRST_CHECKPOINT: u32 = 1;

struct Reported {
    status: ServiceStatus,
    next_checkpoint: u32,
}

impl Reported {
    fn apply(&mut self, state: ServiceState, exit: ExitCode, wait_hint_ms: u32) {
        let status = &mut self.status;
        status.current_state = state;
        status.accepted_controls = AcceptedControls::for_state(state);
        status.win32_exit_code = exit.win32;
        status.service_specific_exit_code = exit.service_specific;
        status.wait_hint_ms = wait_hint_ms;
        status.checkpoint = if state.is_pending() {
            let checkpoint = self.next_checkpoint;
            self.next_checkpoint = self.next_checkpoint.wrapping_add(1);
            checkpoint
        } else {
            0
        };
    }
}

/// Guarded status snapshot plus the handle used to publish it.
///
/// A detached reporter (debug runs) tracks the snapshot in memory only and
/// every report trivially succeeds.
pub struct StatusReporter {
    handle: Option<Box<dyn ControlHandle>>,
    reported: Mutex<Reported>,
    log: ServiceLog,
}

impl StatusReporter {
    /// Reporter publishing through a registered control session.
    #[must_use]
    pub fn attached(handle: Box<dyn ControlHandle>, log: ServiceLog) -> Self {
        Self::with_handle(Some(handle), log)
    }

    /// Reporter with no service manager behind it.
    #[must_use]
    pub fn detached() -> Self {
        Self::with_handle(None, ServiceLog::disabled())
    }

    fn with_handle(handle: Option<Box<dyn ControlHandle>>, log: ServiceLog) -> Self {
        Self {
            handle,
            reported: Mutex::new(Reported {
                status: ServiceStatus::initial(),
                next_checkpoint: FIRST_CHECKPOINT,
            }),
            log,
        }
    }

    /// Record a new state and publish it.
    ///
    /// Returns `false` when the push to the service manager failed. The
    /// failure is logged and the in-memory snapshot is updated regardless.
    pub fn report(&self, state: ServiceState, exit: ExitCode, wait_hint_ms: u32) -> bool {
        let mut reported = self.lock();
        reported.apply(state, exit, wait_hint_ms);
        self.push(&reported.status)
    }

    /// Publish the current snapshot again without touching it.
    pub fn refresh(&self) -> bool {
        let reported = self.lock();
        self.push(&reported.status)
    }

    /// Move from `running` to `stop_pending` and publish, atomically.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub(crate) fn begin_stop(&self, wait_hint_ms: u32) -> bool {
        let mut reported = self.lock();
        if reported.status.current_state != ServiceState::Running {
            return false;
        }
        reported.apply(ServiceState::StopPending, ExitCode::SUCCESS, wait_hint_ms);
        self.push(&reported.status);
        true
    }

    /// Copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ServiceStatus {
        self.lock().status
    }

    fn push(&self, status: &ServiceStatus) -> bool {
        let Some(handle) = &self.handle else {
            return true;
        };
        match handle.set_status(status) {
            Ok(()) => true,
            Err(e) => {
                self.log.os_error("Status report failed", &e);
                false
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Reported> {
        self.reported
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

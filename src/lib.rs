//! Shared types for the inetsvc service shim.
//!
//! This library defines the vocabulary exchanged between the lifecycle
//! runner, the service manager backends and the installer: service states,
//! control requests, the reported status snapshot and the invocation mode.

use serde::{Deserialize, Serialize};

pub mod descriptor;

pub use descriptor::{FailureAction, FailureActionKind, ResetPeriod, ServiceDescriptor, StartMode};

/// Name under which the service is registered with the service manager.
pub const SERVICE_NAME: &str = "inetsvc";

/// Human-readable description stored alongside the service registration.
pub const SERVICE_DESCRIPTION: &str = "Inetd-style network daemon";

/// Subsystems the daemon needs before it can accept connections: the TCP/IP
/// stack and the ancillary function driver for sockets.
pub const SERVICE_DEPENDENCIES: [&str; 2] = ["Tcpip", "Afd"];

/// Version string printed in the startup banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Win32 exit code signalling that `service_specific_exit_code` carries the
/// real status.
pub const ERROR_SERVICE_SPECIFIC_ERROR: u32 = 1066;

/// Lifecycle state reported to the service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    StartPending,
    Running,
    StopPending,
    Stopped,
}

impl ServiceState {
    /// Whether the state is transitional and therefore carries a checkpoint.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::StartPending | Self::StopPending)
    }
}

/// A control request delivered by the service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Stop,
    Interrogate,
    /// Any other control code; answered with a status refresh.
    Other(u32),
}

/// Controls the service is currently prepared to accept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedControls {
    stop: bool,
}

impl AcceptedControls {
    /// No controls accepted; used while the service is starting.
    #[must_use]
    pub const fn none() -> Self {
        Self { stop: false }
    }

    /// Only the stop control is accepted.
    #[must_use]
    pub const fn stop() -> Self {
        Self { stop: true }
    }

    /// Controls accepted while in `state`.
    #[must_use]
    pub const fn for_state(state: ServiceState) -> Self {
        match state {
            ServiceState::StartPending => Self::none(),
            _ => Self::stop(),
        }
    }

    #[must_use]
    pub const fn accepts_stop(self) -> bool {
        self.stop
    }
}

/// Snapshot of the status last reported to the service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub current_state: ServiceState,
    pub accepted_controls: AcceptedControls,
    pub win32_exit_code: u32,
    pub wait_hint_ms: u32,
    pub checkpoint: u32,
    pub service_specific_exit_code: u32,
}

impl ServiceStatus {
    /// Status of a process that has not reported anything yet.
    #[must_use]
    pub const fn initial() -> Self {
        Self {
            current_state: ServiceState::StartPending,
            accepted_controls: AcceptedControls::none(),
            win32_exit_code: 0,
            wait_hint_ms: 0,
            checkpoint: 0,
            service_specific_exit_code: 0,
        }
    }
}

impl Default for ServiceStatus {
    fn default() -> Self {
        Self::initial()
    }
}

/// Exit code pair reported with a status update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitCode {
    pub win32: u32,
    pub service_specific: u32,
}

impl ExitCode {
    /// Successful termination.
    pub const SUCCESS: Self = Self {
        win32: 0,
        service_specific: 0,
    };

    /// Map the daemon's final status onto the service manager's exit codes.
    ///
    /// Non-negative statuses are passed through as Win32 codes. Negative
    /// statuses cannot be expressed that way and are reported as a
    /// service-specific error carrying their magnitude.
    ///
    /// # Examples
    /// ```
    /// use inetsvc_lib::{ExitCode, ERROR_SERVICE_SPECIFIC_ERROR};
    ///
    /// assert_eq!(ExitCode::from_daemon_status(0), ExitCode::SUCCESS);
    /// let code = ExitCode::from_daemon_status(-2);
    /// assert_eq!(code.win32, ERROR_SERVICE_SPECIFIC_ERROR);
    /// assert_eq!(code.service_specific, 2);
    /// ```
    #[must_use]
    pub fn from_daemon_status(status: i32) -> Self {
        match u32::try_from(status) {
            Ok(win32) => Self {
                win32,
                service_specific: 0,
            },
            Err(_) => Self {
                win32: ERROR_SERVICE_SPECIFIC_ERROR,
                service_specific: status.unsigned_abs(),
            },
        }
    }
}

/// How the process was invoked. Derived once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Install,
    Remove,
    /// Foreground execution; carries the arguments forwarded to the daemon.
    Debug(Vec<String>),
    Supervised,
}

impl RunMode {
    #[must_use]
    pub const fn is_debug(&self) -> bool {
        matches!(self, Self::Debug(_))
    }
}

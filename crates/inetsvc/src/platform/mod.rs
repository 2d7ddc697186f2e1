//! Seams between the shim and the operating system's service manager.
//!
//! The traits here are implemented by the Windows backend in production and by
//! in-memory fakes in tests. Other platforms get a backend that reports
//! [`PlatformError::Unsupported`] for every call; foreground debug runs do not
//! need one.

use inetsvc_lib::{FailureAction, ServiceDescriptor, ServiceState, ServiceStatus};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::dispatcher::ControlSender;

#[cfg(windows)]
mod scm;
#[cfg(not(windows))]
mod unsupported;

#[cfg(windows)]
pub use scm::{ScmManager, connect, event_log, run_dispatcher};
#[cfg(not(windows))]
pub use unsupported::{NoService, NoServiceManager, connect, event_log, run_dispatcher};

/// Errors raised by service manager calls.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// A call into the service manager failed with an OS error.
    #[error("{operation} failed - {}", describe_os_error(.source))]
    Call {
        operation: &'static str,
        #[source]
        source: io::Error,
    },
    /// No service manager backend exists for this platform.
    #[error("service manager is not available on this platform")]
    Unsupported,
}

impl PlatformError {
    /// Wrap an OS error raised by `operation`.
    #[must_use]
    pub const fn call(operation: &'static str, source: io::Error) -> Self {
        Self::Call { operation, source }
    }

    /// Raw OS error code, or zero when none is available.
    #[must_use]
    pub fn os_code(&self) -> u32 {
        match self {
            Self::Call { source, .. } => source
                .raw_os_error()
                .and_then(|c| u32::try_from(c).ok())
                .unwrap_or(0),
            Self::Unsupported => 0,
        }
    }
}

/// Render an OS error as its decoded text followed by the hex code.
///
/// # Examples
/// ```
/// use inetsvc::platform::describe_os_error;
/// use std::io;
///
/// let text = describe_os_error(&io::Error::from_raw_os_error(5));
/// assert!(text.ends_with("(0x5)"));
/// ```
#[must_use]
pub fn describe_os_error(err: &io::Error) -> String {
    match err.raw_os_error() {
        Some(code) => format!("{err} (0x{code:x})"),
        None => err.to_string(),
    }
}

/// Token for a registered control session; every status report goes
/// through it.
pub trait ControlHandle: Send + Sync {
    /// Push `status` to the service manager.
    ///
    /// # Errors
    /// Returns the OS error raised by the service manager.
    fn set_status(&self, status: &ServiceStatus) -> Result<(), PlatformError>;
}

/// Connection point through which a service process registers itself.
pub trait Supervisor {
    /// Register `service_name`, routing control requests into `controls`.
    ///
    /// # Errors
    /// Fails when the service manager refuses the registration; the run
    /// cannot continue in that case.
    fn register(
        &self,
        service_name: &str,
        controls: ControlSender,
    ) -> Result<Box<dyn ControlHandle>, PlatformError>;
}

/// The service manager's persistent configuration store.
pub trait ServiceManager {
    type Service: ManagedService;

    /// Create the registration described by `descriptor` for `executable`.
    ///
    /// # Errors
    /// Returns the OS error raised while creating the entry.
    fn create_service(
        &self,
        descriptor: &ServiceDescriptor,
        executable: &Path,
    ) -> Result<Self::Service, PlatformError>;

    /// Open an existing registration by name.
    ///
    /// # Errors
    /// Returns the OS error raised while opening the entry.
    fn open_service(&self, name: &str) -> Result<Self::Service, PlatformError>;
}

/// Operations on a single registered service. Every call surfaces the OS
/// error raised by the service manager.
pub trait ManagedService {
    fn set_description(&self, description: &str) -> Result<(), PlatformError>;
    fn set_failure_action(&self, action: &FailureAction) -> Result<(), PlatformError>;
    /// Apply the failure action on clean exits with a non-zero status too.
    fn set_failure_actions_on_non_crash_failures(&self, enabled: bool)
    -> Result<(), PlatformError>;
    fn start(&self) -> Result<(), PlatformError>;
    /// Send the stop control, returning the state reported in response.
    fn stop(&self) -> Result<ServiceState, PlatformError>;
    fn query_state(&self) -> Result<ServiceState, PlatformError>;
    fn delete(&self) -> Result<(), PlatformError>;
}

/// Sink for operator-facing error entries in the platform event log.
pub trait EventLog: Send + Sync {
    fn report_error(&self, code: u32, message: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_error_names_the_operation() {
        let err = PlatformError::call("delete service", io::Error::from_raw_os_error(2));
        let text = err.to_string();
        assert!(text.starts_with("delete service failed - "));
        assert!(text.ends_with("(0x2)"));
        assert_eq!(err.os_code(), 2);
    }

    #[test]
    fn synthetic_errors_have_no_code() {
        let err = PlatformError::call("query status", io::Error::other("boom"));
        assert_eq!(err.to_string(), "query status failed - boom");
        assert_eq!(err.os_code(), 0);
        assert_eq!(PlatformError::Unsupported.os_code(), 0);
    }
}

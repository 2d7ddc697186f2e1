//! Backend for platforms without a supported service manager.
//!
//! The manager and service types are uninhabited: [`connect`] never yields
//! one, so their trait methods can never be reached.

use inetsvc_lib::{FailureAction, ServiceDescriptor, ServiceState};
use std::path::Path;

use super::{EventLog, ManagedService, PlatformError, ServiceManager};
use crate::lifecycle::ServiceEntry;

/// Stand-in for a service manager connection that cannot exist.
#[derive(Debug)]
pub enum NoServiceManager {}

/// Stand-in for a registered service that cannot exist.
#[derive(Debug)]
pub enum NoService {}

/// Always fails: there is no service manager to connect to.
///
/// # Errors
/// Returns [`PlatformError::Unsupported`].
pub fn connect() -> Result<NoServiceManager, PlatformError> {
    Err(PlatformError::Unsupported)
}

/// Always fails: there is no dispatcher to hand the process to.
///
/// # Errors
/// Returns [`PlatformError::Unsupported`].
pub fn run_dispatcher(entry: ServiceEntry) -> Result<(), PlatformError> {
    drop(entry);
    Err(PlatformError::Unsupported)
}

/// No platform event log is available.
#[must_use]
pub fn event_log(_source: &str) -> Option<Box<dyn EventLog>> {
    None
}

impl ServiceManager for NoServiceManager {
    type Service = NoService;

    fn create_service(
        &self,
        _descriptor: &ServiceDescriptor,
        _executable: &Path,
    ) -> Result<NoService, PlatformError> {
        match *self {}
    }

    fn open_service(&self, _name: &str) -> Result<NoService, PlatformError> {
        match *self {}
    }
}

impl ManagedService for NoService {
    fn set_description(&self, _description: &str) -> Result<(), PlatformError> {
        match *self {}
    }

    fn set_failure_action(&self, _action: &FailureAction) -> Result<(), PlatformError> {
        match *self {}
    }

    fn set_failure_actions_on_non_crash_failures(
        &self,
        _enabled: bool,
    ) -> Result<(), PlatformError> {
        match *self {}
    }

    fn start(&self) -> Result<(), PlatformError> {
        match *self {}
    }

    fn stop(&self) -> Result<ServiceState, PlatformError> {
        match *self {}
    }

    fn query_state(&self) -> Result<ServiceState, PlatformError> {
        match *self {}
    }

    fn delete(&self) -> Result<(), PlatformError> {
        match *self {}
    }
}

//! Windows Service Control Manager backend.
//!
//! Wraps `windows-service` for registration, status reporting and the
//! configuration store, and `windows-sys` for event log entries.

use inetsvc_lib::{
    Control, ERROR_SERVICE_SPECIFIC_ERROR, FailureAction, FailureActionKind, ResetPeriod,
    ServiceDescriptor, ServiceState, ServiceStatus, StartMode,
};
use std::ffi::{OsStr, OsString};
use std::io;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use windows_service::service::{
    ServiceAccess, ServiceAction, ServiceActionType, ServiceControl, ServiceControlAccept,
    ServiceDependency, ServiceErrorControl, ServiceExitCode, ServiceFailureActions,
    ServiceFailureResetPeriod, ServiceInfo, ServiceStartType, ServiceState as ScmState,
    ServiceStatus as ScmStatus, ServiceType,
};
use windows_service::service_control_handler::{
    self, ServiceControlHandlerResult, ServiceStatusHandle,
};
use windows_service::{define_windows_service, service_dispatcher, service_manager};
use windows_sys::Win32::System::EventLog::{
    DeregisterEventSource, EVENTLOG_ERROR_TYPE, RegisterEventSourceW, ReportEventW,
};

use super::{ControlHandle, EventLog, ManagedService, PlatformError, ServiceManager, Supervisor};
use crate::dispatcher::ControlSender;
use crate::lifecycle::ServiceEntry;

/// The dispatcher calls `service_main` through a bare function pointer, so
/// the entry it runs is parked here first.
static ENTRY: OnceLock<ServiceEntry> = OnceLock::new();

define_windows_service!(ffi_service_main, service_main);

fn service_main(_arguments: Vec<OsString>) {
    let Some(entry) = ENTRY.get() else {
        tracing::error!("Service entry missing at dispatch");
        return;
    };
    if let Err(e) = entry.run(&ScmSupervisor) {
        tracing::error!(error = %e, "Service run failed");
    }
}

/// Hand the calling thread to the service control dispatcher.
///
/// Blocks until every service in the process has stopped.
///
/// # Errors
/// Fails when the process was not started by the service manager or the
/// dispatcher was already started.
pub fn run_dispatcher(entry: ServiceEntry) -> Result<(), PlatformError> {
    let name = entry.service_name.clone();
    ENTRY.set(entry).map_err(|_| {
        PlatformError::call(
            "start service dispatcher",
            io::Error::other("dispatcher already started"),
        )
    })?;
    service_dispatcher::start(name, ffi_service_main)
        .map_err(|e| PlatformError::call("start service dispatcher", into_io(e)))
}

/// Open the local service manager with rights to create services.
///
/// # Errors
/// Returns the OS error, typically access denied for unelevated callers.
pub fn connect() -> Result<ScmManager, PlatformError> {
    service_manager::ServiceManager::local_computer(
        None::<&str>,
        service_manager::ServiceManagerAccess::CONNECT
            | service_manager::ServiceManagerAccess::CREATE_SERVICE,
    )
    .map(ScmManager)
    .map_err(|e| PlatformError::call("open service manager", into_io(e)))
}

/// Event log source named after the service.
#[must_use]
pub fn event_log(source: &str) -> Option<Box<dyn EventLog>> {
    Some(Box::new(WindowsEventLog {
        name: source.to_owned(),
        source: wide(OsStr::new(source)),
    }))
}

fn into_io(err: windows_service::Error) -> io::Error {
    match err {
        windows_service::Error::Winapi(e) => e,
        other => io::Error::other(other.to_string()),
    }
}

fn wide(text: &OsStr) -> Vec<u16> {
    text.encode_wide().chain(std::iter::once(0)).collect()
}

fn service_access() -> ServiceAccess {
    ServiceAccess::QUERY_STATUS
        | ServiceAccess::START
        | ServiceAccess::STOP
        | ServiceAccess::CHANGE_CONFIG
        | ServiceAccess::DELETE
}

fn from_scm_state(state: ScmState) -> ServiceState {
    match state {
        ScmState::Stopped => ServiceState::Stopped,
        ScmState::StartPending => ServiceState::StartPending,
        ScmState::StopPending => ServiceState::StopPending,
        _ => ServiceState::Running,
    }
}

fn to_scm_state(state: ServiceState) -> ScmState {
    match state {
        ServiceState::StartPending => ScmState::StartPending,
        ServiceState::Running => ScmState::Running,
        ServiceState::StopPending => ScmState::StopPending,
        ServiceState::Stopped => ScmState::Stopped,
    }
}

struct ScmSupervisor;

impl Supervisor for ScmSupervisor {
    fn register(
        &self,
        service_name: &str,
        controls: ControlSender,
    ) -> Result<Box<dyn ControlHandle>, PlatformError> {
        let handler = move |event: ServiceControl| -> ServiceControlHandlerResult {
            let control = match event {
                ServiceControl::Stop => Control::Stop,
                ServiceControl::Interrogate => Control::Interrogate,
                other => Control::Other(other.raw_service_control_type()),
            };
            if !controls.post(control) {
                tracing::warn!(?control, "Control arrived after shutdown");
            }
            ServiceControlHandlerResult::NoError
        };
        let handle = service_control_handler::register(service_name, handler)
            .map_err(|e| PlatformError::call("register control handler", into_io(e)))?;
        Ok(Box::new(ScmHandle(handle)))
    }
}

struct ScmHandle(ServiceStatusHandle);

impl ControlHandle for ScmHandle {
    fn set_status(&self, status: &ServiceStatus) -> Result<(), PlatformError> {
        let controls_accepted = if status.accepted_controls.accepts_stop() {
            ServiceControlAccept::STOP
        } else {
            ServiceControlAccept::empty()
        };
        let exit_code = if status.win32_exit_code == ERROR_SERVICE_SPECIFIC_ERROR {
            ServiceExitCode::ServiceSpecific(status.service_specific_exit_code)
        } else {
            ServiceExitCode::Win32(status.win32_exit_code)
        };
        self.0
            .set_service_status(ScmStatus {
                service_type: ServiceType::OWN_PROCESS,
                current_state: to_scm_state(status.current_state),
                controls_accepted,
                exit_code,
                checkpoint: status.checkpoint,
                wait_hint: Duration::from_millis(u64::from(status.wait_hint_ms)),
                process_id: None,
            })
            .map_err(|e| PlatformError::call("set service status", into_io(e)))
    }
}

/// Connection to the local service manager's configuration store.
pub struct ScmManager(service_manager::ServiceManager);

impl ServiceManager for ScmManager {
    type Service = ScmService;

    fn create_service(
        &self,
        descriptor: &ServiceDescriptor,
        executable: &Path,
    ) -> Result<ScmService, PlatformError> {
        let info = ServiceInfo {
            name: OsString::from(&descriptor.name),
            display_name: OsString::from(&descriptor.display_name),
            service_type: ServiceType::OWN_PROCESS,
            start_type: match descriptor.start_mode {
                StartMode::Auto => ServiceStartType::AutoStart,
                StartMode::Manual => ServiceStartType::OnDemand,
            },
            error_control: ServiceErrorControl::Normal,
            executable_path: executable.to_path_buf(),
            launch_arguments: Vec::new(),
            dependencies: descriptor
                .dependencies
                .iter()
                .map(|d| ServiceDependency::Service(OsString::from(d)))
                .collect(),
            account_name: None,
            account_password: None,
        };
        self.0
            .create_service(&info, service_access())
            .map(ScmService)
            .map_err(|e| PlatformError::call("create service", into_io(e)))
    }

    fn open_service(&self, name: &str) -> Result<ScmService, PlatformError> {
        self.0
            .open_service(name, service_access())
            .map(ScmService)
            .map_err(|e| PlatformError::call("open service", into_io(e)))
    }
}

/// Handle to a registered service.
pub struct ScmService(windows_service::service::Service);

impl ManagedService for ScmService {
    fn set_description(&self, description: &str) -> Result<(), PlatformError> {
        self.0
            .set_description(description)
            .map_err(|e| PlatformError::call("set service description", into_io(e)))
    }

    fn set_failure_action(&self, action: &FailureAction) -> Result<(), PlatformError> {
        let action_type = match action.action {
            FailureActionKind::Restart => ServiceActionType::Restart,
            FailureActionKind::None => ServiceActionType::None,
        };
        let reset_period = match action.reset_period {
            ResetPeriod::Never => ServiceFailureResetPeriod::Never,
            ResetPeriod::After(period) => ServiceFailureResetPeriod::After(period),
        };
        self.0
            .update_failure_actions(ServiceFailureActions {
                reset_period,
                reboot_msg: None,
                command: None,
                actions: Some(vec![ServiceAction {
                    action_type,
                    delay: action.delay,
                }]),
            })
            .map_err(|e| PlatformError::call("set failure actions", into_io(e)))
    }

    fn set_failure_actions_on_non_crash_failures(
        &self,
        enabled: bool,
    ) -> Result<(), PlatformError> {
        self.0
            .set_failure_actions_on_non_crash_failures(enabled)
            .map_err(|e| PlatformError::call("set failure actions flag", into_io(e)))
    }

    fn start(&self) -> Result<(), PlatformError> {
        self.0
            .start::<&OsStr>(&[])
            .map_err(|e| PlatformError::call("start service", into_io(e)))
    }

    fn stop(&self) -> Result<ServiceState, PlatformError> {
        self.0
            .stop()
            .map(|status| from_scm_state(status.current_state))
            .map_err(|e| PlatformError::call("stop service", into_io(e)))
    }

    fn query_state(&self) -> Result<ServiceState, PlatformError> {
        self.0
            .query_status()
            .map(|status| from_scm_state(status.current_state))
            .map_err(|e| PlatformError::call("query service status", into_io(e)))
    }

    fn delete(&self) -> Result<(), PlatformError> {
        self.0
            .delete()
            .map_err(|e| PlatformError::call("delete service", into_io(e)))
    }
}

struct WindowsEventLog {
    name: String,
    source: Vec<u16>,
}

impl EventLog for WindowsEventLog {
    fn report_error(&self, code: u32, message: &str) {
        let header = wide(OsStr::new(&format!("{} error: {code}", self.name)));
        let body = wide(OsStr::new(message));
        let strings = [header.as_ptr(), body.as_ptr()];
        // SAFETY: every pointer refers to a NUL-terminated UTF-16 buffer that
        // outlives the calls, and the source handle is released before return.
        unsafe {
            let handle = RegisterEventSourceW(std::ptr::null(), self.source.as_ptr());
            if handle == 0 {
                return;
            }
            ReportEventW(
                handle,
                EVENTLOG_ERROR_TYPE,
                0,
                0,
                std::ptr::null_mut(),
                2,
                0,
                strings.as_ptr(),
                std::ptr::null(),
            );
            DeregisterEventSource(handle);
        }
    }
}

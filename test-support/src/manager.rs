//! In-memory service configuration store.

use inetsvc::platform::{ManagedService, PlatformError, ServiceManager};
use inetsvc_lib::{FailureAction, ServiceDescriptor, ServiceState};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const ERROR_ACCESS_DENIED: i32 = 5;
const ERROR_SERVICE_DOES_NOT_EXIST: i32 = 1060;
const ERROR_SERVICE_NOT_ACTIVE: i32 = 1062;

/// Calls made against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagerCall {
    Create,
    Open,
    SetDescription,
    SetFailureAction,
    SetFailureActionsFlag,
    Start,
    Stop,
    Query,
    Delete,
}

impl ManagerCall {
    const fn operation(self) -> &'static str {
        match self {
            Self::Create => "create service",
            Self::Open => "open service",
            Self::SetDescription => "set description",
            Self::SetFailureAction => "set failure actions",
            Self::SetFailureActionsFlag => "set failure actions flag",
            Self::Start => "start service",
            Self::Stop => "stop service",
            Self::Query => "query service status",
            Self::Delete => "delete service",
        }
    }
}

#[derive(Debug)]
struct Store {
    registered: bool,
    state: ServiceState,
    stop_pending_polls: u32,
    failing: HashSet<ManagerCall>,
    calls: Vec<ManagerCall>,
    observed: Vec<ServiceState>,
    descriptor: Option<ServiceDescriptor>,
    executable: Option<PathBuf>,
    failure_action: Option<FailureAction>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            registered: false,
            state: ServiceState::Stopped,
            stop_pending_polls: 0,
            failing: HashSet::new(),
            calls: Vec::new(),
            observed: Vec::new(),
            descriptor: None,
            executable: None,
            failure_action: None,
        }
    }
}

impl Store {
    fn enter(&mut self, call: ManagerCall) -> Result<(), PlatformError> {
        self.calls.push(call);
        if self.failing.contains(&call) {
            return Err(os_error(call, ERROR_ACCESS_DENIED));
        }
        Ok(())
    }
}

fn os_error(call: ManagerCall, code: i32) -> PlatformError {
    PlatformError::call(call.operation(), io::Error::from_raw_os_error(code))
}

/// Service manager double; clones share one store.
#[derive(Debug, Clone, Default)]
pub struct FakeServiceManager {
    store: Arc<Mutex<Store>>,
}

impl FakeServiceManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store already holding a registration in `state`.
    #[must_use]
    pub fn with_service(state: ServiceState) -> Self {
        let manager = Self::default();
        {
            let mut store = manager.lock();
            store.registered = true;
            store.state = state;
            store.descriptor = Some(ServiceDescriptor::default());
        }
        manager
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `call` fail with an access-denied error.
    pub fn fail(&self, call: ManagerCall) {
        self.lock().failing.insert(call);
    }

    /// Keep a stopping service in `stop_pending` for `polls` status queries.
    pub fn stop_takes(&self, polls: u32) {
        self.lock().stop_pending_polls = polls;
    }

    /// Connection callback for the installer.
    #[must_use]
    pub fn connector(&self) -> impl FnOnce() -> Result<Self, PlatformError> + use<> {
        let manager = self.clone();
        move || Ok(manager)
    }

    #[must_use]
    pub fn calls(&self) -> Vec<ManagerCall> {
        self.lock().calls.clone()
    }

    #[must_use]
    pub fn called(&self, call: ManagerCall) -> bool {
        self.lock().calls.contains(&call)
    }

    /// States returned by status queries, in order.
    #[must_use]
    pub fn observed_states(&self) -> Vec<ServiceState> {
        self.lock().observed.clone()
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.lock().registered
    }

    #[must_use]
    pub fn state(&self) -> ServiceState {
        self.lock().state
    }

    #[must_use]
    pub fn descriptor(&self) -> Option<ServiceDescriptor> {
        self.lock().descriptor.clone()
    }

    #[must_use]
    pub fn executable(&self) -> Option<PathBuf> {
        self.lock().executable.clone()
    }

    #[must_use]
    pub fn failure_action(&self) -> Option<FailureAction> {
        self.lock().failure_action
    }
}

impl ServiceManager for FakeServiceManager {
    type Service = FakeService;

    fn create_service(
        &self,
        descriptor: &ServiceDescriptor,
        executable: &Path,
    ) -> Result<FakeService, PlatformError> {
        let mut store = self.lock();
        store.enter(ManagerCall::Create)?;
        store.registered = true;
        store.state = ServiceState::Stopped;
        store.descriptor = Some(descriptor.clone());
        store.executable = Some(executable.to_path_buf());
        Ok(FakeService(self.clone()))
    }

    fn open_service(&self, _name: &str) -> Result<FakeService, PlatformError> {
        let mut store = self.lock();
        store.enter(ManagerCall::Open)?;
        if !store.registered {
            return Err(os_error(ManagerCall::Open, ERROR_SERVICE_DOES_NOT_EXIST));
        }
        Ok(FakeService(self.clone()))
    }
}

/// Handle to the registration held by a [`FakeServiceManager`].
#[derive(Debug)]
pub struct FakeService(FakeServiceManager);

impl ManagedService for FakeService {
    fn set_description(&self, _description: &str) -> Result<(), PlatformError> {
        self.0.lock().enter(ManagerCall::SetDescription)
    }

    fn set_failure_action(&self, action: &FailureAction) -> Result<(), PlatformError> {
        let mut store = self.0.lock();
        store.enter(ManagerCall::SetFailureAction)?;
        store.failure_action = Some(*action);
        Ok(())
    }

    fn set_failure_actions_on_non_crash_failures(
        &self,
        _enabled: bool,
    ) -> Result<(), PlatformError> {
        self.0.lock().enter(ManagerCall::SetFailureActionsFlag)
    }

    fn start(&self) -> Result<(), PlatformError> {
        let mut store = self.0.lock();
        store.enter(ManagerCall::Start)?;
        store.state = ServiceState::Running;
        Ok(())
    }

    fn stop(&self) -> Result<ServiceState, PlatformError> {
        let mut store = self.0.lock();
        store.enter(ManagerCall::Stop)?;
        if store.state != ServiceState::Running {
            return Err(os_error(ManagerCall::Stop, ERROR_SERVICE_NOT_ACTIVE));
        }
        store.state = if store.stop_pending_polls > 0 {
            ServiceState::StopPending
        } else {
            ServiceState::Stopped
        };
        Ok(store.state)
    }

    fn query_state(&self) -> Result<ServiceState, PlatformError> {
        let mut store = self.0.lock();
        store.enter(ManagerCall::Query)?;
        if store.state == ServiceState::StopPending {
            if store.stop_pending_polls == 0 {
                store.state = ServiceState::Stopped;
            } else {
                store.stop_pending_polls -= 1;
            }
        }
        let state = store.state;
        store.observed.push(state);
        Ok(state)
    }

    fn delete(&self) -> Result<(), PlatformError> {
        let mut store = self.0.lock();
        store.enter(ManagerCall::Delete)?;
        store.registered = false;
        Ok(())
    }
}

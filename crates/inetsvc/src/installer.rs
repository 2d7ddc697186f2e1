//! Registration and removal of the service.
//!
//! Both operations run once from the console and report every step to the
//! operator. A failing step is printed with its OS error text and ends the
//! operation only when later steps depend on it.

use inetsvc_lib::{ServiceDescriptor, ServiceState};
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use crate::console::say;
use crate::platform::{ManagedService, PlatformError, ServiceManager};

/// A step of [`install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStep {
    ResolvePath,
    Connect,
    Create,
    Description,
    FailureActions,
    FailureActionsFlag,
    Start,
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ResolvePath => "resolving the executable path",
            Self::Connect => "opening the service manager",
            Self::Create => "creating the service",
            Self::Description => "setting the description",
            Self::FailureActions => "setting the failure actions",
            Self::FailureActionsFlag => "enabling failure actions for non-crash failures",
            Self::Start => "starting the service",
        })
    }
}

/// Outcome of every step [`install`] attempted, in order.
#[derive(Debug, Default)]
pub struct InstallReport {
    steps: Vec<(InstallStep, Result<(), PlatformError>)>,
}

impl InstallReport {
    fn record(&mut self, step: InstallStep, result: Result<(), PlatformError>) {
        self.steps.push((step, result));
    }

    /// Steps attempted with their results.
    #[must_use]
    pub fn steps(&self) -> &[(InstallStep, Result<(), PlatformError>)] {
        &self.steps
    }

    /// Result of `step`, if it was attempted.
    #[must_use]
    pub fn outcome(&self, step: InstallStep) -> Option<&Result<(), PlatformError>> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, r)| r)
    }

    /// Whether the registration itself was created.
    #[must_use]
    pub fn created(&self) -> bool {
        matches!(self.outcome(InstallStep::Create), Some(Ok(())))
    }

    /// Process exit code: `-1` when the executable path could not be
    /// resolved, `0` otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.outcome(InstallStep::ResolvePath) {
            Some(Err(_)) => -1,
            _ => 0,
        }
    }

    /// Steps that failed.
    pub fn failures(&self) -> impl Iterator<Item = (InstallStep, &PlatformError)> {
        self.steps
            .iter()
            .filter_map(|(step, r)| r.as_ref().err().map(|e| (*step, e)))
    }
}

/// Register the service described by `descriptor` and start it.
///
/// The description, failure action and failure-action flag are applied
/// independently once the registration exists; a failure in one is
/// reported and the rest still run. The start attempt is reported but never
/// changes the result.
pub fn install<M, C, R>(
    connect: C,
    descriptor: &ServiceDescriptor,
    resolve_exe: R,
    out: &mut dyn Write,
) -> InstallReport
where
    M: ServiceManager,
    C: FnOnce() -> Result<M, PlatformError>,
    R: FnOnce() -> io::Result<PathBuf>,
{
    let name = &descriptor.name;
    let mut report = InstallReport::default();

    let path = match resolve_exe() {
        Ok(path) => path,
        Err(e) => {
            let err = PlatformError::call("resolve executable path", e);
            say(out, format_args!("Unable to install {name} - {err}\n"));
            report.record(InstallStep::ResolvePath, Err(err));
            return report;
        }
    };
    report.record(InstallStep::ResolvePath, Ok(()));

    let manager = match connect() {
        Ok(manager) => manager,
        Err(err) => {
            say(out, format_args!("{err}\n"));
            report.record(InstallStep::Connect, Err(err));
            return report;
        }
    };
    report.record(InstallStep::Connect, Ok(()));

    let service = match manager.create_service(descriptor, &path) {
        Ok(service) => service,
        Err(err) => {
            say(out, format_args!("{err}\n"));
            report.record(InstallStep::Create, Err(err));
            return report;
        }
    };
    report.record(InstallStep::Create, Ok(()));
    tracing::info!(service = %name, path = %path.display(), "Service registered");

    let configuration = [
        (
            InstallStep::Description,
            service.set_description(&descriptor.description),
        ),
        (
            InstallStep::FailureActions,
            service.set_failure_action(&descriptor.failure_action),
        ),
        (
            InstallStep::FailureActionsFlag,
            service.set_failure_actions_on_non_crash_failures(true),
        ),
    ];
    for (step, result) in configuration {
        if let Err(err) = &result {
            say(out, format_args!("Failed {step} - {err}\n"));
        }
        report.record(step, result);
    }
    say(out, format_args!("{name} installed.\n"));

    let started = service.start();
    match &started {
        Ok(()) => say(out, format_args!("{name} started.\n")),
        Err(err) => say(out, format_args!("{err}\n")),
    }
    report.record(InstallStep::Start, started);
    report
}

/// How [`remove`] waits for a running service to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOptions {
    pub poll_interval: Duration,
    /// Stop waiting after this long; `None` waits for as long as the
    /// service stays in `stop_pending`.
    pub timeout: Option<Duration>,
}

impl Default for RemoveOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: None,
        }
    }
}

/// What happened to a running service before deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The service was already stopped; no stop was sent.
    NotRunning,
    Stopped,
    /// The wait ended with the service in another state.
    FailedToStop(ServiceState),
    /// The stop control could not be delivered.
    ControlFailed,
}

/// Summary of a [`remove`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveReport {
    /// `None` when the service could not be reached.
    pub stop: Option<StopOutcome>,
    /// Status queries made while waiting in `stop_pending`.
    pub polls: u32,
    pub deleted: bool,
}

impl RemoveReport {
    /// Removal always exits with `0`; failures are reported on the console.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        0
    }
}

/// Stop the service named `name` if it runs, then delete its registration.
pub fn remove<M, C>(
    connect: C,
    name: &str,
    options: &RemoveOptions,
    out: &mut dyn Write,
) -> RemoveReport
where
    M: ServiceManager,
    C: FnOnce() -> Result<M, PlatformError>,
{
    let mut report = RemoveReport::default();
    let service = match connect().and_then(|manager| manager.open_service(name)) {
        Ok(service) => service,
        Err(err) => {
            say(out, format_args!("{err}\n"));
            return report;
        }
    };

    report.stop = Some(stop_service(&service, name, options, &mut report.polls, out));

    match service.delete() {
        Ok(()) => {
            report.deleted = true;
            tracing::info!(service = %name, "Service removed");
            say(out, format_args!("{name} removed.\n"));
        }
        Err(err) => say(out, format_args!("{err}\n")),
    }
    report
}

fn stop_service<S: ManagedService>(
    service: &S,
    name: &str,
    options: &RemoveOptions,
    polls: &mut u32,
    out: &mut dyn Write,
) -> StopOutcome {
    if matches!(service.query_state(), Ok(ServiceState::Stopped)) {
        return StopOutcome::NotRunning;
    }
    let mut state = match service.stop() {
        Ok(state) => state,
        Err(err) => {
            say(out, format_args!("{err}\n"));
            return StopOutcome::ControlFailed;
        }
    };

    say(out, format_args!("Stopping {name}."));
    let started = Instant::now();
    while state == ServiceState::StopPending {
        if options.timeout.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
        thread::sleep(options.poll_interval);
        *polls = polls.saturating_add(1);
        state = match service.query_state() {
            Ok(state) => state,
            Err(err) => {
                say(out, format_args!("\n{err}"));
                break;
            }
        };
        if state == ServiceState::StopPending {
            say(out, format_args!("."));
        }
    }

    if state == ServiceState::Stopped {
        say(out, format_args!("\n{name} stopped.\n"));
        StopOutcome::Stopped
    } else {
        say(out, format_args!("\n{name} failed to stop.\n"));
        StopOutcome::FailedToStop(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inetsvc_lib::FailureAction;
    use std::cell::{Cell, RefCell};
    use std::path::Path;
    use std::rc::Rc;

    #[derive(Default)]
    struct Script {
        fail_description: bool,
        fail_start: bool,
        fail_stop: bool,
        state: Cell<Option<ServiceState>>,
        pending_polls: Cell<u32>,
        calls: RefCell<Vec<&'static str>>,
    }

    struct Manager(Rc<Script>);
    struct Service(Rc<Script>);

    fn denied(operation: &'static str) -> PlatformError {
        PlatformError::call(operation, io::Error::from_raw_os_error(5))
    }

    impl ServiceManager for Manager {
        type Service = Service;

        fn create_service(
            &self,
            _descriptor: &ServiceDescriptor,
            _executable: &Path,
        ) -> Result<Service, PlatformError> {
            self.0.calls.borrow_mut().push("create");
            Ok(Service(Rc::clone(&self.0)))
        }

        fn open_service(&self, _name: &str) -> Result<Service, PlatformError> {
            Ok(Service(Rc::clone(&self.0)))
        }
    }

    impl ManagedService for Service {
        fn set_description(&self, _description: &str) -> Result<(), PlatformError> {
            self.0.calls.borrow_mut().push("description");
            if self.0.fail_description {
                return Err(denied("set description"));
            }
            Ok(())
        }

        fn set_failure_action(&self, _action: &FailureAction) -> Result<(), PlatformError> {
            self.0.calls.borrow_mut().push("failure action");
            Ok(())
        }

        fn set_failure_actions_on_non_crash_failures(
            &self,
            _enabled: bool,
        ) -> Result<(), PlatformError> {
            self.0.calls.borrow_mut().push("failure flag");
            Ok(())
        }

        fn start(&self) -> Result<(), PlatformError> {
            if self.0.fail_start {
                return Err(denied("start service"));
            }
            Ok(())
        }

        fn stop(&self) -> Result<ServiceState, PlatformError> {
            self.0.calls.borrow_mut().push("stop");
            if self.0.fail_stop {
                return Err(denied("stop service"));
            }
            Ok(ServiceState::StopPending)
        }

        fn query_state(&self) -> Result<ServiceState, PlatformError> {
            if let Some(state) = self.0.state.get() {
                return Ok(state);
            }
            let left = self.0.pending_polls.get();
            if left == 0 {
                return Ok(ServiceState::Stopped);
            }
            self.0.pending_polls.set(left - 1);
            Ok(ServiceState::StopPending)
        }

        fn delete(&self) -> Result<(), PlatformError> {
            self.0.calls.borrow_mut().push("delete");
            Ok(())
        }
    }

    fn exe() -> io::Result<PathBuf> {
        Ok(PathBuf::from("inetsvc.exe"))
    }

    fn fast() -> RemoveOptions {
        RemoveOptions {
            poll_interval: Duration::ZERO,
            timeout: None,
        }
    }

    #[test]
    fn failed_description_does_not_stop_install() {
        let script = Rc::new(Script {
            fail_description: true,
            ..Script::default()
        });
        let mut out = Vec::new();
        let report = install(
            || Ok(Manager(Rc::clone(&script))),
            &ServiceDescriptor::default(),
            exe,
            &mut out,
        );

        assert!(report.created());
        assert_eq!(report.exit_code(), 0);
        assert!(matches!(report.outcome(InstallStep::Description), Some(Err(_))));
        assert!(matches!(report.outcome(InstallStep::FailureActions), Some(Ok(()))));
        assert_eq!(
            *script.calls.borrow(),
            vec!["create", "description", "failure action", "failure flag"]
        );
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("Failed setting the description - set description failed"));
        assert!(text.contains("inetsvc installed."));
        assert!(text.contains("inetsvc started."));
    }

    #[test]
    fn unresolvable_path_exits_with_minus_one() {
        let mut out = Vec::new();
        let report = install(
            || -> Result<Manager, PlatformError> { panic!("must not connect") },
            &ServiceDescriptor::default(),
            || Err(io::Error::from_raw_os_error(3)),
            &mut out,
        );
        assert_eq!(report.exit_code(), -1);
        assert!(!report.created());
        assert!(
            String::from_utf8(out)
                .expect("utf8")
                .starts_with("Unable to install inetsvc - ")
        );
    }

    #[test]
    fn failed_start_keeps_install_result() {
        let script = Rc::new(Script {
            fail_start: true,
            ..Script::default()
        });
        let mut out = Vec::new();
        let report = install(
            || Ok(Manager(Rc::clone(&script))),
            &ServiceDescriptor::default(),
            exe,
            &mut out,
        );
        assert!(report.created());
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn stopped_service_is_deleted_without_stop() {
        let script = Rc::new(Script::default());
        script.state.set(Some(ServiceState::Stopped));
        let mut out = Vec::new();
        let report = remove(
            || Ok(Manager(Rc::clone(&script))),
            "inetsvc",
            &fast(),
            &mut out,
        );
        assert_eq!(report.stop, Some(StopOutcome::NotRunning));
        assert_eq!(report.polls, 0);
        assert!(report.deleted);
        assert_eq!(*script.calls.borrow(), vec!["delete"]);
        assert_eq!(String::from_utf8(out).expect("utf8"), "inetsvc removed.\n");
    }

    #[test]
    fn running_service_is_polled_until_stopped() {
        let script = Rc::new(Script::default());
        script.pending_polls.set(3);
        let mut out = Vec::new();
        let report = remove(
            || Ok(Manager(Rc::clone(&script))),
            "inetsvc",
            &fast(),
            &mut out,
        );
        assert_eq!(report.stop, Some(StopOutcome::Stopped));
        assert!(report.polls >= 2);
        assert!(report.deleted);
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("Stopping inetsvc."));
        assert!(text.contains("\ninetsvc stopped.\n"));
    }

    #[test]
    fn poll_count_saturates_during_long_wait() {
        let script = Rc::new(Script::default());
        script.pending_polls.set(3);
        let mut polls = u32::MAX - 1;
        let mut out = Vec::new();
        let outcome = stop_service(
            &Service(Rc::clone(&script)),
            "inetsvc",
            &fast(),
            &mut polls,
            &mut out,
        );
        assert_eq!(outcome, StopOutcome::Stopped);
        assert_eq!(polls, u32::MAX);
    }

    #[test]
    fn timeout_ends_wait_and_still_deletes() {
        let script = Rc::new(Script::default());
        script.state.set(Some(ServiceState::StopPending));
        let options = RemoveOptions {
            poll_interval: Duration::from_millis(1),
            timeout: Some(Duration::from_millis(20)),
        };
        let mut out = Vec::new();
        let report = remove(
            || Ok(Manager(Rc::clone(&script))),
            "inetsvc",
            &options,
            &mut out,
        );
        assert_eq!(
            report.stop,
            Some(StopOutcome::FailedToStop(ServiceState::StopPending))
        );
        assert!(report.deleted);
        assert!(
            String::from_utf8(out)
                .expect("utf8")
                .contains("inetsvc failed to stop.")
        );
    }

    #[test]
    fn undeliverable_stop_still_deletes() {
        let script = Rc::new(Script {
            fail_stop: true,
            ..Script::default()
        });
        script.state.set(Some(ServiceState::Running));
        let mut out = Vec::new();
        let report = remove(
            || Ok(Manager(Rc::clone(&script))),
            "inetsvc",
            &fast(),
            &mut out,
        );
        assert_eq!(report.stop, Some(StopOutcome::ControlFailed));
        assert!(report.deleted);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn unreachable_manager_is_reported() {
        let mut out = Vec::new();
        let report = remove(
            || -> Result<Manager, PlatformError> { Err(denied("open service manager")) },
            "inetsvc",
            &fast(),
            &mut out,
        );
        assert_eq!(report, RemoveReport::default());
        assert!(
            String::from_utf8(out)
                .expect("utf8")
                .starts_with("open service manager failed - ")
        );
    }
}

//! Behavioural test steps for installing and removing the service.

use cucumber::{World, given, then, when};
use inetsvc::config::Config;
use inetsvc::installer::{
    InstallReport, InstallStep, RemoveOptions, RemoveReport, StopOutcome, install, remove,
};
use inetsvc_lib::ServiceState;
use std::path::PathBuf;
use std::time::Duration;
use test_support::{FakeServiceManager, ManagerCall};

use super::parse_state;

#[derive(Debug, Default, World)]
pub struct InstallWorld {
    manager: FakeServiceManager,
    install: Option<InstallReport>,
    remove: Option<RemoveReport>,
    console: String,
}

fn manager_call(name: &str) -> ManagerCall {
    match name {
        "create" => ManagerCall::Create,
        "description" => ManagerCall::SetDescription,
        "failure actions" => ManagerCall::SetFailureAction,
        "failure actions flag" => ManagerCall::SetFailureActionsFlag,
        "start" => ManagerCall::Start,
        "stop" => ManagerCall::Stop,
        "delete" => ManagerCall::Delete,
        other => panic!("unknown service manager call {other:?}"),
    }
}

fn install_step(name: &str) -> InstallStep {
    match name {
        "create" => InstallStep::Create,
        "description" => InstallStep::Description,
        "failure actions" => InstallStep::FailureActions,
        "failure actions flag" => InstallStep::FailureActionsFlag,
        "start" => InstallStep::Start,
        other => panic!("unknown install step {other:?}"),
    }
}

impl InstallWorld {
    fn install_report(&self) -> &InstallReport {
        let Some(report) = self.install.as_ref() else {
            panic!("the service should be installed first");
        };
        report
    }

    fn remove_report(&self) -> &RemoveReport {
        let Some(report) = self.remove.as_ref() else {
            panic!("the service should be removed first");
        };
        report
    }
}

#[given("an empty service manager")]
fn empty_manager(world: &mut InstallWorld) {
    world.manager = FakeServiceManager::new();
}

#[given(regex = r#"^a registered service in state "(.+)"$"#)]
fn registered_service(world: &mut InstallWorld, state: String) {
    world.manager = FakeServiceManager::with_service(parse_state(&state));
}

#[given(regex = r"^the service takes (\d+) polls to stop$")]
fn slow_stop(world: &mut InstallWorld, polls: u32) {
    world.manager.stop_takes(polls);
}

#[given(regex = r#"^the "(.+)" call fails$"#)]
fn failing_call(world: &mut InstallWorld, call: String) {
    world.manager.fail(manager_call(&call));
}

#[when("the service is installed")]
fn service_installed(world: &mut InstallWorld) {
    let mut out = Vec::new();
    let report = install(
        world.manager.connector(),
        &Config::default().descriptor(),
        || Ok(PathBuf::from("inetsvc.exe")),
        &mut out,
    );
    world.console = String::from_utf8_lossy(&out).into_owned();
    world.install = Some(report);
}

#[when("the service is removed")]
fn service_removed(world: &mut InstallWorld) {
    let options = RemoveOptions {
        poll_interval: Duration::ZERO,
        timeout: None,
    };
    let mut out = Vec::new();
    let report = remove(world.manager.connector(), "inetsvc", &options, &mut out);
    world.console = String::from_utf8_lossy(&out).into_owned();
    world.remove = Some(report);
}

#[then("no stop control was sent")]
fn no_stop_sent(world: &mut InstallWorld) {
    assert!(!world.manager.called(ManagerCall::Stop));
    assert_eq!(world.remove_report().stop, Some(StopOutcome::NotRunning));
}

#[then(regex = r#"^the state "(.+)" was never observed$"#)]
fn state_never_observed(world: &mut InstallWorld, state: String) {
    let state = parse_state(&state);
    assert!(!world.manager.observed_states().contains(&state));
}

#[then("the registration is deleted")]
fn registration_deleted(world: &mut InstallWorld) {
    assert!(world.remove_report().deleted);
    assert!(!world.manager.is_registered());
    assert!(world.console.ends_with("inetsvc removed.\n"));
}

#[then(regex = r#"^the stop outcome is "(.+)"$"#)]
fn stop_outcome(world: &mut InstallWorld, outcome: String) {
    let expected = match outcome.as_str() {
        "stopped" => StopOutcome::Stopped,
        "not running" => StopOutcome::NotRunning,
        "control failed" => StopOutcome::ControlFailed,
        other => StopOutcome::FailedToStop(parse_state(other)),
    };
    assert_eq!(world.remove_report().stop, Some(expected));
    assert_eq!(world.manager.state(), ServiceState::Stopped);
}

#[then(regex = r#"^the install step "(.+)" failed$"#)]
fn install_step_failed(world: &mut InstallWorld, step: String) {
    let step = install_step(&step);
    assert!(matches!(
        world.install_report().outcome(step),
        Some(Err(_))
    ));
    assert!(world.console.contains(&format!("Failed {step} - ")));
}

#[then(regex = r#"^the install step "(.+)" succeeded$"#)]
fn install_step_succeeded(world: &mut InstallWorld, step: String) {
    let step = install_step(&step);
    assert!(matches!(
        world.install_report().outcome(step),
        Some(Ok(()))
    ));
}

#[then("the service is reported as created")]
fn reported_created(world: &mut InstallWorld) {
    assert!(world.install_report().created());
    assert_eq!(world.install_report().exit_code(), 0);
    assert!(world.console.contains("inetsvc installed."));
}

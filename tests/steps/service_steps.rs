//! Behavioural test steps for supervised service runs.
//!
//! The service runs on its own thread against a [`FakeSupervisor`]; steps
//! deliver controls the way the service manager would and inspect the
//! recorded status reports.

use cucumber::{World, given, then, when};
use inetsvc::daemon::Daemon;
use inetsvc::lifecycle::{LifecycleError, LifecycleSettings, ServiceEntry};
use inetsvc_lib::{Control, ServiceState};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use test_support::{FakeDaemon, FakeSupervisor};

use super::parse_state;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Default, World)]
pub struct ServiceWorld {
    supervisor: FakeSupervisor,
    daemon: Option<Arc<FakeDaemon>>,
    run: Option<JoinHandle<Result<i32, LifecycleError>>>,
    outcome: Option<Result<i32, LifecycleError>>,
}

impl ServiceWorld {
    #[expect(clippy::expect_used, reason = "simplify test failure output")]
    fn daemon(&self) -> &Arc<FakeDaemon> {
        self.daemon
            .as_ref()
            .expect("a daemon step should run first")
    }

    #[expect(clippy::expect_used, reason = "simplify test failure output")]
    fn outcome(&mut self) -> &Result<i32, LifecycleError> {
        if self.outcome.is_none() {
            let run = self.run.take().expect("the service should be started");
            self.outcome = Some(run.join().expect("join service thread"));
        }
        self.outcome.as_ref().expect("outcome recorded")
    }
}

#[given("a service manager that accepts registration")]
fn accepting_supervisor(world: &mut ServiceWorld) {
    world.supervisor = FakeSupervisor::new();
}

#[given("a service manager that refuses registration")]
fn refusing_supervisor(world: &mut ServiceWorld) {
    world.supervisor = FakeSupervisor::refusing();
}

#[given(regex = r"^a daemon that exits with status (-?\d+)$")]
fn daemon_with_status(world: &mut ServiceWorld, status: i32) {
    world.daemon = Some(Arc::new(FakeDaemon::exiting_with(status)));
}

#[when("the service is started")]
fn service_started(world: &mut ServiceWorld) {
    let entry = ServiceEntry {
        service_name: "inetsvc".into(),
        daemon: Arc::clone(world.daemon()) as Arc<dyn Daemon>,
        args: vec!["inetsvc".into()],
        settings: LifecycleSettings::default(),
    };
    let supervisor = world.supervisor.clone();
    world.run = Some(thread::spawn(move || entry.run(&supervisor)));
}

#[when("the service manager sends stop")]
fn send_stop(world: &mut ServiceWorld) {
    assert!(world.daemon().wait_until_started(WAIT));
    assert!(world.supervisor.post(Control::Stop));
}

#[when(regex = r"^the service manager sends (\d+) interrogate controls$")]
fn send_interrogates(world: &mut ServiceWorld, count: usize) {
    assert!(world.daemon().wait_until_started(WAIT));
    for _ in 0..count {
        assert!(world.supervisor.post(Control::Interrogate));
    }
}

#[then(regex = r"^the service run ends with status (-?\d+)$")]
fn run_ends_with(world: &mut ServiceWorld, status: i32) {
    match world.outcome() {
        Ok(actual) => assert_eq!(*actual, status),
        Err(e) => panic!("service run failed: {e}"),
    }
}

#[then(regex = r#"^the reported states are "(.+)"$"#)]
fn reported_states(world: &mut ServiceWorld, states: String) {
    let expected: Vec<ServiceState> = states.split(',').map(parse_state).collect();
    assert_eq!(world.supervisor.states(), expected);
}

#[then(regex = r"^the final report carries exit code (\d+) and checkpoint (\d+)$")]
fn final_report(world: &mut ServiceWorld, exit_code: u32, checkpoint: u32) {
    let Some(last) = world.supervisor.reports().last().copied() else {
        panic!("no status was reported");
    };
    assert_eq!(last.current_state, ServiceState::Stopped);
    assert_eq!(last.win32_exit_code, exit_code);
    assert_eq!(last.checkpoint, checkpoint);
}

#[then("every running report is identical")]
fn running_reports_identical(world: &mut ServiceWorld) {
    let reports = world.supervisor.reports();
    let running: Vec<_> = reports
        .iter()
        .filter(|s| s.current_state == ServiceState::Running)
        .collect();
    assert!(running.len() > 1);
    assert!(running.windows(2).all(|w| w[0] == w[1]));
}

#[then("the service run fails with a registration error")]
fn registration_error(world: &mut ServiceWorld) {
    assert!(matches!(
        world.outcome(),
        Err(LifecycleError::Registration(_))
    ));
}

#[then("no status is reported")]
fn no_status(world: &mut ServiceWorld) {
    assert!(world.supervisor.reports().is_empty());
}

#[then("the daemon never started")]
fn daemon_never_started(world: &mut ServiceWorld) {
    assert_eq!(world.daemon().starts(), 0);
}

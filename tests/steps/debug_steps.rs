//! Behavioural test steps for foreground debug runs.

use cucumber::{World, given, then, when};
use inetsvc::debug::run_until_stopped;
use inetsvc::lifecycle::{LifecycleError, LifecycleSettings};
use std::sync::Arc;
use std::time::Duration;
use test_support::FakeDaemon;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Default, World)]
pub struct DebugWorld {
    daemon: Option<Arc<FakeDaemon>>,
    interrupts: Option<mpsc::UnboundedSender<()>>,
    run: Option<JoinHandle<Result<i32, LifecycleError>>>,
}

impl DebugWorld {
    #[expect(clippy::expect_used, reason = "simplify test failure output")]
    fn daemon(&self) -> &Arc<FakeDaemon> {
        self.daemon.as_ref().expect("the daemon should be running")
    }
}

#[given("a daemon running in the foreground")]
async fn daemon_in_foreground(world: &mut DebugWorld) {
    let daemon = Arc::new(FakeDaemon::exiting_with(0));
    let (tx, rx) = mpsc::unbounded_channel();
    let runner = Arc::clone(&daemon);
    world.run = Some(tokio::spawn(async move {
        let mut console = Vec::new();
        run_until_stopped(
            "inetsvc",
            runner,
            vec!["inetsvc".into()],
            LifecycleSettings::default(),
            rx,
            &mut console,
        )
        .await
    }));
    for _ in 0..500 {
        if daemon.starts() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(daemon.starts(), 1, "daemon did not start");
    world.daemon = Some(daemon);
    world.interrupts = Some(tx);
}

#[when(regex = r"^the operator interrupts the console (\d+) times?$")]
fn interrupt(world: &mut DebugWorld, count: usize) {
    let Some(tx) = world.interrupts.as_ref() else {
        panic!("no debug run in progress");
    };
    for _ in 0..count {
        let _ = tx.send(());
    }
}

#[then(regex = r"^the debug run ends with status (-?\d+)$")]
#[expect(clippy::expect_used, reason = "simplify test failure output")]
async fn debug_run_ends(world: &mut DebugWorld, status: i32) {
    let run = world.run.take().expect("the debug run should be started");
    let outcome = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("debug run should finish")
        .expect("join debug run")
        .expect("debug run succeeds");
    assert_eq!(outcome, status);
}

#[then(regex = r"^the daemon was asked to stop (\d+) times?$")]
fn stop_requests(world: &mut DebugWorld, count: usize) {
    assert_eq!(world.daemon().stop_requests(), count);
}

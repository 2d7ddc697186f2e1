//! Control request handling.
//!
//! The service manager delivers controls on its own thread. Its callback only
//! posts them to a channel; a dedicated control thread drains the channel and
//! applies each control to the lifecycle state machine through
//! [`ControlDispatcher::handle`].

use inetsvc_lib::Control;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::daemon::Daemon;
use crate::reporter::StatusReporter;

#[derive(Debug)]
pub(crate) enum Dispatch {
    Control(Control),
    Shutdown,
}

/// Posting side of the control channel, handed to the service manager's
/// callback at registration.
#[derive(Debug, Clone)]
pub struct ControlSender(mpsc::UnboundedSender<Dispatch>);

impl ControlSender {
    /// Queue `control` for the control thread.
    ///
    /// Returns `false` once the control thread has gone away.
    pub fn post(&self, control: Control) -> bool {
        self.0.send(Dispatch::Control(control)).is_ok()
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.0.send(Dispatch::Shutdown);
    }
}

pub(crate) type ControlReceiver = mpsc::UnboundedReceiver<Dispatch>;

pub(crate) fn control_channel() -> (ControlSender, ControlReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ControlSender(tx), rx)
}

/// What a control led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// The service entered `stop_pending` and the daemon was asked to stop.
    StopRequested,
    /// The current status was published again unchanged.
    Refreshed,
}

/// Applies controls to the reported state and the daemon.
pub struct ControlDispatcher<D: ?Sized> {
    reporter: Arc<StatusReporter>,
    daemon: Arc<D>,
    stop_wait_hint_ms: u32,
}

impl<D: Daemon + ?Sized> ControlDispatcher<D> {
    #[must_use]
    pub fn new(reporter: Arc<StatusReporter>, daemon: Arc<D>, stop_wait_hint_ms: u32) -> Self {
        Self {
            reporter,
            daemon,
            stop_wait_hint_ms,
        }
    }

    /// Handle a single control.
    ///
    /// `stop` while running reports `stop_pending` first and then asks the
    /// daemon to stop, without waiting for it to do so. Every other control,
    /// including a repeated `stop`, republishes the current status.
    pub fn handle(&self, control: Control) -> Handled {
        if control == Control::Stop && self.reporter.begin_stop(self.stop_wait_hint_ms) {
            tracing::info!("Stop requested");
            self.daemon.request_stop();
            return Handled::StopRequested;
        }
        tracing::debug!(?control, "Refreshing status");
        self.reporter.refresh();
        Handled::Refreshed
    }
}

impl<D: Daemon + ?Sized> ControlDispatcher<D> {
    /// Ask the daemon to stop without touching the reported state.
    pub(crate) fn request_daemon_stop(&self) {
        self.daemon.request_stop();
    }

    pub(crate) fn refresh(&self) {
        self.reporter.refresh();
    }
}

/// Drain `controls` into `dispatcher` until shut down.
pub(crate) fn run_control_loop<D: Daemon + ?Sized>(
    mut controls: ControlReceiver,
    dispatcher: &ControlDispatcher<D>,
) {
    while let Some(message) = controls.blocking_recv() {
        match message {
            Dispatch::Control(control) => {
                dispatcher.handle(control);
            }
            Dispatch::Shutdown => break,
        }
    }
}

//! Foreground execution for interactive testing.
//!
//! The daemon runs through the same lifecycle as under the service manager,
//! with an in-memory reporter. Console interrupts (Ctrl+C, and Ctrl+Break on
//! Windows) take the place of the service manager's `stop` control.

use inetsvc_lib::Control;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

use crate::console::say;
use crate::daemon::Daemon;
use crate::dispatcher::{ControlDispatcher, Handled};
use crate::lifecycle::{Lifecycle, LifecycleError, LifecycleSettings};

/// Turns console interrupts into `stop` controls.
pub struct InterruptHandler<D: ?Sized> {
    service_name: String,
    dispatcher: ControlDispatcher<D>,
    forwarded: AtomicBool,
}

impl<D: Daemon + ?Sized> InterruptHandler<D> {
    #[must_use]
    pub fn new(service_name: impl Into<String>, dispatcher: ControlDispatcher<D>) -> Self {
        Self {
            service_name: service_name.into(),
            dispatcher,
            forwarded: AtomicBool::new(false),
        }
    }

    /// Handle one interrupt. Always acknowledges it.
    ///
    /// The first interrupt reaches the daemon exactly once, even when it
    /// arrives before the lifecycle has reported `running`. Later ones only
    /// republish the status.
    pub fn on_interrupt<W: Write + ?Sized>(&self, out: &mut W) -> bool {
        say(out, format_args!("Stopping {}.\n", self.service_name));
        if self.forwarded.swap(true, Ordering::SeqCst) {
            self.dispatcher.refresh();
        } else if self.dispatcher.handle(Control::Stop) == Handled::Refreshed {
            self.dispatcher.request_daemon_stop();
        }
        true
    }
}

/// Run `daemon` in the foreground until it stops and return its status.
///
/// # Errors
/// Fails when the async runtime cannot be built or the daemon's thread is
/// lost.
pub fn run<D>(
    service_name: &str,
    daemon: Arc<D>,
    args: Vec<String>,
    settings: LifecycleSettings,
    out: &mut dyn Write,
) -> Result<i32, LifecycleError>
where
    D: Daemon + ?Sized + 'static,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    say(out, format_args!("Debugging {service_name}.\n"));
    runtime.block_on(async {
        let (tx, rx) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(forward_interrupts(tx));
        let status = run_until_stopped(service_name, daemon, args, settings, rx, out).await;
        forwarder.abort();
        status
    })
}

/// Drive a detached lifecycle, applying every message on `interrupts` as a
/// console interrupt.
///
/// # Errors
/// Fails when the thread running the daemon panics or is cancelled.
pub async fn run_until_stopped<D, W>(
    service_name: &str,
    daemon: Arc<D>,
    args: Vec<String>,
    settings: LifecycleSettings,
    mut interrupts: mpsc::UnboundedReceiver<()>,
    out: &mut W,
) -> Result<i32, LifecycleError>
where
    D: Daemon + ?Sized + 'static,
    W: Write + ?Sized,
{
    let lifecycle = Arc::new(Lifecycle::detached(daemon, settings));
    let handler = InterruptHandler::new(service_name, lifecycle.dispatcher());
    let runner = Arc::clone(&lifecycle);
    let mut run = tokio::task::spawn_blocking(move || runner.run(&args));
    loop {
        tokio::select! {
            joined = &mut run => {
                return joined.map_err(|e| LifecycleError::Runtime(io::Error::other(e)));
            }
            Some(()) = interrupts.recv() => {
                handler.on_interrupt(out);
            }
        }
    }
}

async fn forward_interrupts(interrupts: mpsc::UnboundedSender<()>) {
    loop {
        if let Err(e) = next_interrupt().await {
            tracing::warn!(error = %e, "Console interrupts unavailable");
            return;
        }
        if interrupts.send(()).is_err() {
            return;
        }
    }
}

#[cfg(windows)]
async fn next_interrupt() -> io::Result<()> {
    let mut ctrl_break = tokio::signal::windows::ctrl_break()?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = ctrl_break.recv() => Ok(()),
    }
}

#[cfg(not(windows))]
async fn next_interrupt() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}

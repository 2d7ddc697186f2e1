//! Logging utilities for the service shim.
//!
//! Initializes structured logging using `tracing` and `tracing-subscriber`,
//! reading filter settings from the `RUST_LOG` environment variable. When the
//! process runs under the service manager, error events are also copied to
//! the platform event log.

use inetsvc_lib::RunMode;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt as tfmt, registry::LookupSpan};

use crate::platform::{EventLog, PlatformError};

/// Target used for messages emitted through [`ServiceLog`].
pub const SERVICE_TARGET: &str = "inetsvc::service";

/// Initialize the global tracing subscriber.
///
/// Call `init` before any logging statements to avoid missing logs.
///
/// # Examples
///
/// ```rust,no_run
/// use inetsvc::logging::init;
///
/// init(None);
/// tracing::info!("Logging is initialized!");
/// ```
pub fn init(event_log: Option<Box<dyn EventLog>>) {
    init_with_writer(tfmt::writer::BoxMakeWriter::new(std::io::stderr), event_log);
}

/// Initialize logging with a custom writer.
pub fn init_with_writer<W>(writer: W, event_log: Option<Box<dyn EventLog>>)
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tfmt::layer().with_writer(writer))
        .with(event_log.map(EventLogLayer::new))
        .init();
}

/// Copies every ERROR event into an [`EventLog`].
///
/// An integer `code` field on the event becomes the entry's error code.
pub struct EventLogLayer {
    sink: Box<dyn EventLog>,
}

impl EventLogLayer {
    #[must_use]
    pub fn new(sink: Box<dyn EventLog>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for EventLogLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::ERROR {
            return;
        }
        let mut visitor = EntryVisitor::default();
        event.record(&mut visitor);
        self.sink.report_error(visitor.code, &visitor.finish());
    }
}

#[derive(Default)]
struct EntryVisitor {
    message: String,
    fields: Vec<String>,
    code: u32,
}

impl EntryVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{} ({})", self.message, self.fields.join(", "))
        }
    }
}

impl Visit for EntryVisitor {
    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "code" {
            self.code = u32::try_from(value).unwrap_or(u32::MAX);
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == "code" {
            self.code = u32::try_from(value).unwrap_or(0);
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            value.clone_into(&mut self.message);
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={value:?}", field.name()));
        }
    }
}

/// Severity accepted by [`ServiceLog::log`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Message,
    Warning,
    Error,
}

/// Service-level log channel.
///
/// Silent in debug runs, where the console is the operator's only view and
/// service diagnostics would be noise.
#[derive(Debug, Clone, Copy)]
pub struct ServiceLog {
    enabled: bool,
}

impl ServiceLog {
    #[must_use]
    pub const fn enabled() -> Self {
        Self { enabled: true }
    }

    #[must_use]
    pub const fn disabled() -> Self {
        Self { enabled: false }
    }

    #[must_use]
    pub const fn for_mode(mode: &RunMode) -> Self {
        Self {
            enabled: !mode.is_debug(),
        }
    }

    pub fn log(&self, level: LogLevel, text: &str) {
        if !self.enabled {
            return;
        }
        match level {
            LogLevel::Message => tracing::info!(target: SERVICE_TARGET, "{text}"),
            LogLevel::Warning => tracing::warn!(target: SERVICE_TARGET, "{text}"),
            LogLevel::Error => tracing::error!(target: SERVICE_TARGET, "{text}"),
        }
    }

    /// Log a failed service manager call with its OS error code.
    pub fn os_error(&self, text: &str, err: &PlatformError) {
        if !self.enabled {
            return;
        }
        tracing::error!(target: SERVICE_TARGET, code = err.os_code(), error = %err, "{text}");
    }
}

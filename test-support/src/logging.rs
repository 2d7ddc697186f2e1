//! Log capture for tests.
//!
//! Installs a thread-local JSON subscriber with an explicit filter, so
//! captured output does not depend on `RUST_LOG`.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Shared buffer receiving formatted log lines.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Everything written so far, one JSON object per line.
    #[must_use]
    pub fn contents(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Captured lines containing `needle`.
    #[must_use]
    pub fn lines_containing(&self, needle: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|l| l.contains(needle))
            .map(str::to_owned)
            .collect()
    }
}

/// Writer handed out by [`LogCapture`].
pub struct CaptureWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CaptureWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            buf: Arc::clone(&self.buf),
        }
    }
}

/// Capture logs emitted on the current thread until the guard drops.
///
/// Events from other threads are not captured.
///
/// # Examples
///
/// ```rust
/// use test_support::logging::capture_logs;
///
/// let (logs, _guard) = capture_logs("info");
/// tracing::info!("hello");
/// assert!(logs.contents().contains("hello"));
/// ```
#[must_use]
pub fn capture_logs(filter: &str) -> (LogCapture, DefaultGuard) {
    let logs = LogCapture::default();
    let guard = fmt()
        .json()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(logs.clone())
        .finish()
        .set_default();
    (logs, guard)
}

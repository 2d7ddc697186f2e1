//! Configuration loading for the service shim.
//!
//! Settings are read from an optional TOML file and may be overridden by
//! environment variables using the `INETSVC_` prefix. Every field has a
//! default, so the shim runs without any file at all.

use figment::Figment;
use figment::providers::{Env, Serialized};
use inetsvc_lib::{
    FailureAction, SERVICE_DEPENDENCIES, SERVICE_DESCRIPTION, SERVICE_NAME, ServiceDescriptor,
    StartMode,
};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::installer::RemoveOptions;

/// Prefix of environment variables overriding file values.
const ENV_PREFIX: &str = "INETSVC_";
/// Delay before the service manager restarts a failed service.
const DEFAULT_RESTART_DELAY_MS: u64 = 60_000;
/// Wait hint sent with pending status reports.
const DEFAULT_WAIT_HINT_MS: u64 = 4000;
/// Interval between status queries while waiting for a stop on removal.
const DEFAULT_STOP_POLL_INTERVAL_MS: u64 = 1000;

/// Runtime configuration for the shim.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Config {
    /// Name the service is registered under.
    pub service_name: String,
    /// Name shown in the service manager's user interface.
    pub display_name: String,
    pub description: String,
    /// Services that must run before this one, in order.
    pub dependencies: Vec<String>,
    pub start_mode: StartMode,
    /// Delay before an automatic restart after a failure.
    pub restart_delay_ms: u64,
    pub start_wait_hint_ms: u64,
    pub stop_wait_hint_ms: u64,
    /// Interval between status polls while removing a running service.
    pub stop_poll_interval_ms: u64,
    /// Give up waiting for a stop after this many seconds; unset waits
    /// for as long as the service manager allows.
    pub stop_timeout_secs: Option<u64>,
    /// Program run as the daemon.
    pub daemon_program: Option<PathBuf>,
    /// Arguments placed before the forwarded ones.
    pub daemon_args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: SERVICE_NAME.to_owned(),
            display_name: SERVICE_NAME.to_owned(),
            description: SERVICE_DESCRIPTION.to_owned(),
            dependencies: SERVICE_DEPENDENCIES.iter().map(|d| (*d).to_owned()).collect(),
            start_mode: StartMode::Auto,
            restart_delay_ms: DEFAULT_RESTART_DELAY_MS,
            start_wait_hint_ms: DEFAULT_WAIT_HINT_MS,
            stop_wait_hint_ms: DEFAULT_WAIT_HINT_MS,
            stop_poll_interval_ms: DEFAULT_STOP_POLL_INTERVAL_MS,
            stop_timeout_secs: None,
            daemon_program: None,
            daemon_args: Vec::new(),
        }
    }
}

impl Config {
    /// Default location of the configuration file.
    #[cfg(windows)]
    pub const DEFAULT_PATH: &'static str = r"C:\ProgramData\inetsvc\config.toml";
    /// Default location of the configuration file.
    #[cfg(not(windows))]
    pub const DEFAULT_PATH: &'static str = "/etc/inetsvc/config.toml";

    /// Load the configuration.
    ///
    /// With `path` set, the file must exist. Otherwise the default location
    /// is tried and its absence leaves every value at its default.
    ///
    /// # Errors
    /// Returns an error when a requested file is missing or when the file or
    /// environment holds values that do not parse.
    #[expect(clippy::result_large_err, reason = "propagate figment errors")]
    pub fn load(path: Option<&Path>) -> Result<Self, ortho_config::OrthoError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_optional_file(Path::new(Self::DEFAULT_PATH)),
        }
    }

    /// Load from `path`, merging `INETSVC_*` environment variables over the
    /// file values.
    ///
    /// # Errors
    /// Fails when the file is missing or malformed.
    #[expect(clippy::result_large_err, reason = "propagate figment errors")]
    pub fn from_file(path: &Path) -> Result<Self, ortho_config::OrthoError> {
        let fig = ortho_config::load_config_file(path)?.ok_or_else(|| {
            ortho_config::OrthoError::File {
                path: path.to_path_buf(),
                source: Box::new(io::Error::new(
                    io::ErrorKind::NotFound,
                    "Configuration file not found",
                )),
            }
        })?;
        Self::extract(fig)
    }

    #[expect(clippy::result_large_err, reason = "propagate figment errors")]
    fn from_optional_file(path: &Path) -> Result<Self, ortho_config::OrthoError> {
        let fig = ortho_config::load_config_file(path)?.unwrap_or_default();
        Self::extract(fig)
    }

    #[expect(clippy::result_large_err, reason = "propagate figment errors")]
    fn extract(file: Figment) -> Result<Self, ortho_config::OrthoError> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(ortho_config::OrthoError::from)
    }

    /// Registration built from these settings.
    ///
    /// The failure action restarts the service after `restart_delay_ms` and
    /// never resets the failure counter.
    #[must_use]
    pub fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor {
            name: self.service_name.clone(),
            display_name: self.display_name.clone(),
            dependencies: self.dependencies.clone(),
            start_mode: self.start_mode,
            description: self.description.clone(),
            failure_action: FailureAction::restart_after(Duration::from_millis(
                self.restart_delay_ms,
            )),
        }
    }

    #[must_use]
    pub fn remove_options(&self) -> RemoveOptions {
        RemoveOptions {
            poll_interval: Duration::from_millis(self.stop_poll_interval_ms),
            timeout: self.stop_timeout_secs.map(Duration::from_secs),
        }
    }
}

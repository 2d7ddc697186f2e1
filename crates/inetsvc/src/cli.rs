//! Command line interface.

use clap::{ArgGroup, Parser};
use inetsvc_lib::RunMode;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::args::to_narrow;

/// Command line arguments for the `inetsvc` service binary.
///
/// Without a mode flag the process expects to have been started by the
/// service manager.
#[derive(Debug, Clone, Parser)]
#[command(name = "inetsvc", version, about = "Run a network daemon as a system service")]
#[command(group(ArgGroup::new("mode").args(["install", "remove", "debug"])))]
pub struct Cli {
    /// Register the service and start it.
    #[arg(long)]
    pub install: bool,

    /// Stop the service if it is running and delete its registration.
    #[arg(long)]
    pub remove: bool,

    /// Run the daemon in the foreground; Ctrl+C stops it. Everything after
    /// `--debug` is passed to the daemon untouched, including flags this
    /// binary would otherwise recognise.
    #[arg(
        long,
        value_name = "ARGS",
        num_args = 0..,
        allow_hyphen_values = true
    )]
    pub debug: Option<Vec<OsString>>,

    /// Path to the configuration file. Must precede `--debug`.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// The mode selected by these arguments.
    #[must_use]
    pub fn run_mode(&self) -> RunMode {
        if self.install {
            RunMode::Install
        } else if self.remove {
            RunMode::Remove
        } else if let Some(forwarded) = &self.debug {
            RunMode::Debug(to_narrow(forwarded.iter().cloned()))
        } else {
            RunMode::Supervised
        }
    }
}

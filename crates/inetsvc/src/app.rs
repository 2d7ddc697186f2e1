//! Entry-point mode selection.
//!
//! Exactly one of install, remove, debug or supervised run is performed per
//! invocation, chosen once from the command line.

use inetsvc_lib::RunMode;
use std::io::{self, Write};
use std::sync::Arc;

use crate::args::{daemon_argv, program_name, to_narrow};
use crate::cli::Cli;
use crate::config::Config;
use crate::console::{banner, say, usage};
use crate::daemon::{CommandDaemon, Daemon};
use crate::lifecycle::{LifecycleSettings, ServiceEntry};
use crate::logging::ServiceLog;
use crate::{debug, installer, platform};

/// Run the mode selected by `cli` against the configured daemon program.
///
/// Returns the process exit status.
#[must_use]
pub fn run(cli: &Cli, config: &Config) -> i32 {
    let mode = cli.run_mode();
    let daemon = Arc::new(CommandDaemon::from_config(
        config,
        ServiceLog::for_mode(&mode),
    ));
    let stdout = io::stdout();
    run_with(mode, config, daemon, &mut stdout.lock())
}

/// Run `mode` with an explicit daemon and console.
#[must_use]
pub fn run_with(
    mode: RunMode,
    config: &Config,
    daemon: Arc<dyn Daemon>,
    out: &mut dyn Write,
) -> i32 {
    let name = config.service_name.as_str();
    say(out, format_args!("{}", banner(name)));
    let settings = LifecycleSettings::from(config);

    match mode {
        RunMode::Install => installer::install(
            platform::connect,
            &config.descriptor(),
            std::env::current_exe,
            out,
        )
        .exit_code(),
        RunMode::Remove => {
            installer::remove(platform::connect, name, &config.remove_options(), out).exit_code()
        }
        RunMode::Debug(forwarded) => {
            let argv = daemon_argv(program_name(name), forwarded);
            debug::run(name, daemon, argv, settings, out).unwrap_or_else(|e| {
                tracing::error!(error = %e, "Debug run failed");
                1
            })
        }
        RunMode::Supervised => {
            say(out, format_args!("{}", usage(name)));
            let entry = ServiceEntry {
                service_name: name.to_owned(),
                daemon,
                args: to_narrow(std::env::args_os()),
                settings,
            };
            if let Err(e) = platform::run_dispatcher(entry) {
                ServiceLog::enabled().os_error("Starting the service dispatcher failed", &e);
            }
            0
        }
    }
}
